mod transfer_service;

pub use transfer_service::DocumentTransferService;
