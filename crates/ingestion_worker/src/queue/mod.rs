mod notification_processor;

pub use notification_processor::create_notification_processor;
