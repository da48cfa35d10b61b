mod memory;

pub use memory::MemoryObjectStore;
