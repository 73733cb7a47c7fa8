pub mod database;
pub mod memory;

pub use memory::MemoryPostStore;
