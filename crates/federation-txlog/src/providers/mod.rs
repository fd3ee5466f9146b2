mod file;
mod memory;

pub use file::FileTransactionLog;
pub use memory::InMemoryTransactionLog;
