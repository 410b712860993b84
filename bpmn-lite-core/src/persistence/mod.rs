pub mod cache;
pub mod locker;
pub mod query;
pub mod store;
pub mod store_memory;

#[cfg(feature = "postgres")]
pub mod store_postgres;

pub use cache::ExecutionCache;
pub use locker::{InstanceLock, InstanceLocker};
pub use query::{FieldOp, Query};
pub use store::{Document, DocumentStore};
pub use store_memory::MemoryStore;

#[cfg(feature = "postgres")]
pub use store_postgres::PostgresStore;
