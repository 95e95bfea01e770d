// Database access layer: connection pool and per-aggregate repositories

pub mod pool;
pub mod repositories;

pub use pool::DbPool;
