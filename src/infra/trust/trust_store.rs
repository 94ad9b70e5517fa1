// Implementations of the TrustStore port.

pub mod in_memory;
pub mod sqlite_store;

// Re-export for convenience
pub use in_memory::InMemoryTrustStore;
pub use sqlite_store::SqliteTrustStore;
