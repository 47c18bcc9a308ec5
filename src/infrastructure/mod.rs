//! External concerns: durable profile storage adapters.

pub mod persistence;

pub use persistence::{InMemoryPersistence, JsonFilePersistence, ProfilePersistence};
