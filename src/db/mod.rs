//! Time-series store backends

pub mod connection;
pub mod memory;
pub mod questdb;
pub mod store;

pub use connection::{ConnectionSlot, Connector};
pub use memory::InMemoryStore;
pub use questdb::QuestDatabase;
pub use store::{Measurement, TimeSeriesStore};
