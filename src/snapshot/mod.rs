//! Atomic snapshot export

pub mod publisher;

pub use publisher::{tmp_path, SnapshotKind, SnapshotPublisher};
