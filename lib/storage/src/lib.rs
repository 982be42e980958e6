pub mod manager;
pub mod snapshot;
pub mod store;
pub mod wal;

pub use manager::MatchStorage;
pub use snapshot::{SnapshotDescription, SnapshotManager};
pub use store::{MatchStore, MemoryMatchStore, UpsertOutcome};
pub use wal::{WalEntry, WriteAheadLog};
