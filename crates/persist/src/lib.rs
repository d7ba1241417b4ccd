//! Persistence: who owns which pet, in what configuration.
//!
//! Two interchangeable backends share one logical schema (owner key to
//! [`OwnerRecord`](petkeeper_common::OwnerRecord)): a YAML document and a
//! SQLite database. [`PetStorage`] fans out to whichever are configured and
//! [`PersistWorker`] runs it off the main thread.
//!
//! # Invariants
//! - Once a backend's identity migration completes, it holds no name-keyed
//!   records for resolved owners.
//! - Legacy SQL tables are copied forward, never modified or dropped.
//! - Persistence failures degrade a backend; they never surface as a panic
//!   or roll back in-memory state.

pub mod backend;
pub mod error;
pub mod file;
pub mod sql;
pub mod storage;
pub mod worker;

pub use backend::{
    BackendKind, IdentityMove, IdentityResolver, KnownPlayers, LegacyCopy, MigrationReport,
    PetBackend,
};
pub use error::StoreError;
pub use file::FileStore;
pub use sql::SqlStore;
pub use storage::{BackendStatus, FileStoreConfig, PetStorage, SqlStoreConfig};
pub use worker::{PersistOutcome, PersistWorker, RecordSink};
