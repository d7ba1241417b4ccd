use crate::backend::{BackendKind, IdentityResolver, MigrationReport};
use crate::error::StoreError;
use crate::storage::PetStorage;
use petkeeper_common::{OwnerIdentity, OwnerRecord};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Where the pet manager sends records it wants kept or forgotten.
///
/// Implementations must not block the caller for long: the manager calls
/// this from the main tick thread.
pub trait RecordSink {
    fn save(&mut self, owner: &OwnerIdentity, record: OwnerRecord);
    fn forget(&mut self, owner: &OwnerIdentity);
}

/// Synchronous sink: writes straight through. Failures are logged by the
/// storage; the caller never rolls back.
impl RecordSink for PetStorage {
    fn save(&mut self, owner: &OwnerIdentity, record: OwnerRecord) {
        if let Err(err) = self.upsert(owner, &record) {
            tracing::warn!(%owner, error = %err, "pet record not saved");
        }
    }

    fn forget(&mut self, owner: &OwnerIdentity) {
        if let Err(err) = self.delete(owner) {
            tracing::warn!(%owner, error = %err, "pet record not deleted");
        }
    }
}

enum Command {
    Upsert(OwnerIdentity, OwnerRecord),
    Delete(OwnerIdentity),
    Load(OwnerIdentity),
    Move(OwnerIdentity, OwnerIdentity),
    Migrate(Option<Arc<dyn IdentityResolver>>),
    Shutdown,
}

/// Results handed back to the main thread.
#[derive(Debug)]
pub enum PersistOutcome {
    Loaded {
        owner: OwnerIdentity,
        record: Option<OwnerRecord>,
    },
    Migrated(Vec<(BackendKind, MigrationReport)>),
    Failed {
        op: &'static str,
        owner: Option<OwnerIdentity>,
        error: String,
    },
}

/// Background thread owning the storage.
///
/// Commands are handled strictly in submission order, so a load requested
/// after an upsert for the same owner sees that upsert.
pub struct PersistWorker {
    commands: Sender<Command>,
    outcomes: Receiver<PersistOutcome>,
    handle: Option<JoinHandle<PetStorage>>,
}

impl PersistWorker {
    pub fn spawn(storage: PetStorage) -> Result<Self, StoreError> {
        let (commands, command_rx) = mpsc::channel();
        let (outcome_tx, outcomes) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("petkeeper-persist".into())
            .spawn(move || run(storage, command_rx, outcome_tx))?;
        Ok(Self {
            commands,
            outcomes,
            handle: Some(handle),
        })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("persistence worker has stopped, command dropped");
        }
    }

    pub fn upsert(&self, owner: OwnerIdentity, record: OwnerRecord) {
        self.send(Command::Upsert(owner, record));
    }

    pub fn delete(&self, owner: OwnerIdentity) {
        self.send(Command::Delete(owner));
    }

    /// Move whatever is stored under `from` to `to`, after every command
    /// already queued.
    pub fn move_record(&self, from: OwnerIdentity, to: OwnerIdentity) {
        self.send(Command::Move(from, to));
    }

    /// Ask for `owner`'s record; it arrives later as [`PersistOutcome::Loaded`].
    pub fn request_load(&self, owner: OwnerIdentity) {
        self.send(Command::Load(owner));
    }

    pub fn request_migration(&self, resolver: Option<Arc<dyn IdentityResolver>>) {
        self.send(Command::Migrate(resolver));
    }

    /// Outcomes ready now. Never blocks.
    pub fn poll(&self) -> Vec<PersistOutcome> {
        self.outcomes.try_iter().collect()
    }

    /// Wait up to `timeout` for the next outcome.
    pub fn wait(&self, timeout: Duration) -> Option<PersistOutcome> {
        match self.outcomes.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Finish queued commands, stop the thread and hand the storage back.
    pub fn shutdown(mut self) -> Result<PetStorage, StoreError> {
        self.send(Command::Shutdown);
        let handle = self.handle.take().ok_or(StoreError::WorkerGone)?;
        handle.join().map_err(|_| StoreError::WorkerGone)
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.commands.send(Command::Shutdown);
            let _ = handle.join();
        }
    }
}

impl RecordSink for PersistWorker {
    fn save(&mut self, owner: &OwnerIdentity, record: OwnerRecord) {
        self.upsert(owner.clone(), record);
    }

    fn forget(&mut self, owner: &OwnerIdentity) {
        self.delete(owner.clone());
    }
}

fn run(
    mut storage: PetStorage,
    commands: Receiver<Command>,
    outcomes: Sender<PersistOutcome>,
) -> PetStorage {
    let failed = |op, owner: Option<&OwnerIdentity>, err: StoreError| PersistOutcome::Failed {
        op,
        owner: owner.cloned(),
        error: err.to_string(),
    };
    while let Ok(command) = commands.recv() {
        let outcome = match command {
            Command::Upsert(owner, record) => storage
                .upsert(&owner, &record)
                .err()
                .map(|err| failed("upsert", Some(&owner), err)),
            Command::Delete(owner) => storage
                .delete(&owner)
                .err()
                .map(|err| failed("delete", Some(&owner), err)),
            Command::Move(from, to) => storage
                .move_record(&from, &to)
                .err()
                .map(|err| failed("move", Some(&from), err)),
            Command::Load(owner) => Some(match storage.load(&owner) {
                Ok(record) => PersistOutcome::Loaded { owner, record },
                Err(err) => failed("load", Some(&owner), err),
            }),
            Command::Migrate(resolver) => Some(match storage.migrate(resolver.as_deref()) {
                Ok(reports) => PersistOutcome::Migrated(reports),
                Err(err) => failed("migrate", None, err),
            }),
            Command::Shutdown => break,
        };
        if let Some(outcome) = outcome {
            if outcomes.send(outcome).is_err() {
                tracing::debug!("outcome receiver gone");
            }
        }
    }
    tracing::debug!("persistence worker stopped");
    storage
}
