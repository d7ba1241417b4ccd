use crate::backend::{BackendKind, IdentityResolver, MigrationReport, PetBackend};
use crate::error::StoreError;
use crate::file::FileStore;
use crate::sql::SqlStore;
use petkeeper_common::{OwnerIdentity, OwnerRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("pets.yml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlStoreConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for SqlStoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("pets.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Availability of one configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub kind: BackendKind,
    /// `None` while the backend is in use; otherwise why it was dropped.
    pub degraded: Option<String>,
}

struct Slot {
    kind: BackendKind,
    backend: Option<Box<dyn PetBackend>>,
    degraded: Option<String>,
}

impl Slot {
    /// Take the backend out of service. Logged once; later calls skip it.
    fn degrade(&mut self, op: &str, err: &StoreError) {
        tracing::warn!(backend = %self.kind, op, error = %err, "storage backend unavailable, continuing without it");
        self.backend = None;
        self.degraded = Some(format!("{op}: {err}"));
    }
}

/// Fans record operations out to every configured backend.
///
/// A backend that fails is dropped for the rest of the run; the remaining
/// one keeps serving. Loads pick the most recently saved record across
/// backends.
#[derive(Default)]
pub struct PetStorage {
    slots: Vec<Slot>,
}

impl std::fmt::Debug for PetStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetStorage")
            .field("status", &self.status())
            .finish()
    }
}

impl PetStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the enabled backends. One that fails to open is recorded as
    /// degraded rather than failing the whole storage.
    pub fn open(file: &FileStoreConfig, sql: &SqlStoreConfig) -> Self {
        let mut storage = Self::new();
        if file.enabled {
            match FileStore::open(&file.path) {
                Ok(store) => storage.push(Box::new(store)),
                Err(err) => storage.push_failed(BackendKind::File, "open", &err),
            }
        }
        if sql.enabled {
            match SqlStore::open(&sql.path, Duration::from_millis(sql.busy_timeout_ms)) {
                Ok(store) => storage.push(Box::new(store)),
                Err(err) => storage.push_failed(BackendKind::Sql, "open", &err),
            }
        }
        storage
    }

    pub fn push(&mut self, backend: Box<dyn PetBackend>) {
        self.slots.push(Slot {
            kind: backend.kind(),
            backend: Some(backend),
            degraded: None,
        });
    }

    fn push_failed(&mut self, kind: BackendKind, op: &str, err: &StoreError) {
        let mut slot = Slot {
            kind,
            backend: None,
            degraded: None,
        };
        slot.degrade(op, err);
        self.slots.push(slot);
    }

    pub fn with_backend(mut self, backend: Box<dyn PetBackend>) -> Self {
        self.push(backend);
        self
    }

    pub fn status(&self) -> Vec<BackendStatus> {
        self.slots
            .iter()
            .map(|slot| BackendStatus {
                kind: slot.kind,
                degraded: slot.degraded.clone(),
            })
            .collect()
    }

    /// Number of backends still in service.
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|s| s.backend.is_some()).count()
    }

    /// Run `op` on every live backend, degrading the ones that fail.
    /// Succeeds if at least one backend did.
    fn each<T>(
        &mut self,
        name: &str,
        mut op: impl FnMut(&mut dyn PetBackend) -> Result<T, StoreError>,
    ) -> Result<Vec<T>, StoreError> {
        let mut results = Vec::new();
        for slot in &mut self.slots {
            let Some(backend) = slot.backend.as_deref_mut() else {
                continue;
            };
            match op(backend) {
                Ok(value) => results.push(value),
                Err(err) => slot.degrade(name, &err),
            }
        }
        if results.is_empty() {
            return Err(StoreError::NoBackendAvailable);
        }
        Ok(results)
    }

    pub fn upsert(&mut self, owner: &OwnerIdentity, record: &OwnerRecord) -> Result<(), StoreError> {
        self.each("upsert", |b| b.upsert(owner, record)).map(|_| ())
    }

    /// The most recently saved record for `owner` across live backends.
    pub fn load(&mut self, owner: &OwnerIdentity) -> Result<Option<OwnerRecord>, StoreError> {
        let found = self.each("load", |b| b.load(owner))?;
        Ok(found
            .into_iter()
            .flatten()
            .reduce(|best, next| if next.is_newer_than(&best) { next } else { best }))
    }

    /// Returns whether any backend held a record.
    pub fn delete(&mut self, owner: &OwnerIdentity) -> Result<bool, StoreError> {
        Ok(self
            .each("delete", |b| b.delete(owner))?
            .into_iter()
            .any(|existed| existed))
    }

    /// Move `from`'s record to `to` on every live backend, newest record
    /// winning. Returns whether any backend held one under `from`.
    pub fn move_record(&mut self, from: &OwnerIdentity, to: &OwnerIdentity) -> Result<bool, StoreError> {
        Ok(self
            .each("move", |b| b.move_record(from, to))?
            .into_iter()
            .any(|moved| moved))
    }

    pub fn owners(&mut self) -> Result<Vec<OwnerIdentity>, StoreError> {
        let all = self.each("owners", |b| b.owners())?;
        let merged: BTreeSet<OwnerIdentity> = all.into_iter().flatten().collect();
        Ok(merged.into_iter().collect())
    }

    /// Migrate every live backend. A backend whose migration fails is
    /// degraded like any other failure.
    pub fn migrate(
        &mut self,
        resolver: Option<&dyn IdentityResolver>,
    ) -> Result<Vec<(BackendKind, MigrationReport)>, StoreError> {
        let _span = tracing::info_span!("migrate").entered();
        self.each("migrate", |b| Ok((b.kind(), b.migrate_schema(resolver)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use petkeeper_common::{PetConfiguration, PetSpecies};

    /// Backend that fails every operation.
    struct Broken;

    impl PetBackend for Broken {
        fn kind(&self) -> BackendKind {
            BackendKind::Sql
        }
        fn upsert(&mut self, _: &OwnerIdentity, _: &OwnerRecord) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("database is locked")))
        }
        fn load(&mut self, _: &OwnerIdentity) -> Result<Option<OwnerRecord>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("database is locked")))
        }
        fn delete(&mut self, _: &OwnerIdentity) -> Result<bool, StoreError> {
            Err(StoreError::Io(std::io::Error::other("database is locked")))
        }
        fn owners(&mut self) -> Result<Vec<OwnerIdentity>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("database is locked")))
        }
        fn identity_migrated(&mut self) -> Result<bool, StoreError> {
            Ok(false)
        }
        fn mark_identity_migrated(&mut self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn record(species: PetSpecies, secs: i64) -> OwnerRecord {
        OwnerRecord::at(
            PetConfiguration::new(species),
            Utc.timestamp_opt(secs, 0).unwrap(),
        )
    }

    #[test]
    fn failing_backend_is_degraded_and_skipped() {
        let mut storage = PetStorage::new()
            .with_backend(Box::new(Broken))
            .with_backend(Box::new(SqlStore::open_in_memory().unwrap()));
        let owner = OwnerIdentity::name("Alice");
        storage.upsert(&owner, &record(PetSpecies::Pig, 1)).unwrap();
        assert_eq!(storage.available(), 1);
        let status = storage.status();
        assert!(status[0].degraded.is_some());
        assert!(status[1].degraded.is_none());
        assert!(storage.load(&owner).unwrap().is_some());
    }

    #[test]
    fn nothing_left_is_an_error() {
        let mut storage = PetStorage::new().with_backend(Box::new(Broken));
        let owner = OwnerIdentity::name("Alice");
        assert!(matches!(
            storage.upsert(&owner, &record(PetSpecies::Pig, 1)),
            Err(StoreError::NoBackendAvailable)
        ));
        assert!(matches!(
            storage.load(&owner),
            Err(StoreError::NoBackendAvailable)
        ));
    }

    #[test]
    fn newest_record_wins_across_backends() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = FileStore::open(dir.path().join("pets.yml")).unwrap();
        let mut sql = SqlStore::open_in_memory().unwrap();
        let owner = OwnerIdentity::name("Alice");
        file.upsert(&owner, &record(PetSpecies::Wolf, 50)).unwrap();
        sql.upsert(&owner, &record(PetSpecies::Pig, 10)).unwrap();

        let mut storage = PetStorage::new()
            .with_backend(Box::new(sql))
            .with_backend(Box::new(file));
        let loaded = storage.load(&owner).unwrap().unwrap();
        assert_eq!(loaded.pet.species, PetSpecies::Wolf);
    }

    #[test]
    fn open_records_failed_backends() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("pets.yml");
        std::fs::write(&bad, "meta:\n  schema_version: 42\n").unwrap();
        let storage = PetStorage::open(
            &FileStoreConfig {
                enabled: true,
                path: bad,
            },
            &SqlStoreConfig {
                enabled: true,
                path: dir.path().join("pets.db"),
                busy_timeout_ms: 50,
            },
        );
        assert_eq!(storage.available(), 1);
        assert_eq!(storage.status()[0].kind, BackendKind::File);
        assert!(storage.status()[0].degraded.is_some());
    }

    #[test]
    fn owners_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = FileStore::open(dir.path().join("pets.yml")).unwrap();
        let mut sql = SqlStore::open_in_memory().unwrap();
        file.upsert(&OwnerIdentity::name("A"), &record(PetSpecies::Pig, 1)).unwrap();
        sql.upsert(&OwnerIdentity::name("A"), &record(PetSpecies::Pig, 1)).unwrap();
        sql.upsert(&OwnerIdentity::name("B"), &record(PetSpecies::Pig, 1)).unwrap();
        let mut storage = PetStorage::new()
            .with_backend(Box::new(file))
            .with_backend(Box::new(sql));
        assert_eq!(storage.owners().unwrap().len(), 2);
        assert!(storage.delete(&OwnerIdentity::name("B")).unwrap());
    }

    #[test]
    fn late_name_keyed_write_is_moved_under_unique_id() {
        let mut storage =
            PetStorage::new().with_backend(Box::new(SqlStore::open_in_memory().unwrap()));
        let name = OwnerIdentity::name("Bob");
        let unique = OwnerIdentity::unique(uuid::Uuid::new_v4());
        storage.upsert(&unique, &record(PetSpecies::Pig, 10)).unwrap();
        storage.upsert(&name, &record(PetSpecies::Wolf, 20)).unwrap();

        assert!(storage.move_record(&name, &unique).unwrap());
        assert_eq!(storage.owners().unwrap(), vec![unique.clone()]);
        assert_eq!(storage.load(&unique).unwrap().unwrap().pet.species, PetSpecies::Wolf);
        assert!(!storage.move_record(&name, &unique).unwrap());
    }
}
