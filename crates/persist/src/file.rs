//! YAML file backend.
//!
//! Layout of `pets.yml`:
//! ```text
//! meta:
//!   schema_version: 3
//!   identity_migrated: false
//! autosave:
//!   <owner key>:
//!     pet:   { type, name, data }
//!     rider: { type, name, data }   # optional
//!     saved_at: <RFC 3339>
//! ```
//! Every mutation rewrites the whole file through a temp file in the same
//! directory, so a crash leaves either the old or the new document.

use crate::backend::{BackendKind, PetBackend};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use petkeeper_common::{OwnerIdentity, OwnerRecord, PetConfiguration, PetSpecies, RiderConfiguration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current file schema version.
const FILE_SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileMeta {
    #[serde(default = "current_schema")]
    schema_version: u32,
    #[serde(default)]
    identity_migrated: bool,
}

fn current_schema() -> u32 {
    FILE_SCHEMA_VERSION
}

impl Default for FileMeta {
    fn default() -> Self {
        Self {
            schema_version: FILE_SCHEMA_VERSION,
            identity_migrated: false,
        }
    }
}

/// Species stays a plain string here so one unknown type only spoils its
/// own entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FilePet {
    #[serde(rename = "type")]
    species: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    data: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FileEntry {
    pet: FilePet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rider: Option<FilePet>,
    /// Entries written before timestamps were kept sort as oldest.
    #[serde(default)]
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileDoc {
    #[serde(default)]
    meta: FileMeta,
    #[serde(default)]
    autosave: BTreeMap<String, FileEntry>,
}

impl FileEntry {
    fn from_record(record: &OwnerRecord) -> Self {
        let pet = &record.pet;
        Self {
            pet: FilePet {
                species: pet.species.as_str().to_string(),
                name: pet.name.clone(),
                data: pet.payload,
            },
            rider: pet.rider.as_ref().map(|rider| FilePet {
                species: rider.species.as_str().to_string(),
                name: rider.name.clone(),
                data: rider.payload,
            }),
            saved_at: record.saved_at,
        }
    }

    fn to_record(&self) -> Result<OwnerRecord, String> {
        let rider = match &self.rider {
            Some(r) => Some(RiderConfiguration {
                species: parse_species(&r.species)?,
                name: r.name.clone(),
                payload: r.data,
            }),
            None => None,
        };
        let pet = PetConfiguration {
            species: parse_species(&self.pet.species)?,
            name: self.pet.name.clone(),
            payload: self.pet.data,
            rider,
        };
        pet.validate().map_err(|err| err.to_string())?;
        Ok(OwnerRecord::at(pet, self.saved_at))
    }
}

fn parse_species(text: &str) -> Result<PetSpecies, String> {
    text.parse().map_err(|err: petkeeper_common::UnknownSpecies| err.to_string())
}

/// Pet records kept in one YAML document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    doc: FileDoc,
}

impl FileStore {
    /// Open the document at `path`, creating an empty one if absent.
    /// Refuses documents written by a newer schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                FileDoc::default()
            } else {
                serde_yaml::from_str::<FileDoc>(&text)?
            }
        } else {
            FileDoc::default()
        };
        if doc.meta.schema_version > FILE_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                file_version: doc.meta.schema_version,
                expected_version: FILE_SCHEMA_VERSION,
            });
        }

        let mut store = Self { path, doc };
        if store.doc.meta.schema_version < FILE_SCHEMA_VERSION {
            tracing::info!(
                from = store.doc.meta.schema_version,
                to = FILE_SCHEMA_VERSION,
                "upgrading pet file schema"
            );
            store.doc.meta.schema_version = FILE_SCHEMA_VERSION;
        }
        store.save()?;
        tracing::debug!(path = %store.path.display(), owners = store.doc.autosave.len(), "file store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let text = serde_yaml::to_string(&self.doc)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl PetBackend for FileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn upsert(&mut self, owner: &OwnerIdentity, record: &OwnerRecord) -> Result<(), StoreError> {
        self.doc
            .autosave
            .insert(owner.key(), FileEntry::from_record(record));
        self.save()
    }

    fn load(&mut self, owner: &OwnerIdentity) -> Result<Option<OwnerRecord>, StoreError> {
        let Some(entry) = self.doc.autosave.get(&owner.key()) else {
            return Ok(None);
        };
        let record = entry.to_record().map_err(|reason| StoreError::Corrupt {
            owner: owner.key(),
            reason,
        })?;
        Ok(Some(record))
    }

    fn delete(&mut self, owner: &OwnerIdentity) -> Result<bool, StoreError> {
        if self.doc.autosave.remove(&owner.key()).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn owners(&mut self) -> Result<Vec<OwnerIdentity>, StoreError> {
        Ok(self
            .doc
            .autosave
            .keys()
            .map(|key| OwnerIdentity::parse(key))
            .collect())
    }

    fn identity_migrated(&mut self) -> Result<bool, StoreError> {
        Ok(self.doc.meta.identity_migrated)
    }

    fn mark_identity_migrated(&mut self) -> Result<(), StoreError> {
        self.doc.meta.identity_migrated = true;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KnownPlayers;
    use chrono::TimeZone;
    use petkeeper_common::PetField;
    use uuid::Uuid;

    fn record(species: PetSpecies, secs: i64) -> OwnerRecord {
        OwnerRecord::at(
            PetConfiguration::new(species),
            Utc.timestamp_opt(secs, 0).unwrap(),
        )
    }

    #[test]
    fn every_species_round_trips_with_and_without_rider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pets.yml");
        let mut store = FileStore::open(&path).unwrap();

        for (i, species) in PetSpecies::ALL.into_iter().enumerate() {
            let mut pet = PetConfiguration::new(species).with_name(format!("{species} #{i}"));
            if let Some(spec) = species.layout().last() {
                let value = match spec.domain {
                    petkeeper_common::FieldDomain::Flag => 1,
                    petkeeper_common::FieldDomain::Range { max, .. } => max,
                };
                pet.payload = spec.write(pet.payload, value).unwrap();
            }
            let plain = OwnerRecord::new(pet.clone());
            let ridden = OwnerRecord::new(
                pet.with_rider(RiderConfiguration::new(PetSpecies::Zombie)),
            );
            let a = OwnerIdentity::name(format!("plain{i}"));
            let b = OwnerIdentity::unique(Uuid::new_v4());
            store.upsert(&a, &plain).unwrap();
            store.upsert(&b, &ridden).unwrap();
            assert_eq!(store.load(&a).unwrap(), Some(plain.clone()));
            assert_eq!(store.load(&b).unwrap(), Some(ridden.clone()));
        }

        let mut reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.owners().unwrap().len(), PetSpecies::ALL.len() * 2);
    }

    #[test]
    fn delete_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("pets.yml")).unwrap();
        let alice = OwnerIdentity::name("Alice");
        assert!(!store.delete(&alice).unwrap());
        store.upsert(&alice, &record(PetSpecies::Pig, 10)).unwrap();
        assert!(store.delete(&alice).unwrap());
        assert_eq!(store.load(&alice).unwrap(), None);
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pets.yml");
        std::fs::write(&path, "meta:\n  schema_version: 99\n").unwrap();
        match FileStore::open(&path) {
            Err(StoreError::SchemaMismatch { file_version, .. }) => assert_eq!(file_version, 99),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn older_documents_stay_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pets.yml");
        std::fs::write(&path, "autosave:\n  Bob:\n    pet:\n      type: wolf\n      data: 58\n").unwrap();
        let mut store = FileStore::open(&path).unwrap();
        let loaded = store.load(&OwnerIdentity::name("Bob")).unwrap().unwrap();
        assert_eq!(loaded.pet.species, PetSpecies::Wolf);
        assert_eq!(loaded.pet.name, None);
        assert_eq!(loaded.saved_at, DateTime::<Utc>::default());
        let tamed = PetSpecies::Wolf.field_spec(PetField::Tamed).unwrap();
        assert_eq!(tamed.read(loaded.pet.payload), 1);
    }

    #[test]
    fn corrupt_payload_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pets.yml");
        std::fs::write(&path, "autosave:\n  Bob:\n    pet:\n      type: slime\n      data: 0\n").unwrap();
        let mut store = FileStore::open(&path).unwrap();
        assert!(matches!(
            store.load(&OwnerIdentity::name("Bob")),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn unknown_type_spoils_only_its_own_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pets.yml");
        std::fs::write(
            &path,
            "autosave:\n  Alice:\n    pet:\n      type: wolf\n      data: 58\n  \
             Bob:\n    pet:\n      type: SKELETON\n      data: 0\n  \
             Carol:\n    pet:\n      type: dragon\n      data: 0\n  \
             Dave:\n    pet:\n      type: pig\n      data: 0\n    rider:\n      type: unicorn\n",
        )
        .unwrap();
        let mut store = FileStore::open(&path).unwrap();
        let alice = store.load(&OwnerIdentity::name("Alice")).unwrap().unwrap();
        assert_eq!(alice.pet.species, PetSpecies::Wolf);
        let bob = store.load(&OwnerIdentity::name("Bob")).unwrap().unwrap();
        assert_eq!(bob.pet.species, PetSpecies::Skeleton);
        for name in ["Carol", "Dave"] {
            assert!(matches!(
                store.load(&OwnerIdentity::name(name)),
                Err(StoreError::Corrupt { .. })
            ));
        }
        assert_eq!(store.owners().unwrap().len(), 4);
    }

    #[test]
    fn identity_migration_partial_then_complete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("pets.yml")).unwrap();
        let names = ["Alice", "Bob", "Carol", "Dave"];
        for (i, name) in names.iter().enumerate() {
            store
                .upsert(&OwnerIdentity::name(*name), &record(PetSpecies::Pig, i as i64))
                .unwrap();
        }
        let mut players = KnownPlayers::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        players.insert("Alice", alice);
        players.insert("Bob", bob);

        let report = store.migrate_schema(Some(&players)).unwrap();
        assert_eq!(report.migrated.len(), 2);
        assert_eq!(report.unresolved.len(), 2);
        assert!(!report.complete);
        assert!(!store.identity_migrated().unwrap());
        let owners = store.owners().unwrap();
        assert_eq!(owners.iter().filter(|o| o.is_legacy()).count(), 2);
        assert!(owners.contains(&OwnerIdentity::unique(alice)));
        assert_eq!(store.load(&OwnerIdentity::name("Alice")).unwrap(), None);

        players.insert("Carol", Uuid::new_v4());
        players.insert("Dave", Uuid::new_v4());
        let report = store.migrate_schema(Some(&players)).unwrap();
        assert_eq!(report.migrated.len(), 2);
        assert!(report.complete);
        assert!(store.owners().unwrap().iter().all(|o| !o.is_legacy()));

        // Once complete the identity pass is skipped.
        store
            .upsert(&OwnerIdentity::name("Eve"), &record(PetSpecies::Pig, 1))
            .unwrap();
        let report = store.migrate_schema(Some(&players)).unwrap();
        assert!(report.complete);
        assert!(report.migrated.is_empty());
    }

    #[test]
    fn newer_record_wins_on_key_collision() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("pets.yml")).unwrap();
        let id = Uuid::new_v4();
        let old_named = record(PetSpecies::Pig, 100);
        let newer_unique = record(PetSpecies::Wolf, 200);
        store.upsert(&OwnerIdentity::name("Alice"), &old_named).unwrap();
        store.upsert(&OwnerIdentity::unique(id), &newer_unique).unwrap();

        let players: KnownPlayers = [("Alice".to_string(), id)].into_iter().collect();
        store.migrate_schema(Some(&players)).unwrap();
        assert_eq!(store.load(&OwnerIdentity::unique(id)).unwrap(), Some(newer_unique));
        assert_eq!(store.owners().unwrap().len(), 1);
    }
}
