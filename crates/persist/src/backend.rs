use crate::error::StoreError;
use petkeeper_common::{OwnerIdentity, OwnerRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    File,
    Sql,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Sql => "sql",
        })
    }
}

/// Maps a legacy display name to the owner's stable unique id.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Uuid>;
}

/// Name to id directory, usually read from `players.yml`. Names compare
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, Uuid>")]
pub struct KnownPlayers {
    players: BTreeMap<String, Uuid>,
}

impl From<BTreeMap<String, Uuid>> for KnownPlayers {
    fn from(map: BTreeMap<String, Uuid>) -> Self {
        map.into_iter().collect()
    }
}

impl FromIterator<(String, Uuid)> for KnownPlayers {
    fn from_iter<I: IntoIterator<Item = (String, Uuid)>>(iter: I) -> Self {
        Self {
            players: iter
                .into_iter()
                .map(|(name, id)| (name.to_lowercase(), id))
                .collect(),
        }
    }
}

impl KnownPlayers {
    /// Read the directory from a YAML map of `name: uuid`. A missing file is
    /// an empty directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn insert(&mut self, name: &str, id: Uuid) {
        self.players.insert(name.to_lowercase(), id);
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl IdentityResolver for KnownPlayers {
    fn resolve(&self, name: &str) -> Option<Uuid> {
        self.players.get(&name.to_lowercase()).copied()
    }
}

/// One name-keyed record moved under its unique id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMove {
    pub name: String,
    pub id: Uuid,
}

/// Outcome of one migration run on one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub migrated: Vec<IdentityMove>,
    /// Names still keyed by name; retried on the next run.
    pub unresolved: Vec<String>,
    pub legacy_rows_copied: usize,
    /// Legacy rows that could not be carried forward (no owner or no type).
    #[serde(default)]
    pub legacy_rows_skipped: usize,
    /// Identity migration is finished for this backend.
    pub complete: bool,
}

/// Result of copying legacy schema rows forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyCopy {
    pub copied: usize,
    pub skipped: usize,
}

/// One durable home for owner records.
///
/// Both backends share the logical schema: owner key to [`OwnerRecord`].
pub trait PetBackend: Send {
    fn kind(&self) -> BackendKind;

    fn upsert(&mut self, owner: &OwnerIdentity, record: &OwnerRecord) -> Result<(), StoreError>;

    fn load(&mut self, owner: &OwnerIdentity) -> Result<Option<OwnerRecord>, StoreError>;

    /// Returns whether a record existed.
    fn delete(&mut self, owner: &OwnerIdentity) -> Result<bool, StoreError>;

    fn owners(&mut self) -> Result<Vec<OwnerIdentity>, StoreError>;

    fn identity_migrated(&mut self) -> Result<bool, StoreError>;

    fn mark_identity_migrated(&mut self) -> Result<(), StoreError>;

    /// Copy rows from older schema versions into the current one. Backends
    /// without a schema history have nothing to do.
    fn migrate_legacy_tables(&mut self) -> Result<LegacyCopy, StoreError> {
        Ok(LegacyCopy::default())
    }

    /// Move `record` from `from` to `to`, removing the old key.
    fn rekey(
        &mut self,
        from: &OwnerIdentity,
        to: &OwnerIdentity,
        record: &OwnerRecord,
    ) -> Result<(), StoreError> {
        self.upsert(to, record)?;
        self.delete(from)?;
        Ok(())
    }

    /// Move whatever is stored under `from` to `to`. If `to` already holds
    /// a record the newer of the two survives; `from` is gone either way.
    /// Returns whether `from` held a record.
    fn move_record(&mut self, from: &OwnerIdentity, to: &OwnerIdentity) -> Result<bool, StoreError> {
        let Some(record) = self.load(from)? else {
            return Ok(false);
        };
        match self.load(to)? {
            Some(existing) if !record.is_newer_than(&existing) => {
                self.delete(from)?;
            }
            _ => self.rekey(from, to, &record)?,
        }
        Ok(true)
    }

    /// Run schema migration, then identity-key migration when a resolver
    /// is supplied.
    ///
    /// A name-keyed record whose owner resolves is rewritten under the
    /// unique id. If a unique-keyed record already exists the newer of the
    /// two survives. The completion flag is set only once nothing is left
    /// unresolved; after that the identity pass is skipped.
    fn migrate_schema(
        &mut self,
        resolver: Option<&dyn IdentityResolver>,
    ) -> Result<MigrationReport, StoreError> {
        let legacy = self.migrate_legacy_tables()?;
        let mut report = MigrationReport {
            legacy_rows_copied: legacy.copied,
            legacy_rows_skipped: legacy.skipped,
            ..MigrationReport::default()
        };
        if self.identity_migrated()? {
            report.complete = true;
            return Ok(report);
        }
        let Some(resolver) = resolver else {
            return Ok(report);
        };

        for owner in self.owners()? {
            let Some(name) = owner.legacy_name() else {
                continue;
            };
            let Some(id) = resolver.resolve(name) else {
                report.unresolved.push(name.to_string());
                continue;
            };
            if !self.move_record(&owner, &OwnerIdentity::unique(id))? {
                continue;
            }
            tracing::debug!(backend = %self.kind(), name, %id, "owner re-keyed");
            report.migrated.push(IdentityMove {
                name: name.to_string(),
                id,
            });
        }

        if report.unresolved.is_empty() {
            self.mark_identity_migrated()?;
            report.complete = true;
        }
        tracing::info!(
            backend = %self.kind(),
            migrated = report.migrated.len(),
            unresolved = report.unresolved.len(),
            legacy_rows = report.legacy_rows_copied,
            legacy_skipped = report.legacy_rows_skipped,
            complete = report.complete,
            "migration pass finished"
        );
        Ok(report)
    }
}
