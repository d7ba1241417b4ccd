//! SQLite backend.
//!
//! Current rows live in `Pets_v3`. Older plugin versions wrote `Pets_v2`
//! (riders were called mounts) and `Pets_v1` (no riders); those tables are
//! copied forward once and never touched again.

use crate::backend::{BackendKind, LegacyCopy, PetBackend};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use petkeeper_common::{OwnerIdentity, OwnerRecord, PetConfiguration, PetSpecies, RiderConfiguration};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use std::path::Path;
use std::time::Duration;

const CURRENT_TABLE: &str = "Pets_v3";
const META_IDENTITY_MIGRATED: &str = "identity_migrated";

/// Legacy tables, newest first, with the select list that maps their
/// columns onto the current table.
const LEGACY_TABLES: &[(&str, &str)] = &[
    (
        "Pets_v2",
        "OwnerName, PetType, PetName, PetData, MountPetType, MountPetName, MountPetData",
    ),
    ("Pets_v1", "OwnerName, PetType, PetName, PetData, NULL, NULL, NULL"),
];

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Pets_v3 (
        OwnerName    TEXT PRIMARY KEY NOT NULL,
        PetType      TEXT NOT NULL,
        PetName      TEXT,
        PetData      INTEGER NOT NULL,
        RiderPetType TEXT,
        RiderPetName TEXT,
        RiderPetData INTEGER,
        SavedAt      TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS PetKeeper_meta (
        Key   TEXT PRIMARY KEY NOT NULL,
        Value TEXT NOT NULL
    );
";

/// Pet records in a SQLite database.
#[derive(Debug)]
pub struct SqlStore {
    conn: Connection,
}

impl SqlStore {
    /// Open (or create) the database file. `busy_timeout` bounds how long a
    /// statement waits on a locked database before failing.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(busy_timeout)?;
        tracing::debug!(path = %path.display(), "sql store opened");
        Self::init(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, creating the current tables if needed.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Raw connection, for inspection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT Value FROM PetKeeper_meta WHERE Key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO PetKeeper_meta (Key, Value) VALUES (?1, ?2)
             ON CONFLICT(Key) DO UPDATE SET Value = excluded.Value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Columns of a `Pets_v3` row, before interpretation.
struct RawRow {
    pet_type: String,
    pet_name: Option<String>,
    pet_data: i64,
    rider_type: Option<String>,
    rider_name: Option<String>,
    rider_data: Option<i64>,
    saved_at: DateTime<Utc>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pet_type: row.get(0)?,
            pet_name: row.get(1)?,
            pet_data: row.get(2)?,
            rider_type: row.get(3)?,
            rider_name: row.get(4)?,
            rider_data: row.get(5)?,
            saved_at: row.get(6)?,
        })
    }

    fn into_record(self, owner: &OwnerIdentity) -> Result<OwnerRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            owner: owner.key(),
            reason,
        };
        let species: PetSpecies = self.pet_type.parse().map_err(|e| corrupt(format!("{e}")))?;
        let rider = match self.rider_type {
            Some(kind) => Some(RiderConfiguration {
                species: kind.parse().map_err(|e| corrupt(format!("{e}")))?,
                name: self.rider_name,
                payload: self.rider_data.unwrap_or_default(),
            }),
            None => None,
        };
        let pet = PetConfiguration {
            species,
            name: self.pet_name,
            payload: self.pet_data,
            rider,
        };
        pet.validate().map_err(|e| corrupt(e.to_string()))?;
        Ok(OwnerRecord::at(pet, self.saved_at))
    }
}

/// A legacy row as stored; every column may be NULL.
struct LegacyRow {
    owner: Option<String>,
    pet_type: Option<String>,
    pet_name: Option<String>,
    pet_data: Option<i64>,
    rider_type: Option<String>,
    rider_name: Option<String>,
    rider_data: Option<i64>,
}

impl LegacyRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            owner: row.get(0)?,
            pet_type: row.get(1)?,
            pet_name: row.get(2)?,
            pet_data: row.get(3)?,
            rider_type: row.get(4)?,
            rider_name: row.get(5)?,
            rider_data: row.get(6)?,
        })
    }
}

/// Default payload of a stored type name; unknown names get 0 and are
/// reported as corrupt when loaded.
fn default_payload_for(pet_type: &str) -> i64 {
    pet_type
        .parse::<PetSpecies>()
        .map(PetSpecies::default_payload)
        .unwrap_or_default()
}

impl PetBackend for SqlStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Sql
    }

    fn upsert(&mut self, owner: &OwnerIdentity, record: &OwnerRecord) -> Result<(), StoreError> {
        let pet = &record.pet;
        let rider = pet.rider.as_ref();
        self.conn.execute(
            "INSERT INTO Pets_v3
                (OwnerName, PetType, PetName, PetData, RiderPetType, RiderPetName, RiderPetData, SavedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(OwnerName) DO UPDATE SET
                PetType = excluded.PetType,
                PetName = excluded.PetName,
                PetData = excluded.PetData,
                RiderPetType = excluded.RiderPetType,
                RiderPetName = excluded.RiderPetName,
                RiderPetData = excluded.RiderPetData,
                SavedAt = excluded.SavedAt",
            params![
                owner.key(),
                pet.species.as_str(),
                pet.name,
                pet.payload,
                rider.map(|r| r.species.as_str()),
                rider.and_then(|r| r.name.clone()),
                rider.map(|r| r.payload),
                record.saved_at,
            ],
        )?;
        Ok(())
    }

    fn load(&mut self, owner: &OwnerIdentity) -> Result<Option<OwnerRecord>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT PetType, PetName, PetData, RiderPetType, RiderPetName, RiderPetData, SavedAt
                 FROM Pets_v3 WHERE OwnerName = ?1",
                params![owner.key()],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(|raw| raw.into_record(owner)).transpose()
    }

    fn delete(&mut self, owner: &OwnerIdentity) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM Pets_v3 WHERE OwnerName = ?1", params![owner.key()])?;
        Ok(n > 0)
    }

    fn owners(&mut self) -> Result<Vec<OwnerIdentity>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT OwnerName FROM Pets_v3 ORDER BY OwnerName")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys.iter().map(|key| OwnerIdentity::parse(key)).collect())
    }

    fn identity_migrated(&mut self) -> Result<bool, StoreError> {
        Ok(self.meta(META_IDENTITY_MIGRATED)?.as_deref() == Some("1"))
    }

    fn mark_identity_migrated(&mut self) -> Result<(), StoreError> {
        self.set_meta(META_IDENTITY_MIGRATED, "1")
    }

    /// Copy each legacy table once. Rows already present in the current
    /// table are kept as they are. Legacy tables had no NOT NULL
    /// constraints: a row without owner or type is skipped, a missing
    /// payload becomes the species default.
    fn migrate_legacy_tables(&mut self) -> Result<LegacyCopy, StoreError> {
        let mut total = LegacyCopy::default();
        for &(table, columns) in LEGACY_TABLES {
            let marker = format!("copied_{table}");
            if !self.table_exists(table)? || self.meta(&marker)?.is_some() {
                continue;
            }
            let tx = self.conn.transaction()?;
            let rows = {
                let mut stmt = tx.prepare(&format!("SELECT {columns} FROM {table}"))?;
                stmt.query_map([], LegacyRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?
            };
            let mut copy = LegacyCopy::default();
            for row in rows {
                let (Some(owner), Some(pet_type)) = (row.owner, row.pet_type) else {
                    tracing::warn!(table, "legacy row without owner or type skipped");
                    copy.skipped += 1;
                    continue;
                };
                let rider_data = match (&row.rider_type, row.rider_data) {
                    (Some(kind), None) => Some(default_payload_for(kind)),
                    (_, data) => data,
                };
                copy.copied += tx.execute(
                    &format!(
                        "INSERT INTO {CURRENT_TABLE}
                            (OwnerName, PetType, PetName, PetData, RiderPetType, RiderPetName, RiderPetData, SavedAt)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                         ON CONFLICT(OwnerName) DO NOTHING"
                    ),
                    params![
                        owner,
                        pet_type,
                        row.pet_name,
                        row.pet_data.unwrap_or_else(|| default_payload_for(&pet_type)),
                        row.rider_type,
                        row.rider_name,
                        rider_data,
                        DateTime::<Utc>::default(),
                    ],
                )?;
            }
            tx.execute(
                "INSERT INTO PetKeeper_meta (Key, Value) VALUES (?1, ?2)",
                params![marker, copy.copied.to_string()],
            )?;
            tx.commit()?;
            tracing::info!(table, rows = copy.copied, skipped = copy.skipped, "legacy pet table copied");
            total.copied += copy.copied;
            total.skipped += copy.skipped;
        }
        Ok(total)
    }

    fn rekey(
        &mut self,
        from: &OwnerIdentity,
        to: &OwnerIdentity,
        record: &OwnerRecord,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM Pets_v3 WHERE OwnerName = ?1", params![to.key()])?;
        tx.execute(
            "UPDATE Pets_v3 SET OwnerName = ?1, SavedAt = ?2 WHERE OwnerName = ?3",
            params![to.key(), record.saved_at, from.key()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::KnownPlayers;
    use chrono::TimeZone;
    use petkeeper_common::{FieldDomain, PetField};
    use uuid::Uuid;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn every_species_round_trips_with_and_without_rider() {
        let mut store = SqlStore::open_in_memory().unwrap();
        for (i, species) in PetSpecies::ALL.into_iter().enumerate() {
            let mut pet = PetConfiguration::new(species);
            for spec in species.layout() {
                let value = match spec.domain {
                    FieldDomain::Flag => 1,
                    FieldDomain::Range { max, .. } => max,
                };
                pet.payload = spec.write(pet.payload, value).unwrap();
            }
            let plain = OwnerRecord::new(pet.clone());
            let mut rider = RiderConfiguration::new(PetSpecies::Sheep);
            rider.name = Some("Dolly".into());
            let ridden = OwnerRecord::new(pet.with_name("Named").with_rider(rider));

            let a = OwnerIdentity::name(format!("owner{i}"));
            let b = OwnerIdentity::unique(Uuid::new_v4());
            store.upsert(&a, &plain).unwrap();
            store.upsert(&b, &ridden).unwrap();
            assert_eq!(store.load(&a).unwrap(), Some(plain));
            assert_eq!(store.load(&b).unwrap(), Some(ridden));
        }
    }

    #[test]
    fn upsert_replaces_and_clears_rider() {
        let mut store = SqlStore::open_in_memory().unwrap();
        let owner = OwnerIdentity::name("Alice");
        let ridden = PetConfiguration::new(PetSpecies::Pig)
            .with_rider(RiderConfiguration::new(PetSpecies::Zombie));
        store.upsert(&owner, &OwnerRecord::at(ridden, at(1))).unwrap();
        let bare = OwnerRecord::at(PetConfiguration::new(PetSpecies::Pig), at(2));
        store.upsert(&owner, &bare).unwrap();
        assert_eq!(store.load(&owner).unwrap(), Some(bare));
        assert_eq!(store.owners().unwrap(), vec![owner]);
    }

    #[test]
    fn file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("pets.db");
        let owner = OwnerIdentity::name("Alice");
        let record = OwnerRecord::at(PetConfiguration::new(PetSpecies::Blaze), at(5));
        {
            let mut store = SqlStore::open(&path, Duration::from_millis(100)).unwrap();
            store.upsert(&owner, &record).unwrap();
        }
        let mut store = SqlStore::open(&path, Duration::from_millis(100)).unwrap();
        assert_eq!(store.load(&owner).unwrap(), Some(record));
        assert!(store.delete(&owner).unwrap());
        assert!(!store.delete(&owner).unwrap());
    }

    #[test]
    fn legacy_v2_row_is_copied_and_left_in_place() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Pets_v2 (
                OwnerName TEXT PRIMARY KEY, PetType TEXT, PetName TEXT, PetData INTEGER,
                MountPetType TEXT, MountPetName TEXT, MountPetData INTEGER
             );
             INSERT INTO Pets_v2 VALUES ('Bob', 'SKELETON', 'Rattles', 1, 'pig', NULL, 1);",
        )
        .unwrap();
        let mut store = SqlStore::from_connection(conn).unwrap();

        let report = store.migrate_schema(None).unwrap();
        assert_eq!(report.legacy_rows_copied, 1);
        assert!(!report.complete);

        let current: (String, String, Option<String>, i64, Option<String>, Option<String>, Option<i64>) =
            store
                .connection()
                .query_row(
                    "SELECT OwnerName, PetType, PetName, PetData, RiderPetType, RiderPetName, RiderPetData
                     FROM Pets_v3 WHERE OwnerName = 'Bob'",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?)),
                )
                .unwrap();
        assert_eq!(
            current,
            (
                "Bob".to_string(),
                "SKELETON".to_string(),
                Some("Rattles".to_string()),
                1,
                Some("pig".to_string()),
                None,
                Some(1)
            )
        );

        let legacy: (i64, String) = store
            .connection()
            .query_row(
                "SELECT COUNT(*), MAX(PetType) FROM Pets_v2",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(legacy, (1, "SKELETON".to_string()));

        let loaded = store.load(&OwnerIdentity::name("Bob")).unwrap().unwrap();
        assert_eq!(loaded.pet.species, PetSpecies::Skeleton);
        let variant = PetSpecies::Skeleton.field_spec(PetField::Variant).unwrap();
        assert_eq!(variant.read(loaded.pet.payload), 1);
        assert_eq!(loaded.pet.rider.unwrap().species, PetSpecies::Pig);

        // A second run copies nothing.
        assert_eq!(store.migrate_schema(None).unwrap().legacy_rows_copied, 0);
    }

    #[test]
    fn legacy_copy_never_overwrites_current_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Pets_v1 (OwnerName TEXT, PetType TEXT, PetName TEXT, PetData INTEGER);
             INSERT INTO Pets_v1 VALUES ('Alice', 'pig', NULL, 0);
             INSERT INTO Pets_v1 VALUES ('Carol', 'creeper', NULL, 1);",
        )
        .unwrap();
        let mut store = SqlStore::from_connection(conn).unwrap();
        let alice = OwnerIdentity::name("Alice");
        let current = OwnerRecord::at(PetConfiguration::new(PetSpecies::Wolf), at(9));
        store.upsert(&alice, &current).unwrap();

        let report = store.migrate_schema(None).unwrap();
        assert_eq!(report.legacy_rows_copied, 1);
        assert_eq!(store.load(&alice).unwrap(), Some(current));
        let carol = store.load(&OwnerIdentity::name("Carol")).unwrap().unwrap();
        assert_eq!(carol.pet.species, PetSpecies::Creeper);
        assert!(carol.pet.rider.is_none());
    }

    #[test]
    fn identity_migration_counts() {
        let mut store = SqlStore::open_in_memory().unwrap();
        let mut players = KnownPlayers::default();
        for i in 0..5 {
            let name = format!("player{i}");
            let record = OwnerRecord::at(PetConfiguration::new(PetSpecies::Sheep), at(i));
            store.upsert(&OwnerIdentity::name(&name), &record).unwrap();
            if i < 3 {
                players.insert(&name, Uuid::new_v4());
            }
        }
        let report = store.migrate_schema(Some(&players)).unwrap();
        assert_eq!(report.migrated.len(), 3);
        assert_eq!(report.unresolved.len(), 2);
        assert!(!store.identity_migrated().unwrap());
        let owners = store.owners().unwrap();
        assert_eq!(owners.iter().filter(|o| !o.is_legacy()).count(), 3);
        assert_eq!(owners.iter().filter(|o| o.is_legacy()).count(), 2);

        for name in &report.migrated {
            let record = store.load(&OwnerIdentity::unique(name.id)).unwrap();
            assert!(record.is_some());
        }
    }

    #[test]
    fn migrated_flag_is_set_when_everything_resolves() {
        let mut store = SqlStore::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        let record = OwnerRecord::at(PetConfiguration::new(PetSpecies::Ocelot), at(3));
        store.upsert(&OwnerIdentity::name("Zed"), &record).unwrap();
        let players: KnownPlayers = [("zed".to_string(), id)].into_iter().collect();
        let report = store.migrate_schema(Some(&players)).unwrap();
        assert!(report.complete);
        assert!(store.identity_migrated().unwrap());
        assert_eq!(store.load(&OwnerIdentity::unique(id)).unwrap(), Some(record));
    }

    #[test]
    fn legacy_rows_with_missing_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Pets_v2 (
                OwnerName TEXT, PetType TEXT, PetName TEXT, PetData INTEGER,
                MountPetType TEXT, MountPetName TEXT, MountPetData INTEGER
             );
             INSERT INTO Pets_v2 VALUES ('Bob', 'pig', NULL, 1, NULL, NULL, NULL);
             INSERT INTO Pets_v2 VALUES ('Carol', 'wolf', 'Fang', NULL, 'zombie', NULL, NULL);
             INSERT INTO Pets_v2 VALUES ('Dave', NULL, NULL, 3, NULL, NULL, NULL);",
        )
        .unwrap();
        let mut store = SqlStore::from_connection(conn).unwrap();

        let report = store.migrate_schema(None).unwrap();
        assert_eq!(report.legacy_rows_copied, 2);
        assert_eq!(report.legacy_rows_skipped, 1);

        assert!(store.load(&OwnerIdentity::name("Bob")).unwrap().is_some());
        let carol = store.load(&OwnerIdentity::name("Carol")).unwrap().unwrap();
        assert_eq!(carol.pet.species, PetSpecies::Wolf);
        assert_eq!(carol.pet.payload, PetSpecies::Wolf.default_payload());
        let rider = carol.pet.rider.unwrap();
        assert_eq!(rider.species, PetSpecies::Zombie);
        assert_eq!(rider.payload, PetSpecies::Zombie.default_payload());
        assert!(store.load(&OwnerIdentity::name("Dave")).unwrap().is_none());

        let second = store.migrate_schema(None).unwrap();
        assert_eq!((second.legacy_rows_copied, second.legacy_rows_skipped), (0, 0));
    }
}
