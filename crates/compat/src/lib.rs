//! Version adapters: one implementation per supported host revision.
//!
//! Everything that differs between host binaries (static table names,
//! internal field names, constructor signatures of the pet classes) lives
//! behind [`VersionAdapter`]. Nothing above this crate names a revision.
//!
//! # Invariants
//! - Adapter operations never block and are idempotent.
//! - Selecting an adapter installs the revision's pet classes into the host;
//!   selecting again models a reload and yields fresh class generations.

mod v1_6_r3;
mod v1_8_r1;

pub use v1_6_r3::AdapterV1_6R3;
pub use v1_8_r1::AdapterV1_8R1;

use petkeeper_common::{EntityId, HostRevision, OwnerIdentity, PetSpecies};
use petkeeper_kernel::{ClassDef, ClassHandle, HostError, HostValue, StaticTable, ValueKind, World};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompatError {
    #[error("no adapter for host revision {0}")]
    UnsupportedHostVersion(HostRevision),
    #[error("no class registered for logical name {0:?}")]
    UnknownClass(String),
    #[error("constructing {class} failed: {source}")]
    ConstructionError {
        class: String,
        #[source]
        source: HostError,
    },
    #[error("field {field} is not accessible: {source}")]
    FieldAccessError {
        field: FieldId,
        #[source]
        source: HostError,
    },
    #[error("type table {table} (static {static_name:?}) is missing")]
    TableMissing {
        table: TypeTable,
        static_name: &'static str,
    },
}

/// Internal object fields the pet code needs to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldId {
    FireProof,
    Width,
    Height,
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FireProof => "fire_proof",
            Self::Width => "width",
            Self::Height => "height",
        })
    }
}

/// The four host creature type tables the registry maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTable {
    NameToClass,
    ClassToName,
    ClassToId,
    NameToId,
}

impl TypeTable {
    pub const ALL: [TypeTable; 4] = [
        Self::NameToClass,
        Self::ClassToName,
        Self::ClassToId,
        Self::NameToId,
    ];
}

impl fmt::Display for TypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NameToClass => "name->class",
            Self::ClassToName => "class->name",
            Self::ClassToId => "class->id",
            Self::NameToId => "name->id",
        })
    }
}

/// Capabilities the pet code needs from the host, independent of revision.
///
/// Implementors provide the revision-specific names; the provided methods
/// do the actual host calls and map host failures to [`CompatError`].
pub trait VersionAdapter: fmt::Debug {
    fn revision(&self) -> HostRevision;

    /// Concrete implementation class for a logical name such as
    /// `EntitySkeletonPet`.
    fn resolve_class(&self, logical: &str) -> Result<ClassHandle, CompatError>;

    /// Constructor arguments this revision's pet classes expect.
    fn pet_ctor_args(&self, owner: &OwnerIdentity, species: PetSpecies) -> Vec<HostValue>;

    /// Revision-specific name of an internal object field.
    fn field_name(&self, field: FieldId) -> &'static str;

    /// Revision-specific name of the static holding a type table.
    fn table_name(&self, table: TypeTable) -> &'static str;

    fn construct(
        &self,
        world: &mut World,
        class: &ClassHandle,
        args: &[HostValue],
    ) -> Result<EntityId, CompatError> {
        world
            .construct(class, args)
            .map_err(|source| CompatError::ConstructionError {
                class: class.canonical_name().to_string(),
                source,
            })
    }

    fn get_field(
        &self,
        world: &World,
        object: EntityId,
        field: FieldId,
    ) -> Result<HostValue, CompatError> {
        world
            .internal(object, self.field_name(field))
            .cloned()
            .map_err(|source| CompatError::FieldAccessError { field, source })
    }

    fn set_field(
        &self,
        world: &mut World,
        object: EntityId,
        field: FieldId,
        value: HostValue,
    ) -> Result<(), CompatError> {
        world
            .set_internal(object, self.field_name(field), value)
            .map_err(|source| CompatError::FieldAccessError { field, source })
    }

    fn type_table<'w>(
        &self,
        world: &'w World,
        table: TypeTable,
    ) -> Result<&'w StaticTable, CompatError> {
        let static_name = self.table_name(table);
        world
            .static_field(static_name)
            .ok_or(CompatError::TableMissing { table, static_name })
    }

    fn type_table_mut<'w>(
        &self,
        world: &'w mut World,
        table: TypeTable,
    ) -> Result<&'w mut StaticTable, CompatError> {
        let static_name = self.table_name(table);
        world
            .static_field_mut(static_name)
            .ok_or(CompatError::TableMissing { table, static_name })
    }
}

/// Logical class name of a species' pet implementation.
pub fn pet_class_name(species: PetSpecies) -> String {
    let base = species.display_name().trim_end_matches(" Pet");
    format!("Entity{base}Pet")
}

/// Host revisions an adapter exists for.
pub fn supported_revisions() -> [HostRevision; 2] {
    [AdapterV1_6R3::REVISION, AdapterV1_8R1::REVISION]
}

/// Pick the adapter matching the running host and install its pet classes.
pub fn select_adapter(world: &mut World) -> Result<Box<dyn VersionAdapter>, CompatError> {
    let revision = world.revision().clone();
    let adapter: Box<dyn VersionAdapter> = if revision == AdapterV1_6R3::REVISION {
        Box::new(AdapterV1_6R3::install(world))
    } else if revision == AdapterV1_8R1::REVISION {
        Box::new(AdapterV1_8R1::install(world))
    } else {
        return Err(CompatError::UnsupportedHostVersion(revision));
    };
    tracing::info!(%revision, "version adapter selected");
    Ok(adapter)
}

/// Define one pet class per species under `package`. Returns the handles
/// keyed by logical name.
fn install_pet_classes(
    world: &mut World,
    package: &str,
    ctor: &[ValueKind],
) -> BTreeMap<String, ClassHandle> {
    PetSpecies::ALL
        .into_iter()
        .map(|species| {
            let logical = pet_class_name(species);
            let handle = world.define_class(ClassDef {
                canonical: format!("{package}.{logical}"),
                ctor: ctor.to_vec(),
                dimensions: species.base_dimensions(),
            });
            tracing::debug!(class = %handle, "pet class installed");
            (logical, handle)
        })
        .collect()
}

fn lookup(classes: &BTreeMap<String, ClassHandle>, logical: &str) -> Result<ClassHandle, CompatError> {
    classes
        .get(logical)
        .cloned()
        .ok_or_else(|| CompatError::UnknownClass(logical.to_string()))
}
