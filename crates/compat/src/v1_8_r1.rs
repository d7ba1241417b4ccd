use crate::{CompatError, FieldId, TypeTable, VersionAdapter, install_pet_classes, lookup};
use petkeeper_common::{HostRevision, OwnerIdentity, PetSpecies};
use petkeeper_kernel::{ClassHandle, HostValue, ValueKind, World};
use std::collections::BTreeMap;

/// Adapter for host `v1_8_R1`.
///
/// This revision renamed the fire-immunity field and its pet constructors
/// also take the numeric creature id.
#[derive(Debug)]
pub struct AdapterV1_8R1 {
    classes: BTreeMap<String, ClassHandle>,
}

impl AdapterV1_8R1 {
    pub const REVISION: HostRevision = HostRevision::new(1, 8, 1);

    pub(crate) fn install(world: &mut World) -> Self {
        let classes = install_pet_classes(
            world,
            "petkeeper.compat.v1_8_R1.entity",
            &[ValueKind::Text, ValueKind::Int],
        );
        Self { classes }
    }
}

impl VersionAdapter for AdapterV1_8R1 {
    fn revision(&self) -> HostRevision {
        Self::REVISION
    }

    fn resolve_class(&self, logical: &str) -> Result<ClassHandle, CompatError> {
        lookup(&self.classes, logical)
    }

    fn pet_ctor_args(&self, owner: &OwnerIdentity, species: PetSpecies) -> Vec<HostValue> {
        vec![
            HostValue::Text(owner.key()),
            HostValue::Int(species.registration_id()),
        ]
    }

    fn field_name(&self, field: FieldId) -> &'static str {
        match field {
            FieldId::FireProof => "ab",
            FieldId::Width => "width",
            FieldId::Height => "length",
        }
    }

    fn table_name(&self, table: TypeTable) -> &'static str {
        match table {
            TypeTable::NameToClass => "c",
            TypeTable::ClassToName => "d",
            TypeTable::ClassToId => "f",
            TypeTable::NameToId => "g",
        }
    }
}
