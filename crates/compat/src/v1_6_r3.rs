use crate::{CompatError, FieldId, TypeTable, VersionAdapter, install_pet_classes, lookup};
use petkeeper_common::{HostRevision, OwnerIdentity, PetSpecies};
use petkeeper_kernel::{ClassHandle, HostValue, ValueKind, World};
use std::collections::BTreeMap;

/// Adapter for host `v1_6_R3`. Pet constructors take the owner key only.
#[derive(Debug)]
pub struct AdapterV1_6R3 {
    classes: BTreeMap<String, ClassHandle>,
}

impl AdapterV1_6R3 {
    pub const REVISION: HostRevision = HostRevision::new(1, 6, 3);

    pub(crate) fn install(world: &mut World) -> Self {
        let classes =
            install_pet_classes(world, "petkeeper.compat.v1_6_R3.entity", &[ValueKind::Text]);
        Self { classes }
    }
}

impl VersionAdapter for AdapterV1_6R3 {
    fn revision(&self) -> HostRevision {
        Self::REVISION
    }

    fn resolve_class(&self, logical: &str) -> Result<ClassHandle, CompatError> {
        lookup(&self.classes, logical)
    }

    fn pet_ctor_args(&self, owner: &OwnerIdentity, _species: PetSpecies) -> Vec<HostValue> {
        vec![HostValue::Text(owner.key())]
    }

    fn field_name(&self, field: FieldId) -> &'static str {
        match field {
            FieldId::FireProof => "fireProof",
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
