use crate::error::PetError;
use petkeeper_common::PetSpecies;
use petkeeper_compat::{CompatError, TypeTable, VersionAdapter, pet_class_name};
use petkeeper_kernel::{ClassHandle, StaticTable, World};
use std::collections::BTreeMap;

/// Overrides host creature type table entries so each species spawns as
/// its pet class.
///
/// This is the only code that writes to the host type tables. Entries are
/// matched by class identity (canonical name, any generation) and by exact
/// type name, so registering again after a reload replaces the old entries
/// instead of adding new ones.
#[derive(Debug, Default)]
pub struct EntityTypeRegistry {
    registered: BTreeMap<PetSpecies, ClassHandle>,
}

fn expected_shape(table: TypeTable, found: &StaticTable) -> bool {
    matches!(
        (table, found),
        (TypeTable::NameToClass, StaticTable::NameToClass(_))
            | (TypeTable::ClassToName, StaticTable::ClassToName(_))
            | (TypeTable::ClassToId, StaticTable::ClassToId(_))
            | (TypeTable::NameToId, StaticTable::NameToId(_))
    )
}

fn incompatible(table: TypeTable, reason: impl Into<String>) -> PetError {
    PetError::RegistryIncompatible {
        table,
        reason: reason.into(),
    }
}

impl EntityTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every table, then register every species. Nothing is written
    /// unless all four tables are present and shaped as expected.
    pub fn register_all(
        &mut self,
        world: &mut World,
        adapter: &dyn VersionAdapter,
    ) -> Result<(), PetError> {
        let _span = tracing::info_span!("register_all", revision = %adapter.revision()).entered();
        for table in TypeTable::ALL {
            match adapter.type_table(world, table) {
                Ok(found) if expected_shape(table, found) => {}
                Ok(found) => {
                    return Err(incompatible(table, format!("unexpected shape {}", found.shape())));
                }
                Err(err) => return Err(incompatible(table, err.to_string())),
            }
        }
        for species in PetSpecies::ALL {
            self.register_species(world, adapter, species)?;
        }
        tracing::info!(species = self.registered.len(), "pet types registered");
        Ok(())
    }

    /// Point `species`' host type name and id at its pet class.
    pub fn register_species(
        &mut self,
        world: &mut World,
        adapter: &dyn VersionAdapter,
        species: PetSpecies,
    ) -> Result<ClassHandle, PetError> {
        let class = adapter.resolve_class(&pet_class_name(species))?;
        let name = species.host_name();
        let id = species.registration_id();

        for table in TypeTable::ALL {
            let found = adapter.type_table_mut(world, table).map_err(|err| match err {
                CompatError::TableMissing { .. } => incompatible(table, err.to_string()),
                other => PetError::Compat(other),
            })?;
            match found {
                StaticTable::NameToClass(map) => {
                    map.retain(|n, c| n != name && !c.same_class(&class));
                    map.insert(name.to_string(), class.clone());
                }
                StaticTable::ClassToName(map) => {
                    map.retain(|c, n| n != name && !c.same_class(&class));
                    map.insert(class.clone(), name.to_string());
                }
                StaticTable::ClassToId(map) => {
                    map.retain(|c, _| !c.same_class(&class));
                    map.insert(class.clone(), id);
                }
                StaticTable::NameToId(map) => {
                    map.retain(|n, _| n != name);
                    map.insert(name.to_string(), id);
                }
                other => {
                    return Err(incompatible(table, format!("unexpected shape {}", other.shape())));
                }
            }
        }
        tracing::debug!(%species, %class, "species registered");
        self.registered.insert(species, class.clone());
        Ok(class)
    }

    /// Class the host will spawn for `species`, provided it is ours.
    pub fn resolve(
        &self,
        world: &World,
        adapter: &dyn VersionAdapter,
        species: PetSpecies,
    ) -> Result<ClassHandle, PetError> {
        let ours = self
            .registered
            .get(&species)
            .ok_or(PetError::SpeciesNotRegistered(species))?;
        match adapter.type_table(world, TypeTable::NameToClass)? {
            StaticTable::NameToClass(map) => match map.get(species.host_name()) {
                Some(class) if class == ours => Ok(class.clone()),
                _ => Err(PetError::SpeciesNotRegistered(species)),
            },
            other => Err(incompatible(
                TypeTable::NameToClass,
                format!("unexpected shape {}", other.shape()),
            )),
        }
    }

    pub fn is_registered(&self, species: PetSpecies) -> bool {
        self.registered.contains_key(&species)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petkeeper_common::HostRevision;
    use petkeeper_compat::select_adapter;
    use petkeeper_kernel::HostValue;

    /// Entries in `table` that mention `name` or `class`.
    fn mentions(world: &World, adapter: &dyn VersionAdapter, table: TypeTable, name: &str, class: &ClassHandle) -> usize {
        match adapter.type_table(world, table).unwrap() {
            StaticTable::NameToClass(m) => m.iter().filter(|(n, c)| *n == name || c.same_class(class)).count(),
            StaticTable::ClassToName(m) => m.iter().filter(|(c, n)| *n == name || c.same_class(class)).count(),
            StaticTable::ClassToId(m) => m.keys().filter(|c| c.same_class(class)).count(),
            StaticTable::NameToId(m) => m.keys().filter(|n| *n == name).count(),
            other => panic!("unexpected table {other:?}"),
        }
    }

    #[test]
    fn registering_twice_keeps_one_entry_per_table() {
        let mut world = World::boot(&HostRevision::new(1, 6, 3)).unwrap();
        let adapter = select_adapter(&mut world).unwrap();
        let mut registry = EntityTypeRegistry::new();
        registry.register_all(&mut world, adapter.as_ref()).unwrap();
        let class = registry
            .register_species(&mut world, adapter.as_ref(), PetSpecies::Skeleton)
            .unwrap();
        for table in TypeTable::ALL {
            assert_eq!(mentions(&world, adapter.as_ref(), table, "Skeleton", &class), 1, "{table}");
        }
    }

    #[test]
    fn registering_after_reload_replaces_stale_generation() {
        let mut world = World::boot(&HostRevision::new(1, 8, 1)).unwrap();
        let first = select_adapter(&mut world).unwrap();
        let mut registry = EntityTypeRegistry::new();
        registry.register_all(&mut world, first.as_ref()).unwrap();

        let second = select_adapter(&mut world).unwrap();
        let class = registry
            .register_species(&mut world, second.as_ref(), PetSpecies::Pig)
            .unwrap();
        for table in TypeTable::ALL {
            assert_eq!(mentions(&world, second.as_ref(), table, "Pig", &class), 1, "{table}");
        }
        assert_eq!(registry.resolve(&world, second.as_ref(), PetSpecies::Pig).unwrap(), class);
    }

    #[test]
    fn resolve_requires_our_class() {
        let mut world = World::boot(&HostRevision::new(1, 6, 3)).unwrap();
        let adapter = select_adapter(&mut world).unwrap();
        let registry = EntityTypeRegistry::new();
        assert!(matches!(
            registry.resolve(&world, adapter.as_ref(), PetSpecies::Wolf),
            Err(PetError::SpeciesNotRegistered(PetSpecies::Wolf))
        ));
    }

    #[test]
    fn missing_table_mutates_nothing() {
        let mut world = World::boot(&HostRevision::new(1, 6, 3)).unwrap();
        let adapter = select_adapter(&mut world).unwrap();
        world.remove_static_field("g");
        let before = world.static_field("c").cloned();
        let mut registry = EntityTypeRegistry::new();
        let err = registry.register_all(&mut world, adapter.as_ref()).unwrap_err();
        assert!(matches!(
            err,
            PetError::RegistryIncompatible { table: TypeTable::NameToId, .. }
        ));
        assert_eq!(world.static_field("c").cloned(), before);
        assert!(!registry.is_registered(PetSpecies::Skeleton));
    }

    #[test]
    fn wrong_shape_is_incompatible() {
        let mut world = World::boot(&HostRevision::new(1, 6, 3)).unwrap();
        let adapter = select_adapter(&mut world).unwrap();
        world.set_static_field("d", StaticTable::Value(HostValue::Int(0)));
        let mut registry = EntityTypeRegistry::new();
        assert!(matches!(
            registry.register_all(&mut world, adapter.as_ref()),
            Err(PetError::RegistryIncompatible { table: TypeTable::ClassToName, .. })
        ));
    }
}
