use crate::error::PetError;
use crate::registry::EntityTypeRegistry;
use crate::state::PetStateMachine;
use petkeeper_common::{
    EntityId, Location, OwnerIdentity, OwnerRecord, PetConfiguration, PetField, PetSpecies,
    RiderConfiguration,
};
use petkeeper_compat::VersionAdapter;
use petkeeper_kernel::{HostError, Scheduler, World};
use petkeeper_persist::RecordSink;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Ticks between an object entering the world and its deferred setup.
pub const READY_DELAY_TICKS: u64 = 5;

/// Borrowed view of the host pieces a spawn needs.
pub struct Host<'a> {
    pub world: &'a mut World,
    pub adapter: &'a dyn VersionAdapter,
    pub registry: &'a EntityTypeRegistry,
}

/// A spawned pet and, optionally, the rider sitting on it.
#[derive(Debug, Clone)]
pub struct ActivePet {
    owner: OwnerIdentity,
    config: PetConfiguration,
    state: PetStateMachine,
    rider: Option<PetStateMachine>,
}

impl ActivePet {
    pub fn owner(&self) -> &OwnerIdentity {
        &self.owner
    }

    pub fn config(&self) -> &PetConfiguration {
        &self.config
    }

    pub fn state(&self) -> &PetStateMachine {
        &self.state
    }

    pub fn object(&self) -> EntityId {
        self.state.object()
    }

    pub fn rider(&self) -> Option<&PetStateMachine> {
        self.rider.as_ref()
    }

    fn record(&self) -> OwnerRecord {
        OwnerRecord::new(self.config.clone())
    }
}

/// Result of the shutdown sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub removed: usize,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub owner: OwnerIdentity,
    pub error: String,
}

/// Sole owner of the owner to live pet map.
///
/// At most one pet per owner. Every mutation that changes a pet's
/// configuration is handed to the record sink; sink failures never undo the
/// live change.
#[derive(Debug, Default)]
pub struct PetManager {
    live: BTreeMap<OwnerIdentity, ActivePet>,
    pending: Scheduler<EntityId>,
}

impl PetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: &OwnerIdentity) -> Option<&ActivePet> {
        self.live.get(owner)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn owners(&self) -> impl Iterator<Item = &OwnerIdentity> {
        self.live.keys()
    }

    /// Spawn `config` for `owner` at `location`.
    pub fn create(
        &mut self,
        host: &mut Host<'_>,
        sink: &mut dyn RecordSink,
        owner: &OwnerIdentity,
        location: Location,
        config: PetConfiguration,
    ) -> Result<&ActivePet, PetError> {
        if self.live.contains_key(owner) {
            tracing::debug!(%owner, "owner already has a pet");
            return Err(PetError::OwnerAlreadyHasPet(owner.clone()));
        }
        config.validate()?;
        let (state, rider) = self.spawn_configured(host, owner, location, &config)?;

        let pet = ActivePet {
            owner: owner.clone(),
            config,
            state,
            rider,
        };
        sink.save(owner, pet.record());
        tracing::info!(%owner, species = %pet.config.species, object = %pet.object().short(), "pet spawned");
        Ok(self.live.entry(owner.clone()).or_insert(pet))
    }

    /// Despawn `owner`'s pet. Nothing happens if there is none. The stored
    /// record is deleted only when `forget` is set.
    pub fn remove(
        &mut self,
        world: &mut World,
        sink: &mut dyn RecordSink,
        owner: &OwnerIdentity,
        forget: bool,
    ) -> bool {
        if forget {
            sink.forget(owner);
        }
        let Some(pet) = self.live.remove(owner) else {
            return false;
        };
        if let Some(rider) = &pet.rider {
            self.discard(world, rider.object());
        }
        self.discard(world, pet.object());
        tracing::debug!(%owner, forget, "pet removed");
        true
    }

    /// Shutdown sweep: save and despawn every pet. A pet whose object
    /// cannot be destroyed is reported and the sweep goes on.
    pub fn remove_all(&mut self, world: &mut World, sink: &mut dyn RecordSink) -> SweepReport {
        let _span = tracing::info_span!("remove_all", pets = self.live.len()).entered();
        let mut report = SweepReport::default();
        for (owner, pet) in std::mem::take(&mut self.live) {
            sink.save(&owner, pet.record());
            let rider = pet.rider.as_ref().map(|r| r.object());
            let result = rider
                .map_or(Ok(()), |id| destroy_once(world, id))
                .and(destroy_once(world, pet.object()));
            match result {
                Ok(()) => report.removed += 1,
                Err(err) => {
                    tracing::warn!(%owner, error = %err, "pet could not be despawned");
                    report.failures.push(SweepFailure {
                        owner,
                        error: err.to_string(),
                    });
                }
            }
        }
        self.pending = Scheduler::new();
        tracing::info!(removed = report.removed, failed = report.failures.len(), "pet sweep finished");
        report
    }

    /// Change one field of `owner`'s pet.
    pub fn set_field(
        &mut self,
        host: &mut Host<'_>,
        sink: &mut dyn RecordSink,
        owner: &OwnerIdentity,
        field: PetField,
        value: u8,
    ) -> Result<(), PetError> {
        let pet = self.live_mut(owner)?;
        pet.state.set_field(host.world, host.adapter, field, value)?;
        pet.config.payload = pet.state.payload();
        sink.save(owner, pet.record());
        Ok(())
    }

    pub fn rename(
        &mut self,
        world: &mut World,
        sink: &mut dyn RecordSink,
        owner: &OwnerIdentity,
        name: Option<String>,
    ) -> Result<(), PetError> {
        let pet = self.live_mut(owner)?;
        world.set_custom_name(pet.object(), name.clone())?;
        pet.config.name = name;
        sink.save(owner, pet.record());
        Ok(())
    }

    /// Respawn `owner`'s pet as `species` with that species' default fields.
    /// The name and rider carry over. The old pet is only despawned once the
    /// replacement stands; on failure it stays as it was.
    pub fn set_species(
        &mut self,
        host: &mut Host<'_>,
        sink: &mut dyn RecordSink,
        owner: &OwnerIdentity,
        species: PetSpecies,
    ) -> Result<(), PetError> {
        let pet = self.live.get(owner).ok_or_else(|| PetError::NoActivePet(owner.clone()))?;
        let location = host
            .world
            .object(pet.object())
            .and_then(|obj| obj.location)
            .unwrap_or_default();
        let old_pet = pet.object();
        let old_rider = pet.rider.as_ref().map(|r| r.object());
        let mut config = pet.config.clone();
        config.switch_species(species);
        config.validate()?;

        let (state, rider) = self.spawn_configured(host, owner, location, &config)?;
        if let Some(old) = old_rider {
            self.discard(host.world, old);
        }
        self.discard(host.world, old_pet);

        let pet = self.live_mut(owner)?;
        pet.config = config;
        pet.state = state;
        pet.rider = rider;
        sink.save(owner, pet.record());
        tracing::info!(%owner, %species, object = %pet.object().short(), "pet species changed");
        Ok(())
    }

    /// Spawn, replace or remove the rider on `owner`'s pet.
    pub fn set_rider(
        &mut self,
        host: &mut Host<'_>,
        sink: &mut dyn RecordSink,
        owner: &OwnerIdentity,
        rider: Option<RiderConfiguration>,
    ) -> Result<(), PetError> {
        if let Some(rider) = &rider {
            rider.validate()?;
        }
        let pet = self.live.get(owner).ok_or_else(|| PetError::NoActivePet(owner.clone()))?;
        let vehicle = pet.object();
        let old = pet.rider.as_ref().map(|r| r.object());
        let location = host
            .world
            .object(vehicle)
            .and_then(|obj| obj.location)
            .unwrap_or_default();

        let spawned = match &rider {
            Some(config) => Some(self.spawn_rider(host, owner, location, vehicle, config)?),
            None => None,
        };
        if let Some(old) = old {
            self.discard(host.world, old);
        }
        let pet = self.live_mut(owner)?;
        pet.rider = spawned;
        pet.config.rider = rider;
        sink.save(owner, pet.record());
        Ok(())
    }

    /// Persist and despawn when the owner leaves.
    pub fn owner_disconnected(
        &mut self,
        world: &mut World,
        sink: &mut dyn RecordSink,
        owner: &OwnerIdentity,
    ) -> bool {
        if let Some(pet) = self.live.get(owner) {
            sink.save(owner, pet.record());
        }
        self.remove(world, sink, owner, false)
    }

    /// Move a live pet from its legacy name key to the owner's unique id.
    pub fn rekey_owner(&mut self, name: &str, id: Uuid) -> bool {
        let from = OwnerIdentity::name(name);
        let to = OwnerIdentity::unique(id);
        if self.live.contains_key(&to) {
            tracing::debug!(name, %id, "unique key already has a live pet");
            return false;
        }
        let Some(mut pet) = self.live.remove(&from) else {
            return false;
        };
        pet.owner = to.clone();
        self.live.insert(to, pet);
        tracing::debug!(name, %id, "live pet re-keyed");
        true
    }

    /// Run deferred setup for pets whose delay has elapsed.
    pub fn tick(&mut self, world: &mut World) {
        for object in self.pending.take_due(world.tick()) {
            let Some(state) = self.live.values_mut().find_map(|pet| {
                if pet.state.object() == object {
                    Some(&mut pet.state)
                } else {
                    pet.rider.as_mut().filter(|r| r.object() == object)
                }
            }) else {
                continue;
            };
            match state.on_ready(world) {
                Ok(true) => tracing::debug!(object = %object.short(), "pet ready"),
                Ok(false) => {}
                Err(err) => tracing::warn!(object = %object.short(), error = %err, "deferred pet setup failed"),
            }
        }
    }

    fn live_mut(&mut self, owner: &OwnerIdentity) -> Result<&mut ActivePet, PetError> {
        self.live
            .get_mut(owner)
            .ok_or_else(|| PetError::NoActivePet(owner.clone()))
    }

    /// Spawn a configuration's pet and its rider. Nothing is left in the
    /// world on failure.
    fn spawn_configured(
        &mut self,
        host: &mut Host<'_>,
        owner: &OwnerIdentity,
        location: Location,
        config: &PetConfiguration,
    ) -> Result<(PetStateMachine, Option<PetStateMachine>), PetError> {
        let state = self.spawn(
            host,
            owner,
            location,
            config.species,
            config.payload,
            config.name.clone(),
        )?;
        let rider = match &config.rider {
            Some(rider) => match self.spawn_rider(host, owner, location, state.object(), rider) {
                Ok(rider) => Some(rider),
                Err(err) => {
                    self.discard(host.world, state.object());
                    return Err(err);
                }
            },
            None => None,
        };
        Ok((state, rider))
    }

    /// Construct, bind and attach one pet object. A failure after
    /// construction destroys the object again.
    fn spawn(
        &mut self,
        host: &mut Host<'_>,
        owner: &OwnerIdentity,
        location: Location,
        species: PetSpecies,
        payload: i64,
        name: Option<String>,
    ) -> Result<PetStateMachine, PetError> {
        let class = host.registry.resolve(host.world, host.adapter, species)?;
        let args = host.adapter.pet_ctor_args(owner, species);
        let object = host.adapter.construct(host.world, &class, &args)?;

        let bound = PetStateMachine::construct(host.world, host.adapter, object, species, payload)
            .and_then(|state| {
                if name.is_some() {
                    host.world.set_custom_name(object, name)?;
                }
                host.world.attach(object, location)?;
                Ok(state)
            });
        match bound {
            Ok(state) => {
                self.pending
                    .schedule_in(host.world.tick(), READY_DELAY_TICKS, object);
                Ok(state)
            }
            Err(err) => {
                self.discard(host.world, object);
                Err(err)
            }
        }
    }

    fn spawn_rider(
        &mut self,
        host: &mut Host<'_>,
        owner: &OwnerIdentity,
        location: Location,
        vehicle: EntityId,
        rider: &RiderConfiguration,
    ) -> Result<PetStateMachine, PetError> {
        let state = self.spawn(
            host,
            owner,
            location,
            rider.species,
            rider.payload,
            rider.name.clone(),
        )?;
        if let Err(err) = host.world.mount(vehicle, state.object()) {
            self.discard(host.world, state.object());
            return Err(err.into());
        }
        Ok(state)
    }

    /// Destroy an object that may already be gone.
    fn discard(&mut self, world: &mut World, object: EntityId) {
        self.pending.cancel_where(|id| *id == object);
        match world.destroy(object) {
            Ok(_) | Err(HostError::ObjectNotFound(_)) => {}
            Err(err) => tracing::warn!(object = %object.short(), error = %err, "pet object not destroyed"),
        }
    }
}

fn destroy_once(world: &mut World, object: EntityId) -> Result<(), HostError> {
    world.destroy(object).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use petkeeper_common::{HostRevision, SizeCategory};
    use petkeeper_compat::select_adapter;
    use petkeeper_kernel::{EquipmentSlot, ItemKind};
    use petkeeper_persist::{PetStorage, SqlStore};

    struct Fixture {
        world: World,
        adapter: Box<dyn VersionAdapter>,
        registry: EntityTypeRegistry,
        storage: PetStorage,
        manager: PetManager,
    }

    impl Fixture {
        fn new(revision: HostRevision) -> Self {
            let mut world = World::boot(&revision).unwrap();
            let adapter = select_adapter(&mut world).unwrap();
            let mut registry = EntityTypeRegistry::new();
            registry.register_all(&mut world, adapter.as_ref()).unwrap();
            let storage =
                PetStorage::new().with_backend(Box::new(SqlStore::open_in_memory().unwrap()));
            Self {
                world,
                adapter,
                registry,
                storage,
                manager: PetManager::new(),
            }
        }

        fn create(&mut self, owner: &OwnerIdentity, config: PetConfiguration) -> Result<EntityId, PetError> {
            let mut host = Host {
                world: &mut self.world,
                adapter: self.adapter.as_ref(),
                registry: &self.registry,
            };
            self.manager
                .create(&mut host, &mut self.storage, owner, Location::default(), config)
                .map(|pet| pet.object())
        }

        fn set_field(&mut self, owner: &OwnerIdentity, field: PetField, value: u8) -> Result<(), PetError> {
            let mut host = Host {
                world: &mut self.world,
                adapter: self.adapter.as_ref(),
                registry: &self.registry,
            };
            self.manager.set_field(&mut host, &mut self.storage, owner, field, value)
        }

        fn run_ticks(&mut self, n: u64) {
            for _ in 0..n {
                self.world.step();
                self.manager.tick(&mut self.world);
            }
        }
    }

    #[test]
    fn second_create_is_refused() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        let alice = OwnerIdentity::name("Alice");
        let first = fx.create(&alice, PetConfiguration::new(PetSpecies::Pig)).unwrap();
        let objects = fx.world.object_count();

        let err = fx.create(&alice, PetConfiguration::new(PetSpecies::Wolf)).unwrap_err();
        assert!(matches!(err, PetError::OwnerAlreadyHasPet(_)));
        assert_eq!(fx.manager.len(), 1);
        assert_eq!(fx.manager.get(&alice).unwrap().object(), first);
        assert_eq!(fx.manager.get(&alice).unwrap().config().species, PetSpecies::Pig);
        assert_eq!(fx.world.object_count(), objects);
    }

    #[test]
    fn skeleton_scenario() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        let alice = OwnerIdentity::name("Alice");
        let id = fx.create(&alice, PetConfiguration::new(PetSpecies::Skeleton)).unwrap();
        let pet = fx.manager.get(&alice).unwrap();
        assert_eq!(pet.state().size_category(), SizeCategory::Regular);
        assert_eq!(fx.world.equipment(id, EquipmentSlot::Hand), None);

        fx.run_ticks(READY_DELAY_TICKS);
        assert_eq!(fx.world.equipment(id, EquipmentSlot::Hand), Some(ItemKind::Bow));

        fx.set_field(&alice, PetField::Variant, 1).unwrap();
        let pet = fx.manager.get(&alice).unwrap();
        assert_eq!(pet.state().size_category(), SizeCategory::Large);
        assert_eq!(fx.world.equipment(id, EquipmentSlot::Hand), Some(ItemKind::StoneSword));

        let stored = fx.storage.load(&alice).unwrap().unwrap();
        assert_eq!(stored.pet.payload, pet.config().payload);
    }

    #[test]
    fn rider_is_mounted_and_removed_with_the_pet() {
        let mut fx = Fixture::new(HostRevision::new(1, 8, 1));
        let bob = OwnerIdentity::name("Bob");
        let config = PetConfiguration::new(PetSpecies::Pig)
            .with_name("Hamlet")
            .with_rider(RiderConfiguration::new(PetSpecies::Zombie));
        let id = fx.create(&bob, config).unwrap();
        let rider = fx.manager.get(&bob).unwrap().rider().unwrap().object();
        assert_eq!(fx.world.object(id).unwrap().passenger, Some(rider));
        assert_eq!(fx.world.object(id).unwrap().custom_name.as_deref(), Some("Hamlet"));

        assert!(fx.manager.remove(&mut fx.world, &mut fx.storage, &bob, false));
        assert!(!fx.world.contains(id));
        assert!(!fx.world.contains(rider));
        assert!(fx.storage.load(&bob).unwrap().is_some());

        // idempotent
        assert!(!fx.manager.remove(&mut fx.world, &mut fx.storage, &bob, true));
        assert!(fx.storage.load(&bob).unwrap().is_none());
    }

    #[test]
    fn failed_construction_leaves_no_trace() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        // Reload the pet classes without re-registering: the tables now
        // point at a stale generation.
        fx.adapter = select_adapter(&mut fx.world).unwrap();
        let before = fx.world.object_count();
        let alice = OwnerIdentity::name("Alice");
        let err = fx.create(&alice, PetConfiguration::new(PetSpecies::Pig)).unwrap_err();
        assert!(matches!(err, PetError::SpeciesNotRegistered(_) | PetError::Compat(_)));
        assert!(fx.manager.is_empty());
        assert_eq!(fx.world.object_count(), before);
    }

    #[test]
    fn sweep_reports_failed_destruction_and_continues() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        let mut objects = Vec::new();
        for i in 0..4 {
            let owner = OwnerIdentity::name(format!("owner{i}"));
            objects.push(fx.create(&owner, PetConfiguration::new(PetSpecies::Sheep)).unwrap());
        }
        // Something outside the manager already removed pet 2.
        fx.world.destroy(objects[2]).unwrap();

        let report = fx.manager.remove_all(&mut fx.world, &mut fx.storage);
        assert_eq!(report.removed, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].owner, OwnerIdentity::name("owner2"));
        assert!(fx.manager.is_empty());
        assert_eq!(fx.storage.owners().unwrap().len(), 4);
    }

    #[test]
    fn species_switch_resets_payload() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        let alice = OwnerIdentity::name("Alice");
        fx.create(&alice, PetConfiguration::new(PetSpecies::Slime).with_name("Blob"))
            .unwrap();
        fx.set_field(&alice, PetField::Size, 4).unwrap();

        let mut host = Host {
            world: &mut fx.world,
            adapter: fx.adapter.as_ref(),
            registry: &fx.registry,
        };
        fx.manager
            .set_species(&mut host, &mut fx.storage, &alice, PetSpecies::Wolf)
            .unwrap();
        let pet = fx.manager.get(&alice).unwrap();
        assert_eq!(pet.config().species, PetSpecies::Wolf);
        assert_eq!(pet.config().payload, PetSpecies::Wolf.default_payload());
        assert_eq!(pet.config().name.as_deref(), Some("Blob"));
        assert_eq!(fx.world.object_count(), 1);
    }

    #[test]
    fn rider_can_be_replaced_and_removed() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        let alice = OwnerIdentity::name("Alice");
        let vehicle = fx.create(&alice, PetConfiguration::new(PetSpecies::Pig)).unwrap();
        let mut host = Host {
            world: &mut fx.world,
            adapter: fx.adapter.as_ref(),
            registry: &fx.registry,
        };
        fx.manager
            .set_rider(&mut host, &mut fx.storage, &alice, Some(RiderConfiguration::new(PetSpecies::Ocelot)))
            .unwrap();
        let first = fx.manager.get(&alice).unwrap().rider().unwrap().object();
        fx.manager
            .set_rider(&mut host, &mut fx.storage, &alice, Some(RiderConfiguration::new(PetSpecies::Creeper)))
            .unwrap();
        let second = fx.manager.get(&alice).unwrap().rider().unwrap().object();
        assert!(!host.world.contains(first));
        assert_eq!(host.world.object(vehicle).unwrap().passenger, Some(second));

        fx.manager.set_rider(&mut host, &mut fx.storage, &alice, None).unwrap();
        assert!(!host.world.contains(second));
        assert!(fx.manager.get(&alice).unwrap().config().rider.is_none());
        let stored = fx.storage.load(&alice).unwrap().unwrap();
        assert!(stored.pet.rider.is_none());
    }

    #[test]
    fn rename_and_disconnect_persist() {
        let mut fx = Fixture::new(HostRevision::new(1, 8, 1));
        let alice = OwnerIdentity::name("Alice");
        let id = fx.create(&alice, PetConfiguration::new(PetSpecies::Ocelot)).unwrap();
        fx.manager
            .rename(&mut fx.world, &mut fx.storage, &alice, Some("Tom".into()))
            .unwrap();
        assert_eq!(fx.world.object(id).unwrap().custom_name.as_deref(), Some("Tom"));

        assert!(fx.manager.owner_disconnected(&mut fx.world, &mut fx.storage, &alice));
        assert!(fx.manager.get(&alice).is_none());
        let stored = fx.storage.load(&alice).unwrap().unwrap();
        assert_eq!(stored.pet.name.as_deref(), Some("Tom"));
    }

    #[test]
    fn rekey_moves_live_pet() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        let alice = OwnerIdentity::name("Alice");
        fx.create(&alice, PetConfiguration::new(PetSpecies::Blaze)).unwrap();
        let id = Uuid::new_v4();
        assert!(fx.manager.rekey_owner("Alice", id));
        assert!(fx.manager.get(&alice).is_none());
        let pet = fx.manager.get(&OwnerIdentity::unique(id)).unwrap();
        assert_eq!(pet.owner(), &OwnerIdentity::unique(id));
        assert!(!fx.manager.rekey_owner("Alice", id));
    }

    #[test]
    fn failed_species_switch_keeps_the_old_pet() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        fx.registry = EntityTypeRegistry::new();
        fx.registry
            .register_species(&mut fx.world, fx.adapter.as_ref(), PetSpecies::Pig)
            .unwrap();
        let alice = OwnerIdentity::name("Alice");
        let config = PetConfiguration::new(PetSpecies::Pig)
            .with_name("Hamlet")
            .with_rider(RiderConfiguration::new(PetSpecies::Pig));
        let object = fx.create(&alice, config.clone()).unwrap();
        let rider = fx.manager.get(&alice).unwrap().rider().unwrap().object();
        let objects = fx.world.object_count();

        let mut host = Host {
            world: &mut fx.world,
            adapter: fx.adapter.as_ref(),
            registry: &fx.registry,
        };
        let err = fx
            .manager
            .set_species(&mut host, &mut fx.storage, &alice, PetSpecies::Wolf)
            .unwrap_err();
        assert!(matches!(err, PetError::SpeciesNotRegistered(PetSpecies::Wolf)));

        let pet = fx.manager.get(&alice).unwrap();
        assert_eq!(pet.config(), &config);
        assert_eq!(pet.object(), object);
        assert_eq!(pet.rider().unwrap().object(), rider);
        assert!(fx.world.contains(object));
        assert_eq!(fx.world.object(object).unwrap().passenger, Some(rider));
        assert_eq!(fx.world.object_count(), objects);
        let stored = fx.storage.load(&alice).unwrap().unwrap();
        assert_eq!(stored.pet, config);
    }

    #[test]
    fn rekey_leaves_both_pets_when_unique_key_is_taken() {
        let mut fx = Fixture::new(HostRevision::new(1, 6, 3));
        let id = Uuid::new_v4();
        let by_name = OwnerIdentity::name("Alice");
        let by_id = OwnerIdentity::unique(id);
        fx.create(&by_name, PetConfiguration::new(PetSpecies::Pig)).unwrap();
        fx.create(&by_id, PetConfiguration::new(PetSpecies::Wolf)).unwrap();

        assert!(!fx.manager.rekey_owner("Alice", id));
        assert_eq!(fx.manager.len(), 2);
        assert_eq!(fx.manager.get(&by_name).unwrap().config().species, PetSpecies::Pig);
        assert_eq!(fx.manager.get(&by_id).unwrap().config().species, PetSpecies::Wolf);
    }
}
