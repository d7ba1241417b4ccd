//! Service context: the one object the host holds.
//!
//! Built once by [`PetContext::start`], driven by host callbacks (owner
//! join/leave, ticks, commands) and consumed by [`PetContext::shutdown`].

use crate::config::PetConfig;
use crate::error::PetError;
use crate::manager::{ActivePet, Host, PetManager, SweepReport};
use crate::registry::EntityTypeRegistry;
use petkeeper_common::{Location, OwnerIdentity, OwnerRecord, PetConfiguration, PetField, PetSpecies, RiderConfiguration};
use petkeeper_compat::{VersionAdapter, select_adapter};
use petkeeper_kernel::World;
use petkeeper_persist::{
    BackendStatus, IdentityResolver, PersistOutcome, PersistWorker, PetStorage,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Whether pet functionality is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PetStatus {
    Enabled,
    /// Startup found the host incompatible; every command is refused.
    Disabled(String),
}

/// What shutdown leaves behind.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    pub sweep: SweepReport,
    pub storage: Vec<BackendStatus>,
}

pub struct PetContext {
    config: PetConfig,
    world: World,
    adapter: Option<Box<dyn VersionAdapter>>,
    registry: EntityTypeRegistry,
    manager: PetManager,
    worker: PersistWorker,
    status: PetStatus,
    online: BTreeMap<OwnerIdentity, Location>,
    resolver: Option<Arc<dyn IdentityResolver>>,
}

impl PetContext {
    /// Open storage, start the persistence worker, queue migration, then
    /// select the adapter and override the host type tables. An
    /// incompatible host disables pets but still yields a context.
    pub fn start(
        config: PetConfig,
        world: World,
        resolver: Option<Arc<dyn IdentityResolver>>,
    ) -> Result<Self, PetError> {
        let storage = PetStorage::open(&config.file, &config.sql);
        Self::start_with_storage(config, world, storage, resolver)
    }

    pub fn start_with_storage(
        config: PetConfig,
        mut world: World,
        storage: PetStorage,
        resolver: Option<Arc<dyn IdentityResolver>>,
    ) -> Result<Self, PetError> {
        let _span = tracing::info_span!("startup", revision = %world.revision()).entered();
        config.validate()?;
        if storage.available() == 0 {
            tracing::warn!("no storage backend available, pets will not be saved");
        }
        let worker = PersistWorker::spawn(storage)?;
        let identity = if config.migrate_legacy_identity {
            resolver.clone()
        } else {
            None
        };
        worker.request_migration(identity);

        let mut registry = EntityTypeRegistry::new();
        let (adapter, status) = match Self::bind_host(&mut world, &mut registry) {
            Ok(adapter) => (Some(adapter), PetStatus::Enabled),
            Err(err) => {
                tracing::error!(error = %err, "pet functionality disabled");
                (None, PetStatus::Disabled(err.to_string()))
            }
        };
        if status == PetStatus::Enabled {
            tracing::info!(command = %config.command, admin = %config.admin_command(), "pets enabled");
        }

        Ok(Self {
            config,
            world,
            adapter,
            registry,
            manager: PetManager::new(),
            worker,
            status,
            online: BTreeMap::new(),
            resolver,
        })
    }

    fn bind_host(
        world: &mut World,
        registry: &mut EntityTypeRegistry,
    ) -> Result<Box<dyn VersionAdapter>, PetError> {
        let adapter = select_adapter(world)?;
        registry.register_all(world, adapter.as_ref())?;
        Ok(adapter)
    }

    /// Re-select the adapter and re-register every species, as after a
    /// plugin reload. Live pets keep running on their existing objects.
    pub fn reload(&mut self) -> Result<(), PetError> {
        let mut registry = EntityTypeRegistry::new();
        match Self::bind_host(&mut self.world, &mut registry) {
            Ok(adapter) => {
                self.adapter = Some(adapter);
                self.registry = registry;
                self.status = PetStatus::Enabled;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "pet functionality disabled after reload");
                self.status = PetStatus::Disabled(err.to_string());
                Err(err)
            }
        }
    }

    pub fn status(&self) -> &PetStatus {
        &self.status
    }

    pub fn config(&self) -> &PetConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn pet(&self, owner: &OwnerIdentity) -> Option<&ActivePet> {
        self.manager.get(owner)
    }

    pub fn active_pets(&self) -> usize {
        self.manager.len()
    }

    /// Split borrows for a manager call, or refuse if pets are disabled.
    fn parts(&mut self) -> Result<(Host<'_>, &mut PetManager, &mut PersistWorker), PetError> {
        let adapter = match (&self.status, &self.adapter) {
            (PetStatus::Disabled(reason), _) => return Err(PetError::PetsDisabled(reason.clone())),
            (PetStatus::Enabled, Some(adapter)) => adapter.as_ref(),
            (PetStatus::Enabled, None) => {
                return Err(PetError::PetsDisabled("no version adapter".into()));
            }
        };
        let host = Host {
            world: &mut self.world,
            adapter,
            registry: &self.registry,
        };
        Ok((host, &mut self.manager, &mut self.worker))
    }

    fn location_of(&self, owner: &OwnerIdentity) -> Result<Location, PetError> {
        self.online
            .get(owner)
            .copied()
            .ok_or_else(|| PetError::OwnerOffline(owner.clone()))
    }

    // --- Commands ---

    pub fn create_pet(&mut self, owner: &OwnerIdentity, species: PetSpecies) -> Result<(), PetError> {
        self.create_configured(owner, PetConfiguration::new(species))
    }

    pub fn create_configured(
        &mut self,
        owner: &OwnerIdentity,
        config: PetConfiguration,
    ) -> Result<(), PetError> {
        let location = self.location_of(owner)?;
        let (mut host, manager, worker) = self.parts()?;
        manager.create(&mut host, worker, owner, location, config)?;
        Ok(())
    }

    /// Despawn and forget `owner`'s pet.
    pub fn remove_pet(&mut self, owner: &OwnerIdentity) -> Result<bool, PetError> {
        let (host, manager, worker) = self.parts()?;
        Ok(manager.remove(host.world, worker, owner, true))
    }

    pub fn customize(&mut self, owner: &OwnerIdentity, field: PetField, value: u8) -> Result<(), PetError> {
        let (mut host, manager, worker) = self.parts()?;
        manager.set_field(&mut host, worker, owner, field, value)
    }

    pub fn rename(&mut self, owner: &OwnerIdentity, name: Option<String>) -> Result<(), PetError> {
        let (host, manager, worker) = self.parts()?;
        manager.rename(host.world, worker, owner, name)
    }

    pub fn change_species(&mut self, owner: &OwnerIdentity, species: PetSpecies) -> Result<(), PetError> {
        let (mut host, manager, worker) = self.parts()?;
        manager.set_species(&mut host, worker, owner, species)
    }

    pub fn set_rider(&mut self, owner: &OwnerIdentity, rider: Option<PetSpecies>) -> Result<(), PetError> {
        let (mut host, manager, worker) = self.parts()?;
        manager.set_rider(&mut host, worker, owner, rider.map(RiderConfiguration::new))
    }

    // --- Host callbacks ---

    /// Owner came online at `location`; their saved pet is requested and
    /// respawned once it arrives.
    pub fn owner_joined(&mut self, owner: OwnerIdentity, location: Location) {
        self.online.insert(owner.clone(), location);
        if self.status == PetStatus::Enabled {
            self.worker.request_load(owner);
        }
    }

    pub fn owner_moved(&mut self, owner: &OwnerIdentity, location: Location) {
        if let Some(at) = self.online.get_mut(owner) {
            *at = location;
        }
    }

    pub fn owner_left(&mut self, owner: &OwnerIdentity) {
        self.online.remove(owner);
        if let Ok((host, manager, worker)) = self.parts() {
            manager.owner_disconnected(host.world, worker, owner);
        }
    }

    /// Advance the host one tick, run deferred pet setup and apply
    /// persistence results.
    pub fn tick(&mut self) {
        self.world.step();
        if let Ok((host, manager, _)) = self.parts() {
            manager.tick(host.world);
        }
        for outcome in self.worker.poll() {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: PersistOutcome) {
        match outcome {
            PersistOutcome::Loaded {
                owner,
                record: Some(record),
            } => {
                if !self.online.contains_key(&owner) || self.manager.get(&owner).is_some() {
                    return;
                }
                if let Err(err) = self.create_configured(&owner, record.pet) {
                    tracing::warn!(%owner, error = %err, "saved pet not restored");
                }
            }
            PersistOutcome::Loaded { record: None, .. } => {}
            PersistOutcome::Migrated(reports) => {
                for (backend, report) in reports {
                    for moved in report.migrated {
                        self.rekey(&moved.name, moved.id);
                    }
                    if !report.unresolved.is_empty() {
                        tracing::info!(%backend, unresolved = report.unresolved.len(), "identity migration partial, will retry");
                    }
                }
            }
            PersistOutcome::Failed { op, owner, error } => {
                tracing::warn!(op, owner = ?owner.map(|o| o.key()), %error, "persistence operation failed");
            }
        }
    }

    fn rekey(&mut self, name: &str, id: uuid::Uuid) {
        let from = OwnerIdentity::name(name);
        let to = OwnerIdentity::unique(id);
        if !self.manager.rekey_owner(name, id) && self.manager.get(&to).is_some() {
            // the unique-keyed pet wins; stop the name key from being written
            self.manager.remove(&mut self.world, &mut self.worker, &from, false);
        }
        // queued after every earlier name-keyed write, so nothing is left
        // behind under the name
        self.worker.move_record(from.clone(), to.clone());
        if let Some(pet) = self.manager.get(&to) {
            self.worker.upsert(to.clone(), OwnerRecord::new(pet.config().clone()));
        }
        if let Some(location) = self.online.remove(&from) {
            self.online.insert(to.clone(), location);
            // the earlier load under the name key finds nothing now
            if self.manager.get(&to).is_none() && self.status == PetStatus::Enabled {
                self.worker.request_load(to);
            }
        }
    }

    /// Queue another migration pass (identity records left unresolved are
    /// retried).
    pub fn retry_migration(&self) {
        let identity = if self.config.migrate_legacy_identity {
            self.resolver.clone()
        } else {
            None
        };
        self.worker.request_migration(identity);
    }

    /// Save and despawn every pet, flush storage and stop the worker.
    pub fn shutdown(mut self) -> Result<(World, ShutdownReport), PetError> {
        let _span = tracing::info_span!("shutdown").entered();
        let sweep = self.manager.remove_all(&mut self.world, &mut self.worker);
        let storage = self.worker.shutdown()?;
        Ok((
            self.world,
            ShutdownReport {
                sweep,
                storage: storage.status(),
            },
        ))
    }
}
