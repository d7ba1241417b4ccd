use crate::error::PetError;
use crate::species;
use petkeeper_common::{EntityId, PetField, PetSpecies, SizeCategory};
use petkeeper_compat::{FieldId, VersionAdapter};
use petkeeper_kernel::{EquipmentSlot, HostValue, World};

/// Observable state of one live pet.
///
/// Owns the packed payload and keeps the host object's watched slots,
/// hitbox and held item in step with it. Setup that needs the host's
/// equipment system waits for [`PetStateMachine::on_ready`].
#[derive(Debug, Clone, PartialEq)]
pub struct PetStateMachine {
    species: PetSpecies,
    object: EntityId,
    payload: i64,
    ready: bool,
}

impl PetStateMachine {
    /// Bind a state machine to a freshly constructed object and push the
    /// initial watched values, fire immunity and hitbox.
    pub fn construct(
        world: &mut World,
        adapter: &dyn VersionAdapter,
        object: EntityId,
        species: PetSpecies,
        payload: i64,
    ) -> Result<Self, PetError> {
        species.validate_payload(payload)?;
        for slot in species.watched_slots() {
            world.watch(object, slot, species.watched_value(payload, slot))?;
        }
        adapter.set_field(
            world,
            object,
            FieldId::FireProof,
            HostValue::Bool(species::fire_immune(species)),
        )?;
        let state = Self {
            species,
            object,
            payload,
            ready: false,
        };
        state.apply_hitbox(world, adapter)?;
        tracing::debug!(%species, object = %object.short(), "pet state bound");
        Ok(state)
    }

    pub fn species(&self) -> PetSpecies {
        self.species
    }

    pub fn object(&self) -> EntityId {
        self.object
    }

    pub fn payload(&self) -> i64 {
        self.payload
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn field(&self, field: PetField) -> Result<u8, PetError> {
        Ok(self.species.field_spec(field)?.read(self.payload))
    }

    /// Validate, run side effects, update the watched slot, then commit.
    /// On error the payload is unchanged.
    pub fn set_field(
        &mut self,
        world: &mut World,
        adapter: &dyn VersionAdapter,
        field: PetField,
        value: u8,
    ) -> Result<(), PetError> {
        let spec = self.species.field_spec(field)?;
        let payload = spec.write(self.payload, value)?;

        let next = Self { payload, ..self.clone() };
        if species::dimensions(self.species, payload) != species::dimensions(self.species, self.payload) {
            next.apply_hitbox(world, adapter)?;
        }
        let item = species::held_item(self.species, payload);
        if self.ready && item != species::held_item(self.species, self.payload) {
            world.set_equipment(self.object, EquipmentSlot::Hand, item)?;
        }
        world.watch(self.object, spec.slot, self.species.watched_value(payload, spec.slot))?;

        self.payload = payload;
        tracing::debug!(species = %self.species, %field, value, "pet field set");
        Ok(())
    }

    pub fn size_category(&self) -> SizeCategory {
        species::size_category(self.species, self.payload)
    }

    /// Deferred setup, run a few ticks after the object entered the world.
    /// Returns `false` if the object is gone, in which case nothing happens.
    pub fn on_ready(&mut self, world: &mut World) -> Result<bool, PetError> {
        if !world.contains(self.object) {
            return Ok(false);
        }
        if let Some(item) = species::held_item(self.species, self.payload) {
            world.set_equipment(self.object, EquipmentSlot::Hand, Some(item))?;
        }
        self.ready = true;
        Ok(true)
    }

    pub fn idle_sound(&self) -> &'static str {
        species::sounds(self.species).idle
    }

    pub fn death_sound(&self) -> &'static str {
        species::sounds(self.species).death
    }

    pub fn step_sound(&self) -> &'static str {
        species::sounds(self.species).step
    }

    fn apply_hitbox(&self, world: &mut World, adapter: &dyn VersionAdapter) -> Result<(), PetError> {
        let (width, height) = species::dimensions(self.species, self.payload);
        adapter.set_field(world, self.object, FieldId::Width, HostValue::Float(width))?;
        adapter.set_field(world, self.object, FieldId::Height, HostValue::Float(height))?;
        Ok(())
    }
}
