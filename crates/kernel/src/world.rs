use crate::class::{ClassDef, ClassHandle, HostValue, StaticTable, ValueKind};
use crate::profile::{HostProfile, VANILLA_CREATURES, profile_for};
use petkeeper_common::{EntityId, HostRevision, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors raised by the host itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("host cannot boot as unknown revision {0}")]
    UnknownRevision(HostRevision),
    #[error("class {0} is not loaded")]
    ClassNotFound(String),
    #[error("class handle {0} is stale (current generation {1})")]
    StaleClass(ClassHandle, u32),
    #[error("constructor of {class} takes {expected:?}, got {found:?}")]
    ConstructorMismatch {
        class: String,
        expected: Vec<ValueKind>,
        found: Vec<ValueKind>,
    },
    #[error("object {0:?} does not exist")]
    ObjectNotFound(EntityId),
    #[error("object {0:?} is already in the world")]
    AlreadyAttached(EntityId),
    #[error("object {0:?} has not finished entering the world")]
    NotReady(EntityId),
    #[error("object has no field {0:?}")]
    NoSuchField(String),
    #[error("field {field:?} holds {expected:?}, refused {found:?}")]
    FieldTypeMismatch {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Items a creature can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Bow,
    StoneSword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipmentSlot {
    Hand,
    Head,
}

/// An event record produced by every mutation to the world.
///
/// Remote observers are fed from this log; draining it is how state changes
/// leave the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    Constructed { id: EntityId, class: String },
    Attached { id: EntityId, location: Location },
    Destroyed { id: EntityId },
    /// A watched slot changed value.
    Watched { id: EntityId, slot: u8, value: i8 },
    EquipmentChanged {
        id: EntityId,
        slot: EquipmentSlot,
        item: Option<ItemKind>,
    },
    Renamed { id: EntityId, name: Option<String> },
    Mounted { vehicle: EntityId, passenger: EntityId },
    Dismounted { vehicle: EntityId, passenger: EntityId },
    Stepped { tick: u64 },
}

/// A host-native object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostObject {
    pub class: ClassHandle,
    pub location: Option<Location>,
    /// Tick at which the object entered the world.
    pub entered_at: Option<u64>,
    pub watched: BTreeMap<u8, i8>,
    pub equipment: BTreeMap<EquipmentSlot, ItemKind>,
    pub custom_name: Option<String>,
    pub passenger: Option<EntityId>,
    /// Revision-named internal fields (fire immunity, hitbox).
    internals: BTreeMap<String, HostValue>,
}

impl HostObject {
    pub fn in_world(&self) -> bool {
        self.entered_at.is_some()
    }
}

/// The running host engine.
///
/// Owns loaded classes, static fields (including the creature type tables),
/// live objects and the tick counter. Everything here is main-thread state.
#[derive(Debug, Clone)]
pub struct World {
    profile: &'static HostProfile,
    classes: BTreeMap<String, (u32, ClassDef)>,
    statics: BTreeMap<String, StaticTable>,
    objects: BTreeMap<EntityId, HostObject>,
    tick: u64,
    event_log: Vec<WorldEvent>,
}

impl World {
    /// Boot a host of the given revision with its vanilla creature kinds
    /// loaded and registered in the type tables.
    pub fn boot(revision: &HostRevision) -> Result<Self, HostError> {
        let profile =
            profile_for(revision).ok_or_else(|| HostError::UnknownRevision(revision.clone()))?;
        let mut world = Self {
            profile,
            classes: BTreeMap::new(),
            statics: BTreeMap::new(),
            objects: BTreeMap::new(),
            tick: 0,
            event_log: Vec::new(),
        };

        let mut name_to_class = BTreeMap::new();
        let mut class_to_name = BTreeMap::new();
        let mut id_to_class = BTreeMap::new();
        let mut class_to_id = BTreeMap::new();
        let mut name_to_id = BTreeMap::new();
        for &(name, id, simple, width, height) in VANILLA_CREATURES {
            let class = world.define_class(ClassDef {
                canonical: format!("net.minecraft.server.{}.{simple}", revision.package()),
                ctor: Vec::new(),
                dimensions: (width, height),
            });
            name_to_class.insert(name.to_string(), class.clone());
            class_to_name.insert(class.clone(), name.to_string());
            id_to_class.insert(id, class.clone());
            class_to_id.insert(class, id);
            name_to_id.insert(name.to_string(), id);
        }
        let names = profile.tables;
        world.set_static_field(names.name_to_class, StaticTable::NameToClass(name_to_class));
        world.set_static_field(names.class_to_name, StaticTable::ClassToName(class_to_name));
        world.set_static_field(names.id_to_class, StaticTable::IdToClass(id_to_class));
        world.set_static_field(names.class_to_id, StaticTable::ClassToId(class_to_id));
        world.set_static_field(names.name_to_id, StaticTable::NameToId(name_to_id));
        world.event_log.clear();

        tracing::debug!(%revision, classes = world.classes.len(), "host booted");
        Ok(world)
    }

    /// Revision of the running host binary.
    pub fn revision(&self) -> &HostRevision {
        &self.profile.revision
    }

    /// Current simulation tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance the world by one tick.
    pub fn step(&mut self) {
        self.tick += 1;
        self.event_log.push(WorldEvent::Stepped { tick: self.tick });
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, id: EntityId) -> Option<&HostObject> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    // --- Classes ---

    /// Load (or reload) a class. Reloading an already loaded canonical name
    /// bumps its generation; handles from the previous load become stale.
    pub fn define_class(&mut self, def: ClassDef) -> ClassHandle {
        let generation = self
            .classes
            .get(&def.canonical)
            .map_or(1, |(generation, _)| generation + 1);
        let handle = ClassHandle::new(def.canonical.clone(), generation);
        self.classes.insert(def.canonical.clone(), (generation, def));
        handle
    }

    /// Current handle for a loaded class.
    pub fn class(&self, canonical: &str) -> Option<ClassHandle> {
        self.classes
            .get(canonical)
            .map(|(generation, _)| ClassHandle::new(canonical, *generation))
    }

    // --- Statics ---

    /// Raw access to a static field by its (revision-specific) name.
    pub fn static_field(&self, name: &str) -> Option<&StaticTable> {
        self.statics.get(name)
    }

    pub fn static_field_mut(&mut self, name: &str) -> Option<&mut StaticTable> {
        self.statics.get_mut(name)
    }

    pub fn set_static_field(&mut self, name: &str, value: StaticTable) -> Option<StaticTable> {
        self.statics.insert(name.to_string(), value)
    }

    pub fn remove_static_field(&mut self, name: &str) -> Option<StaticTable> {
        self.statics.remove(name)
    }

    // --- Object lifecycle ---

    /// Construct an object of `class`. The object exists but is not yet in
    /// the world.
    pub fn construct(
        &mut self,
        class: &ClassHandle,
        args: &[HostValue],
    ) -> Result<EntityId, HostError> {
        let (generation, def) = self
            .classes
            .get(class.canonical_name())
            .ok_or_else(|| HostError::ClassNotFound(class.canonical_name().to_string()))?;
        if *generation != class.generation() {
            return Err(HostError::StaleClass(class.clone(), *generation));
        }
        let found: Vec<ValueKind> = args.iter().map(HostValue::kind).collect();
        if found != def.ctor {
            return Err(HostError::ConstructorMismatch {
                class: def.canonical.clone(),
                expected: def.ctor.clone(),
                found,
            });
        }

        let fields = self.profile.fields;
        let (width, height) = def.dimensions;
        let internals = BTreeMap::from([
            (fields.fire_proof.to_string(), HostValue::Bool(false)),
            (fields.width.to_string(), HostValue::Float(width)),
            (fields.height.to_string(), HostValue::Float(height)),
        ]);
        let id = EntityId::new();
        self.objects.insert(
            id,
            HostObject {
                class: class.clone(),
                location: None,
                entered_at: None,
                watched: BTreeMap::new(),
                equipment: BTreeMap::new(),
                custom_name: None,
                passenger: None,
                internals,
            },
        );
        self.event_log.push(WorldEvent::Constructed {
            id,
            class: def.canonical.clone(),
        });
        Ok(id)
    }

    /// Put a constructed object into the world at `location`.
    pub fn attach(&mut self, id: EntityId, location: Location) -> Result<(), HostError> {
        let tick = self.tick;
        let obj = self.object_mut(id)?;
        if obj.in_world() {
            return Err(HostError::AlreadyAttached(id));
        }
        obj.location = Some(location);
        obj.entered_at = Some(tick);
        self.event_log.push(WorldEvent::Attached { id, location });
        Ok(())
    }

    /// Remove an object from the world and drop it. Mount links pointing at
    /// it are cleared.
    pub fn destroy(&mut self, id: EntityId) -> Result<HostObject, HostError> {
        let obj = self.objects.remove(&id).ok_or(HostError::ObjectNotFound(id))?;
        for (vehicle, other) in self.objects.iter_mut() {
            if other.passenger == Some(id) {
                other.passenger = None;
                self.event_log.push(WorldEvent::Dismounted {
                    vehicle: *vehicle,
                    passenger: id,
                });
            }
        }
        self.event_log.push(WorldEvent::Destroyed { id });
        Ok(obj)
    }

    // --- Observable state ---

    /// Write a watched slot. Observers only hear about actual changes.
    pub fn watch(&mut self, id: EntityId, slot: u8, value: i8) -> Result<(), HostError> {
        let obj = self.object_mut(id)?;
        if obj.watched.insert(slot, value) != Some(value) {
            self.event_log.push(WorldEvent::Watched { id, slot, value });
        }
        Ok(())
    }

    pub fn watched(&self, id: EntityId, slot: u8) -> Option<i8> {
        self.objects.get(&id)?.watched.get(&slot).copied()
    }

    /// Change held equipment. The host's equipment system only accepts
    /// changes from the tick after the object entered the world.
    pub fn set_equipment(
        &mut self,
        id: EntityId,
        slot: EquipmentSlot,
        item: Option<ItemKind>,
    ) -> Result<(), HostError> {
        let tick = self.tick;
        let obj = self.object_mut(id)?;
        match obj.entered_at {
            Some(entered) if tick > entered => {}
            _ => return Err(HostError::NotReady(id)),
        }
        match item {
            Some(item) => obj.equipment.insert(slot, item),
            None => obj.equipment.remove(&slot),
        };
        self.event_log
            .push(WorldEvent::EquipmentChanged { id, slot, item });
        Ok(())
    }

    pub fn equipment(&self, id: EntityId, slot: EquipmentSlot) -> Option<ItemKind> {
        self.objects.get(&id)?.equipment.get(&slot).copied()
    }

    pub fn set_custom_name(&mut self, id: EntityId, name: Option<String>) -> Result<(), HostError> {
        let obj = self.object_mut(id)?;
        obj.custom_name = name.clone();
        self.event_log.push(WorldEvent::Renamed { id, name });
        Ok(())
    }

    /// Seat `passenger` on `vehicle`, replacing any previous passenger.
    pub fn mount(&mut self, vehicle: EntityId, passenger: EntityId) -> Result<(), HostError> {
        if !self.objects.contains_key(&passenger) {
            return Err(HostError::ObjectNotFound(passenger));
        }
        let obj = self.object_mut(vehicle)?;
        obj.passenger = Some(passenger);
        self.event_log
            .push(WorldEvent::Mounted { vehicle, passenger });
        Ok(())
    }

    // --- Internal fields ---

    pub fn internal(&self, id: EntityId, field: &str) -> Result<&HostValue, HostError> {
        let obj = self.objects.get(&id).ok_or(HostError::ObjectNotFound(id))?;
        obj.internals
            .get(field)
            .ok_or_else(|| HostError::NoSuchField(field.to_string()))
    }

    /// Overwrite an internal field. The field must exist and keep its type.
    pub fn set_internal(
        &mut self,
        id: EntityId,
        field: &str,
        value: HostValue,
    ) -> Result<(), HostError> {
        let obj = self.object_mut(id)?;
        let slot = obj
            .internals
            .get_mut(field)
            .ok_or_else(|| HostError::NoSuchField(field.to_string()))?;
        if slot.kind() != value.kind() {
            return Err(HostError::FieldTypeMismatch {
                field: field.to_string(),
                expected: slot.kind(),
                found: value.kind(),
            });
        }
        *slot = value;
        Ok(())
    }

    fn object_mut(&mut self, id: EntityId) -> Result<&mut HostObject, HostError> {
        self.objects.get_mut(&id).ok_or(HostError::ObjectNotFound(id))
    }
}
