//! Host kernel: the engine the pet feature runs inside.
//!
//! Models what the pet code touches in the host: loaded classes and their
//! reload generations, the static creature type tables, live objects with
//! watched slots and equipment, and the tick counter.
//!
//! # Invariants
//! - All state mutations flow through explicit operations and are logged as
//!   [`WorldEvent`]s.
//! - Table and field names differ per host revision; callers that poke at
//!   them must know the revision they are running on.
//! - Equipment changes are refused until the tick after an object enters the
//!   world.

pub mod class;
pub mod profile;
pub mod scheduler;
pub mod world;

pub use class::{ClassDef, ClassHandle, HostValue, StaticTable, ValueKind};
pub use profile::known_revisions;
pub use scheduler::Scheduler;
pub use world::{EquipmentSlot, HostError, HostObject, ItemKind, World, WorldEvent};
