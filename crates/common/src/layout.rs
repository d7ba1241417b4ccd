//! Per-species field layouts.
//!
//! A pet's customizable state is packed into one integer payload. Each field
//! owns a bit range in the payload and a bit range in one watched slot of the
//! host object; several fields may share a watched slot.

use crate::species::PetSpecies;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A customizable pet field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetField {
    Variant,
    Baby,
    Villager,
    Powered,
    Size,
    Saddled,
    Color,
    Sheared,
    Angry,
    Tamed,
    CollarColor,
    OnFire,
}

impl PetField {
    pub const ALL: [PetField; 12] = [
        Self::Variant,
        Self::Baby,
        Self::Villager,
        Self::Powered,
        Self::Size,
        Self::Saddled,
        Self::Color,
        Self::Sheared,
        Self::Angry,
        Self::Tamed,
        Self::CollarColor,
        Self::OnFire,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variant => "variant",
            Self::Baby => "baby",
            Self::Villager => "villager",
            Self::Powered => "powered",
            Self::Size => "size",
            Self::Saddled => "saddled",
            Self::Color => "color",
            Self::Sheared => "sheared",
            Self::Angry => "angry",
            Self::Tamed => "tamed",
            Self::CollarColor => "collar_color",
            Self::OnFire => "on_fire",
        }
    }
}

impl fmt::Display for PetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PetField {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| LayoutError::UnknownField(s.to_string()))
    }
}

/// Values a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldDomain {
    Flag,
    Range { min: u8, max: u8 },
}

impl FieldDomain {
    pub fn contains(self, value: u8) -> bool {
        match self {
            Self::Flag => value <= 1,
            Self::Range { min, max } => (min..=max).contains(&value),
        }
    }
}

impl fmt::Display for FieldDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => f.write_str("0|1"),
            Self::Range { min, max } => write!(f, "{min}..={max}"),
        }
    }
}

/// Where one field lives in the payload and in the watched slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub field: PetField,
    /// Watched slot index on the host object.
    pub slot: u8,
    /// Bit offset of the value inside the watched slot byte.
    pub watch_shift: u8,
    /// Bit offset inside the payload.
    pub shift: u8,
    /// Bit width inside both the payload and the watched slot.
    pub width: u8,
    pub domain: FieldDomain,
    pub default: u8,
}

impl FieldSpec {
    const fn flag(field: PetField, slot: u8, watch_shift: u8, shift: u8, default: u8) -> Self {
        Self {
            field,
            slot,
            watch_shift,
            shift,
            width: 1,
            domain: FieldDomain::Flag,
            default,
        }
    }

    const fn range(
        field: PetField,
        slot: u8,
        shift: u8,
        width: u8,
        (min, max): (u8, u8),
        default: u8,
    ) -> Self {
        Self {
            field,
            slot,
            watch_shift: 0,
            shift,
            width,
            domain: FieldDomain::Range { min, max },
            default,
        }
    }

    fn mask(&self) -> i64 {
        (1i64 << self.width) - 1
    }

    /// Extract this field's value from a payload.
    pub fn read(&self, payload: i64) -> u8 {
        ((payload >> self.shift) & self.mask()) as u8
    }

    /// Return `payload` with this field replaced by `value`.
    pub fn write(&self, payload: i64, value: u8) -> Result<i64, LayoutError> {
        if !self.domain.contains(value) {
            return Err(LayoutError::OutOfDomain {
                field: self.field,
                value,
                domain: self.domain,
            });
        }
        let cleared = payload & !(self.mask() << self.shift);
        Ok(cleared | ((i64::from(value) & self.mask()) << self.shift))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("unknown pet field {0:?}")]
    UnknownField(String),
    #[error("{species} pets have no {field} field")]
    NotInLayout {
        species: PetSpecies,
        field: PetField,
    },
    #[error("{value} is outside {field}'s domain {domain}")]
    OutOfDomain {
        field: PetField,
        value: u8,
        domain: FieldDomain,
    },
    #[error("payload {payload:#x} is not valid for {species} pets")]
    Uninterpretable { species: PetSpecies, payload: i64 },
}

use PetField as F;

const BLAZE: &[FieldSpec] = &[FieldSpec::flag(F::OnFire, 16, 0, 0, 0)];
const CREEPER: &[FieldSpec] = &[FieldSpec::flag(F::Powered, 17, 0, 0, 0)];
const OCELOT: &[FieldSpec] = &[FieldSpec::range(F::Variant, 18, 0, 2, (0, 3), 0)];
const PIG: &[FieldSpec] = &[FieldSpec::flag(F::Saddled, 16, 0, 0, 0)];
const SHEEP: &[FieldSpec] = &[
    FieldSpec::range(F::Color, 16, 0, 4, (0, 15), 0),
    FieldSpec::flag(F::Sheared, 16, 4, 4, 0),
];
const SKELETON: &[FieldSpec] = &[FieldSpec::range(F::Variant, 13, 0, 1, (0, 1), 0)];
const SLIME: &[FieldSpec] = &[FieldSpec::range(F::Size, 16, 0, 3, (1, 4), 1)];
const WOLF: &[FieldSpec] = &[
    FieldSpec::flag(F::Angry, 16, 1, 0, 0),
    FieldSpec::flag(F::Tamed, 16, 2, 1, 1),
    FieldSpec::range(F::CollarColor, 20, 2, 4, (0, 15), 14),
];
const ZOMBIE: &[FieldSpec] = &[
    FieldSpec::flag(F::Baby, 12, 0, 0, 0),
    FieldSpec::flag(F::Villager, 13, 0, 1, 0),
];

impl PetSpecies {
    /// Field layout of this species.
    pub fn layout(self) -> &'static [FieldSpec] {
        match self {
            Self::Blaze => BLAZE,
            Self::Creeper => CREEPER,
            Self::Ocelot => OCELOT,
            Self::Pig => PIG,
            Self::Sheep => SHEEP,
            Self::Skeleton => SKELETON,
            Self::Slime => SLIME,
            Self::Wolf => WOLF,
            Self::Zombie => ZOMBIE,
        }
    }

    pub fn field_spec(self, field: PetField) -> Result<&'static FieldSpec, LayoutError> {
        self.layout()
            .iter()
            .find(|spec| spec.field == field)
            .ok_or(LayoutError::NotInLayout {
                species: self,
                field,
            })
    }

    /// Payload with every field at its default.
    pub fn default_payload(self) -> i64 {
        self.layout()
            .iter()
            .fold(0, |payload, spec| {
                let cleared = payload & !(spec.mask() << spec.shift);
                cleared | (i64::from(spec.default) << spec.shift)
            })
    }

    /// Bits of the payload that belong to some field.
    fn payload_mask(self) -> i64 {
        self.layout()
            .iter()
            .fold(0, |mask, spec| mask | (spec.mask() << spec.shift))
    }

    /// Check that a payload decodes to in-domain values and carries no stray bits.
    pub fn validate_payload(self, payload: i64) -> Result<(), LayoutError> {
        let stray = payload & !self.payload_mask() != 0;
        let out_of_domain = self
            .layout()
            .iter()
            .any(|spec| !spec.domain.contains(spec.read(payload)));
        if stray || out_of_domain {
            return Err(LayoutError::Uninterpretable {
                species: self,
                payload,
            });
        }
        Ok(())
    }

    /// Compose the watched byte for `slot` from every field mapped to it.
    pub fn watched_value(self, payload: i64, slot: u8) -> i8 {
        let byte = self
            .layout()
            .iter()
            .filter(|spec| spec.slot == slot)
            .fold(0u8, |acc, spec| acc | (spec.read(payload) << spec.watch_shift));
        byte as i8
    }

    /// Distinct watched slots used by this species, ascending.
    pub fn watched_slots(self) -> Vec<u8> {
        let mut slots: Vec<u8> = self.layout().iter().map(|spec| spec.slot).collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }
}
