//! Per-species behaviour that is not plain field storage: size classes,
//! hitboxes, held items, fire immunity and audio cues.

use petkeeper_common::{PetField, PetSpecies, SizeCategory};
use petkeeper_kernel::ItemKind;

/// Audio cue identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sounds {
    pub idle: &'static str,
    pub death: &'static str,
    pub step: &'static str,
}

const fn sounds_of(idle: &'static str, death: &'static str, step: &'static str) -> Sounds {
    Sounds { idle, death, step }
}

pub fn sounds(species: PetSpecies) -> Sounds {
    match species {
        PetSpecies::Blaze => sounds_of("mob.blaze.breathe", "mob.blaze.death", "step.stone"),
        PetSpecies::Creeper => sounds_of("mob.creeper.say", "mob.creeper.death", "step.grass"),
        PetSpecies::Ocelot => sounds_of("mob.cat.meow", "mob.cat.hitt", "step.cloth"),
        PetSpecies::Pig => sounds_of("mob.pig.say", "mob.pig.death", "mob.pig.step"),
        PetSpecies::Sheep => sounds_of("mob.sheep.say", "mob.sheep.say", "mob.sheep.step"),
        PetSpecies::Skeleton => {
            sounds_of("mob.skeleton.say", "mob.skeleton.death", "mob.skeleton.step")
        }
        PetSpecies::Slime => sounds_of("mob.slime.big", "mob.slime.big", "mob.slime.small"),
        PetSpecies::Wolf => sounds_of("mob.wolf.bark", "mob.wolf.death", "mob.wolf.step"),
        PetSpecies::Zombie => sounds_of("mob.zombie.say", "mob.zombie.death", "mob.zombie.step"),
    }
}

fn value(species: PetSpecies, payload: i64, field: PetField) -> Option<u8> {
    species.field_spec(field).ok().map(|spec| spec.read(payload))
}

pub fn size_category(species: PetSpecies, payload: i64) -> SizeCategory {
    match species {
        PetSpecies::Skeleton if value(species, payload, PetField::Variant) == Some(1) => {
            SizeCategory::Large
        }
        PetSpecies::Zombie if value(species, payload, PetField::Baby) == Some(1) => {
            SizeCategory::Tiny
        }
        PetSpecies::Slime => match value(species, payload, PetField::Size) {
            Some(3) => SizeCategory::Large,
            Some(4) => SizeCategory::Giant,
            _ => SizeCategory::Regular,
        },
        _ => species.default_size(),
    }
}

/// Hitbox (width, height) for the current payload.
pub fn dimensions(species: PetSpecies, payload: i64) -> (f32, f32) {
    let (width, height) = species.base_dimensions();
    match species {
        PetSpecies::Skeleton if value(species, payload, PetField::Variant) == Some(1) => {
            (0.72, 2.34)
        }
        PetSpecies::Zombie if value(species, payload, PetField::Baby) == Some(1) => {
            (width / 2.0, height / 2.0)
        }
        PetSpecies::Slime => {
            let size = f32::from(value(species, payload, PetField::Size).unwrap_or(1));
            (width * size, height * size)
        }
        _ => (width, height),
    }
}

pub fn fire_immune(species: PetSpecies) -> bool {
    matches!(species, PetSpecies::Skeleton | PetSpecies::Blaze)
}

/// Item held in hand, if the species shows one.
pub fn held_item(species: PetSpecies, payload: i64) -> Option<ItemKind> {
    match species {
        PetSpecies::Skeleton => match value(species, payload, PetField::Variant) {
            Some(1) => Some(ItemKind::StoneSword),
            _ => Some(ItemKind::Bow),
        },
        _ => None,
    }
}
