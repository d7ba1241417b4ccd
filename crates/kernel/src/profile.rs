//! Revision-specific layout of the host itself.
//!
//! The host's static and instance fields carry obfuscated names that change
//! between binary revisions. Nothing outside the kernel reads this table; the
//! compat adapters carry their own knowledge of each revision.

use petkeeper_common::HostRevision;

/// Static field names of the five creature type tables.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TypeTableNames {
    pub name_to_class: &'static str,
    pub class_to_name: &'static str,
    pub id_to_class: &'static str,
    pub class_to_id: &'static str,
    pub name_to_id: &'static str,
}

/// Instance field names every creature object carries.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ObjectFieldNames {
    pub fire_proof: &'static str,
    pub width: &'static str,
    pub height: &'static str,
}

#[derive(Debug, Clone)]
pub(crate) struct HostProfile {
    pub revision: HostRevision,
    pub tables: TypeTableNames,
    pub fields: ObjectFieldNames,
}

pub(crate) const PROFILES: &[HostProfile] = &[
    HostProfile {
        revision: HostRevision::new(1, 6, 3),
        tables: TypeTableNames {
            name_to_class: "c",
            class_to_name: "d",
            id_to_class: "e",
            class_to_id: "f",
            name_to_id: "g",
        },
        fields: ObjectFieldNames {
            fire_proof: "fireProof",
            width: "width",
            height: "length",
        },
    },
    HostProfile {
        revision: HostRevision::new(1, 7, 4),
        tables: TypeTableNames {
            name_to_class: "b",
            class_to_name: "c",
            id_to_class: "d",
            class_to_id: "e",
            name_to_id: "f",
        },
        fields: ObjectFieldNames {
            fire_proof: "fireProof",
            width: "width",
            height: "length",
        },
    },
    HostProfile {
        revision: HostRevision::new(1, 8, 1),
        tables: TypeTableNames {
            name_to_class: "c",
            class_to_name: "d",
            id_to_class: "e",
            class_to_id: "f",
            name_to_id: "g",
        },
        fields: ObjectFieldNames {
            fire_proof: "ab",
            width: "width",
            height: "length",
        },
    },
];

pub(crate) fn profile_for(revision: &HostRevision) -> Option<&'static HostProfile> {
    PROFILES.iter().find(|p| &p.revision == revision)
}

/// Revisions this host build can boot as.
pub fn known_revisions() -> Vec<HostRevision> {
    PROFILES.iter().map(|p| p.revision.clone()).collect()
}

/// Vanilla creature kinds: (type name, id, class simple name, width, height).
pub(crate) const VANILLA_CREATURES: &[(&str, i32, &str, f32, f32)] = &[
    ("Creeper", 50, "EntityCreeper", 0.6, 1.7),
    ("Skeleton", 51, "EntitySkeleton", 0.6, 1.8),
    ("Spider", 52, "EntitySpider", 1.4, 0.9),
    ("Zombie", 54, "EntityZombie", 0.6, 1.8),
    ("Slime", 55, "EntitySlime", 0.5, 0.5),
    ("Blaze", 61, "EntityBlaze", 0.6, 1.8),
    ("Pig", 90, "EntityPig", 0.9, 0.9),
    ("Sheep", 91, "EntitySheep", 0.9, 1.3),
    ("Cow", 92, "EntityCow", 0.9, 1.3),
    ("Wolf", 95, "EntityWolf", 0.6, 0.8),
    ("Ozelot", 98, "EntityOcelot", 0.6, 0.8),
];
