use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Handle to a loaded host class.
///
/// Two handles with the same canonical name but different generations come
/// from different loads of the same class (a reload). Host tables may still
/// hold stale generations after a reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassHandle {
    canonical: String,
    generation: u32,
}

impl ClassHandle {
    pub fn new(canonical: impl Into<String>, generation: u32) -> Self {
        Self {
            canonical: canonical.into(),
            generation,
        }
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Same class regardless of which load produced the handle.
    pub fn same_class(&self, other: &ClassHandle) -> bool {
        self.canonical == other.canonical
    }

    /// Last segment of the canonical name.
    pub fn simple_name(&self) -> &str {
        self.canonical
            .rsplit('.')
            .next()
            .unwrap_or(self.canonical.as_str())
    }
}

impl fmt::Display for ClassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.canonical, self.generation)
    }
}

/// A dynamically typed host value: constructor arguments, internal fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Text(String),
}

/// Type tag of a [`HostValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int,
    Long,
    Float,
    Text,
}

impl HostValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// A class as loaded into the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub canonical: String,
    /// Constructor signature, not counting the implicit world argument.
    pub ctor: Vec<ValueKind>,
    /// Default hitbox (width, height).
    pub dimensions: (f32, f32),
}

/// A static field of the host. The type tables are the interesting ones;
/// anything else is an opaque value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StaticTable {
    NameToClass(BTreeMap<String, ClassHandle>),
    ClassToName(BTreeMap<ClassHandle, String>),
    IdToClass(BTreeMap<i32, ClassHandle>),
    ClassToId(BTreeMap<ClassHandle, i32>),
    NameToId(BTreeMap<String, i32>),
    Value(HostValue),
}

impl StaticTable {
    /// Shape name for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::NameToClass(_) => "Map<String, Class>",
            Self::ClassToName(_) => "Map<Class, String>",
            Self::IdToClass(_) => "Map<Integer, Class>",
            Self::ClassToId(_) => "Map<Class, Integer>",
            Self::NameToId(_) => "Map<String, Integer>",
            Self::Value(_) => "value",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::NameToClass(m) => m.len(),
            Self::ClassToName(m) => m.len(),
            Self::IdToClass(m) => m.len(),
            Self::ClassToId(m) => m.len(),
            Self::NameToId(m) => m.len(),
            Self::Value(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
