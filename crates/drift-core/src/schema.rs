//! Per-run variable schema.
//!
//! The schema is resolved once when a particle set is created and is the
//! only particle-layout information kernel translation depends on. Its
//! [`fingerprint`](VariableSchema::fingerprint) is part of every compiled
//! kernel's cache key.

use indexmap::IndexMap;
use thiserror::Error;

use crate::hash::Fnv1a;

/// Semantic storage type of a particle variable.
///
/// Values are held as `f64` at runtime and coerced to the declared type on
/// every write, so an `I32` variable never holds a fractional value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarType {
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
}

impl VarType {
    /// Coerce a value to this type's representable set.
    ///
    /// Integer coercion truncates toward zero and saturates; NaN becomes 0.
    #[inline]
    pub fn coerce(self, v: f64) -> f64 {
        match self {
            Self::F32 => v as f32 as f64,
            Self::F64 => v,
            Self::I32 => v as i32 as f64,
            Self::I64 => v as i64 as f64,
        }
    }

    fn tag(self) -> u32 {
        match self {
            Self::F32 => 0,
            Self::F64 => 1,
            Self::I32 => 2,
            Self::I64 => 3,
        }
    }

    /// Short type name used in listings.
    pub fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I32 => "i32",
            Self::I64 => "i64",
        }
    }
}

/// Built-in particle attributes. Their names are reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Longitude (or x).
    Lon,
    /// Latitude (or y).
    Lat,
    /// Depth (or z).
    Depth,
    /// Particle time. Read-only in kernels.
    Time,
    /// Signed timestep.
    Dt,
    /// Particle id. Read-only in kernels.
    Id,
}

impl Builtin {
    /// Every built-in, in slot order.
    pub const ALL: [Builtin; 6] = [
        Builtin::Lon,
        Builtin::Lat,
        Builtin::Depth,
        Builtin::Time,
        Builtin::Dt,
        Builtin::Id,
    ];

    /// Look up a built-in by its kernel-visible name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lon" => Some(Self::Lon),
            "lat" => Some(Self::Lat),
            "depth" => Some(Self::Depth),
            "time" => Some(Self::Time),
            "dt" => Some(Self::Dt),
            "id" => Some(Self::Id),
            _ => None,
        }
    }

    /// Kernel-visible name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Lon => "lon",
            Self::Lat => "lat",
            Self::Depth => "depth",
            Self::Time => "time",
            Self::Dt => "dt",
            Self::Id => "id",
        }
    }

    /// Whether kernels may assign to this attribute.
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::Time | Self::Id)
    }
}

/// Names that can never be user variables besides the built-ins.
const RESERVED: &[&str] = &["state", "delete", "hints"];

/// One user-declared particle variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    /// Kernel-visible name.
    pub name: String,
    /// Storage type.
    pub var_type: VarType,
    /// Value every new particle starts with.
    pub initial: f64,
    /// Whether the variable is included in output records.
    pub to_write: bool,
}

impl Variable {
    /// A variable initialised to zero and written to output.
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            var_type,
            initial: 0.0,
            to_write: true,
        }
    }

    /// Set the initial value.
    pub fn with_initial(mut self, initial: f64) -> Self {
        self.initial = initial;
        self
    }

    /// Set whether the variable appears in output.
    pub fn written(mut self, to_write: bool) -> Self {
        self.to_write = to_write;
        self
    }
}

/// Errors detected while building a [`VariableSchema`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The name collides with a built-in attribute or reserved word.
    #[error("variable name '{name}' is reserved")]
    ReservedName {
        /// The offending name.
        name: String,
    },
    /// The same name was declared twice.
    #[error("variable '{name}' declared more than once")]
    Duplicate {
        /// The offending name.
        name: String,
    },
    /// The name is not a valid identifier.
    #[error("variable name '{name}' is not a valid identifier")]
    InvalidName {
        /// The offending name.
        name: String,
    },
    /// The initial value is NaN or infinite.
    #[error("variable '{name}' has a non-finite initial value")]
    NonFiniteInitial {
        /// The offending name.
        name: String,
    },
}

/// Ordered, immutable set of user variables.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableSchema {
    vars: IndexMap<String, Variable>,
    fingerprint: u64,
}

impl Default for VariableSchema {
    fn default() -> Self {
        Self::empty()
    }
}

impl VariableSchema {
    /// Schema with only the built-in attributes.
    pub fn empty() -> Self {
        Self {
            vars: IndexMap::new(),
            fingerprint: fingerprint_of(&IndexMap::new()),
        }
    }

    /// Start building a schema.
    pub fn builder() -> VariableSchemaBuilder {
        VariableSchemaBuilder::default()
    }

    /// Number of user variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether there are no user variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Slot index of a user variable.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.vars.get_index_of(name)
    }

    /// Variable at a slot.
    pub fn get(&self, index: usize) -> Option<&Variable> {
        self.vars.get_index(index).map(|(_, v)| v)
    }

    /// Variables in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    /// Initial values in slot order.
    pub fn initial_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.vars.values().map(|v| v.initial)
    }

    /// Stable hash of names, types, initial values and output flags.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// Builder for [`VariableSchema`].
#[derive(Clone, Debug, Default)]
pub struct VariableSchemaBuilder {
    vars: Vec<Variable>,
}

impl VariableSchemaBuilder {
    /// Declare a variable.
    pub fn variable(mut self, var: Variable) -> Self {
        self.vars.push(var);
        self
    }

    /// Validate and freeze the schema.
    pub fn build(self) -> Result<VariableSchema, SchemaError> {
        let mut vars = IndexMap::with_capacity(self.vars.len());
        for mut var in self.vars {
            if !is_identifier(&var.name) {
                return Err(SchemaError::InvalidName { name: var.name });
            }
            if Builtin::from_name(&var.name).is_some() || RESERVED.contains(&var.name.as_str()) {
                return Err(SchemaError::ReservedName { name: var.name });
            }
            if !var.initial.is_finite() {
                return Err(SchemaError::NonFiniteInitial { name: var.name });
            }
            if vars.contains_key(&var.name) {
                return Err(SchemaError::Duplicate { name: var.name });
            }
            var.initial = var.var_type.coerce(var.initial);
            vars.insert(var.name.clone(), var);
        }
        let fingerprint = fingerprint_of(&vars);
        Ok(VariableSchema { vars, fingerprint })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn fingerprint_of(vars: &IndexMap<String, Variable>) -> u64 {
    let mut h = Fnv1a::new().u32(vars.len() as u32);
    for v in vars.values() {
        h = h
            .str(&v.name)
            .u32(v.var_type.tag())
            .f64(v.initial)
            .u32(v.to_write as u32);
    }
    h.finish()
}
