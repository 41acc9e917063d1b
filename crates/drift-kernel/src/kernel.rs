//! Kernel compositions and their signatures.

use std::fmt;
use std::ops::Add;
use std::sync::Arc;

use drift_core::hash::Fnv1a;
use drift_core::VariableSchema;

use crate::error::TranslateError;
use crate::ir::{link, Program};
use crate::render::render;
use crate::translate::translate;

/// An ordered composition of kernel functions.
///
/// ```
/// use drift_kernel::Kernel;
///
/// let advect = Kernel::new("fn advect(p, fs, t) { p.lon += fs.U[p] * p.dt; }");
/// let age = Kernel::new("fn age(p, fs, t) { p.age += p.dt; }");
/// let both = advect + age;
/// assert_eq!(both.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Kernel {
    sources: Vec<Arc<str>>,
}

impl Kernel {
    /// A kernel holding one function source.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            sources: vec![source.into()],
        }
    }

    /// Append another kernel's functions after this one's.
    pub fn then(mut self, next: impl Into<Kernel>) -> Self {
        self.sources.extend(next.into().sources);
        self
    }

    /// Function sources in composition order.
    pub fn sources(&self) -> &[Arc<str>] {
        &self.sources
    }

    /// Number of functions.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the composition is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Translate every function against `schema` and link them.
    ///
    /// Functions are translated independently, so the first error in
    /// composition order is reported.
    pub fn translate(&self, schema: &VariableSchema) -> Result<TranslatedKernel, TranslateError> {
        let segments = self
            .sources
            .iter()
            .map(|src| translate(src, schema))
            .collect::<Result<Vec<_>, _>>()?;
        let program = link(&segments)?;
        let listing: Arc<str> = Arc::from(render(&program));
        Ok(TranslatedKernel {
            program: Arc::new(program),
            signature: KernelSignature {
                listing,
                schema: schema.fingerprint(),
            },
        })
    }
}

impl From<&str> for Kernel {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl Add for Kernel {
    type Output = Kernel;

    fn add(self, rhs: Kernel) -> Kernel {
        self.then(rhs)
    }
}

/// Cache key of a compiled kernel: the rendered program listing and the
/// fingerprint of the schema it was translated against.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KernelSignature {
    listing: Arc<str>,
    schema: u64,
}

impl KernelSignature {
    /// The rendered low-level listing.
    pub fn listing(&self) -> &str {
        &self.listing
    }

    /// Schema fingerprint.
    pub fn schema(&self) -> u64 {
        self.schema
    }

    /// Stable FNV-1a hash, used to name artifacts in logs and errors.
    pub fn fingerprint(&self) -> u64 {
        Fnv1a::new().str(&self.listing).u64(self.schema).finish()
    }
}

impl fmt::Display for KernelSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.fingerprint())
    }
}

/// A linked program with its signature.
#[derive(Clone, Debug)]
pub struct TranslatedKernel {
    /// The linked program.
    pub program: Arc<Program>,
    /// Its cache key.
    pub signature: KernelSignature,
}
