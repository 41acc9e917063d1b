//! Vector fields built from two or three scalar component fields.

use std::sync::Arc;

use drift_core::SampleError;
use smallvec::SmallVec;

use crate::error::FieldError;
use crate::field::Field;
use crate::grid::{Grid, Mesh};
use crate::hints::HintStore;
use crate::interp::lerp;
use crate::search::CellPos;

/// Metres per degree of latitude (one nautical mile per arc minute).
const METRES_PER_DEGREE: f64 = 1852.0 * 60.0;

/// Where vector components live on the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Staggering {
    /// All components at grid nodes (Arakawa A-grid).
    #[default]
    Node,
    /// Components on cell faces (Arakawa C-grid). Cell `(i, j)` takes its
    /// west/east u from `U[j + 1][i]` / `U[j + 1][i + 1]`, its south/north
    /// v from `V[j][i + 1]` / `V[j + 1][i + 1]` and its bottom/top w from
    /// `W[k][j + 1][i + 1]` / `W[k + 1][j + 1][i + 1]`.
    Face,
}

/// A 2-D or 3-D velocity-like field.
#[derive(Debug)]
pub struct VectorField {
    name: String,
    u: Arc<Field>,
    v: Arc<Field>,
    w: Option<Arc<Field>>,
    staggering: Staggering,
    convert_units: bool,
    rotate: bool,
    shared_grid: bool,
}

impl VectorField {
    /// Start building a vector field from its u and v components.
    pub fn builder(name: impl Into<String>, u: Arc<Field>, v: Arc<Field>) -> VectorFieldBuilder {
        VectorFieldBuilder {
            name: name.into(),
            u,
            v,
            w: None,
            staggering: Staggering::Node,
            convert_units: true,
            rotate: true,
        }
    }

    /// Name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of components (2 or 3).
    pub fn components(&self) -> usize {
        if self.w.is_some() {
            3
        } else {
            2
        }
    }

    /// Component fields in order u, v, w.
    pub fn fields(&self) -> impl Iterator<Item = &Arc<Field>> {
        [&self.u, &self.v].into_iter().chain(self.w.as_ref())
    }

    /// Staggering.
    pub fn staggering(&self) -> Staggering {
        self.staggering
    }

    /// Sample all components at `(t, z, y, x)`.
    ///
    /// On spherical meshes horizontal components are converted from m/s to
    /// degrees/s at the query latitude unless disabled. On curvilinear grids
    /// `(u, v)` is rotated from grid-aligned to east/north.
    pub fn sample(
        &self,
        t: f64,
        z: f64,
        y: f64,
        x: f64,
        hints: &mut dyn HintStore,
    ) -> Result<SmallVec<[f64; 3]>, SampleError> {
        let (mut out, pos) = match self.staggering {
            Staggering::Node if self.shared_grid => {
                let pos = self.u.locate_in(z, y, x, hints)?;
                let mut out = SmallVec::new();
                for f in self.fields() {
                    out.push(f.value_at(t, &pos)?);
                }
                (out, Some(pos))
            }
            Staggering::Node => {
                let mut out = SmallVec::new();
                for f in self.fields() {
                    out.push(f.sample_in(t, z, y, x, hints)?);
                }
                let pos = if self.u.grid().is_curvilinear() {
                    Some(self.u.locate_in(z, y, x, hints)?)
                } else {
                    None
                };
                (out, pos)
            }
            Staggering::Face => {
                let pos = self.u.locate_in(z, y, x, hints)?;
                (self.face_values(t, &pos)?, Some(pos))
            }
        };

        let grid = self.u.grid();
        if let (true, Some(pos)) = (self.rotate && grid.is_curvilinear(), pos) {
            let theta = grid.cell_bearing(&pos, &self.u.boundaries());
            let (s, c) = theta.sin_cos();
            let (u, v) = (out[0], out[1]);
            out[0] = u * c - v * s;
            out[1] = u * s + v * c;
        }
        if self.convert_units && grid.mesh() == Mesh::Spherical {
            out[0] /= METRES_PER_DEGREE * y.to_radians().cos();
            out[1] /= METRES_PER_DEGREE;
        }
        if out.iter().all(|v| v.is_finite()) {
            Ok(out)
        } else {
            Err(SampleError::Interpolation {
                field: Arc::from(self.name.as_str()),
                reason: "non-finite vector component".to_string(),
            })
        }
    }

    fn face_values(&self, t: f64, pos: &CellPos) -> Result<SmallVec<[f64; 3]>, SampleError> {
        let grid: &Grid = self.u.grid();
        let [i0, i1] = pos.xi;
        let [j0, j1] = pos.yi;
        let [k0, k1] = pos.zi;
        let vertical = |f: &dyn Fn(usize) -> f64| lerp(pos.zeta, || f(k0), || f(k1));
        let at = |d: &[f32], k: usize, j: usize, i: usize| d[grid.index(k, j, i)] as f64;

        let mut out = SmallVec::new();
        let u = self.u.time_slices(t)?.combine(|d| {
            vertical(&|k| lerp(pos.xsi, || at(d, k, j1, i0), || at(d, k, j1, i1)))
        });
        out.push(u);
        let v = self.v.time_slices(t)?.combine(|d| {
            vertical(&|k| lerp(pos.eta, || at(d, k, j0, i1), || at(d, k, j1, i1)))
        });
        out.push(v);
        if let Some(w) = &self.w {
            let w = w
                .time_slices(t)?
                .combine(|d| lerp(pos.zeta, || at(d, k0, j1, i1), || at(d, k1, j1, i1)));
            out.push(w);
        }
        Ok(out)
    }
}

/// Builder for [`VectorField`].
pub struct VectorFieldBuilder {
    name: String,
    u: Arc<Field>,
    v: Arc<Field>,
    w: Option<Arc<Field>>,
    staggering: Staggering,
    convert_units: bool,
    rotate: bool,
}

impl VectorFieldBuilder {
    /// Add a vertical component.
    pub fn w(mut self, w: Arc<Field>) -> Self {
        self.w = Some(w);
        self
    }

    /// Component staggering.
    pub fn staggering(mut self, s: Staggering) -> Self {
        self.staggering = s;
        self
    }

    /// Whether to convert m/s to degrees/s on spherical meshes. Default on.
    pub fn convert_units(mut self, on: bool) -> Self {
        self.convert_units = on;
        self
    }

    /// Whether to rotate curvilinear grid-aligned vectors to east/north.
    /// Default on.
    pub fn rotate(mut self, on: bool) -> Self {
        self.rotate = on;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<VectorField, FieldError> {
        let grid = self.u.grid().id();
        let bounds = self.u.boundaries();
        let shared_grid = [&self.v]
            .into_iter()
            .chain(self.w.as_ref())
            .all(|f| f.grid().id() == grid && f.boundaries() == bounds);
        if self.staggering == Staggering::Face && !shared_grid {
            return Err(FieldError::InvalidBoundary {
                field: self.name,
                reason: "face-staggered components must share one grid and one set of boundaries"
                    .into(),
            });
        }
        Ok(VectorField {
            name: self.name,
            u: self.u,
            v: self.v,
            w: self.w,
            staggering: self.staggering,
            convert_units: self.convert_units,
            rotate: self.rotate,
            shared_grid,
        })
    }
}
