//! Grid geometry: horizontal layout, vertical levels, mesh kind.
//!
//! Data buffers on a grid are laid out `(k * ny + j) * nx + i` with `i`
//! along longitude, `j` along latitude and `k` along depth.

use drift_core::GridId;

use crate::error::GridError;

/// Interpretation of horizontal coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mesh {
    /// Cartesian x/y in arbitrary units.
    #[default]
    Flat,
    /// Longitude/latitude in degrees.
    Spherical,
}

/// Horizontal layout of grid nodes.
#[derive(Clone, Debug, PartialEq)]
pub enum Horizontal {
    /// Independent 1-D longitude and latitude axes.
    Rectilinear {
        /// Longitudes, strictly increasing.
        lon: Vec<f64>,
        /// Latitudes, strictly increasing.
        lat: Vec<f64>,
    },
    /// 2-D node coordinates, row-major `[j * nx + i]`.
    Curvilinear {
        /// Nodes along i.
        nx: usize,
        /// Nodes along j.
        ny: usize,
        /// Node longitudes.
        lon: Vec<f64>,
        /// Node latitudes.
        lat: Vec<f64>,
    },
}

/// Vertical layout.
#[derive(Clone, Debug, PartialEq)]
pub enum Vertical {
    /// Single layer, depth is ignored.
    Surface,
    /// Fixed depth levels shared by every column, strictly increasing.
    ZLevels(Vec<f64>),
    /// Terrain-following levels: a depth per node, `[(k * ny + j) * nx + i]`,
    /// strictly increasing in `k` within every column.
    SLevels {
        /// Number of levels.
        nz: usize,
        /// Node depths.
        depth: Vec<f64>,
    },
}

/// Node geometry shared by one or more fields.
///
/// Every grid gets a unique [`GridId`] at construction. Fields built on the
/// same `Arc<Grid>` share that id, and therefore share one cell-hint slot
/// per particle inside a [`FieldSet`](crate::FieldSet).
#[derive(Clone, Debug)]
pub struct Grid {
    id: GridId,
    horizontal: Horizontal,
    vertical: Vertical,
    mesh: Mesh,
    /// `[lon_min, lon_max, lat_min, lat_max]` over all nodes.
    bbox: [f64; 4],
}

impl Grid {
    /// Rectilinear grid from 1-D axes.
    pub fn rectilinear(lon: Vec<f64>, lat: Vec<f64>) -> Result<Self, GridError> {
        check_axis("lon", &lon)?;
        check_axis("lat", &lat)?;
        let bbox = [lon[0], lon[lon.len() - 1], lat[0], lat[lat.len() - 1]];
        Ok(Self {
            id: GridId::next(),
            horizontal: Horizontal::Rectilinear { lon, lat },
            vertical: Vertical::Surface,
            mesh: Mesh::Flat,
            bbox,
        })
    }

    /// Curvilinear grid from 2-D node coordinates, row-major `[j * nx + i]`.
    pub fn curvilinear(nx: usize, ny: usize, lon: Vec<f64>, lat: Vec<f64>) -> Result<Self, GridError> {
        if nx < 2 {
            return Err(GridError::TooShort { axis: "lon", len: nx });
        }
        if ny < 2 {
            return Err(GridError::TooShort { axis: "lat", len: ny });
        }
        for (what, arr) in [("lon", &lon), ("lat", &lat)] {
            if arr.len() != nx * ny {
                return Err(GridError::ShapeMismatch {
                    what,
                    expected: nx * ny,
                    got: arr.len(),
                });
            }
            if let Some(index) = arr.iter().position(|v| !v.is_finite()) {
                return Err(GridError::NonFinite { axis: what, index });
            }
        }
        let (lon_min, lon_max) = min_max(&lon);
        let (lat_min, lat_max) = min_max(&lat);
        Ok(Self {
            id: GridId::next(),
            horizontal: Horizontal::Curvilinear { nx, ny, lon, lat },
            vertical: Vertical::Surface,
            mesh: Mesh::Flat,
            bbox: [lon_min, lon_max, lat_min, lat_max],
        })
    }

    /// Add fixed depth levels.
    pub fn with_z_levels(mut self, depth: Vec<f64>) -> Result<Self, GridError> {
        check_axis("depth", &depth)?;
        self.vertical = Vertical::ZLevels(depth);
        Ok(self)
    }

    /// Add terrain-following levels, one depth per node.
    pub fn with_s_levels(mut self, nz: usize, depth: Vec<f64>) -> Result<Self, GridError> {
        if nz < 2 {
            return Err(GridError::TooShort { axis: "depth", len: nz });
        }
        let (nx, ny) = (self.nx(), self.ny());
        if depth.len() != nz * ny * nx {
            return Err(GridError::ShapeMismatch {
                what: "depth",
                expected: nz * ny * nx,
                got: depth.len(),
            });
        }
        if let Some(index) = depth.iter().position(|v| !v.is_finite()) {
            return Err(GridError::NonFinite { axis: "depth", index });
        }
        let plane = nx * ny;
        for col in 0..plane {
            for k in 1..nz {
                if depth[k * plane + col] <= depth[(k - 1) * plane + col] {
                    return Err(GridError::NotIncreasing {
                        axis: "depth",
                        index: k * plane + col,
                    });
                }
            }
        }
        self.vertical = Vertical::SLevels { nz, depth };
        Ok(self)
    }

    /// Set the mesh kind.
    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = mesh;
        self
    }

    /// Unique id of this grid.
    pub fn id(&self) -> GridId {
        self.id
    }

    /// Horizontal layout.
    pub fn horizontal(&self) -> &Horizontal {
        &self.horizontal
    }

    /// Vertical layout.
    pub fn vertical(&self) -> &Vertical {
        &self.vertical
    }

    /// Mesh kind.
    pub fn mesh(&self) -> Mesh {
        self.mesh
    }

    /// Whether nodes are 2-D (curvilinear).
    pub fn is_curvilinear(&self) -> bool {
        matches!(self.horizontal, Horizontal::Curvilinear { .. })
    }

    /// Nodes along i.
    pub fn nx(&self) -> usize {
        match &self.horizontal {
            Horizontal::Rectilinear { lon, .. } => lon.len(),
            Horizontal::Curvilinear { nx, .. } => *nx,
        }
    }

    /// Nodes along j.
    pub fn ny(&self) -> usize {
        match &self.horizontal {
            Horizontal::Rectilinear { lat, .. } => lat.len(),
            Horizontal::Curvilinear { ny, .. } => *ny,
        }
    }

    /// Levels along k (1 for surface grids).
    pub fn nz(&self) -> usize {
        match &self.vertical {
            Vertical::Surface => 1,
            Vertical::ZLevels(d) => d.len(),
            Vertical::SLevels { nz, .. } => *nz,
        }
    }

    /// Values per data snapshot.
    pub fn len(&self) -> usize {
        self.nx() * self.ny() * self.nz()
    }

    /// Always false; grids have at least 2x2 nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat data index of node `(k, j, i)`.
    #[inline]
    pub fn index(&self, k: usize, j: usize, i: usize) -> usize {
        (k * self.ny() + j) * self.nx() + i
    }

    /// Longitude of node `(j, i)`.
    #[inline]
    pub fn node_lon(&self, j: usize, i: usize) -> f64 {
        match &self.horizontal {
            Horizontal::Rectilinear { lon, .. } => lon[i],
            Horizontal::Curvilinear { nx, lon, .. } => lon[j * nx + i],
        }
    }

    /// Latitude of node `(j, i)`.
    #[inline]
    pub fn node_lat(&self, j: usize, i: usize) -> f64 {
        match &self.horizontal {
            Horizontal::Rectilinear { lat, .. } => lat[j],
            Horizontal::Curvilinear { nx, lat, .. } => lat[j * nx + i],
        }
    }

    /// `[lon_min, lon_max, lat_min, lat_max]` over all nodes.
    pub fn bbox(&self) -> [f64; 4] {
        self.bbox
    }

    /// Horizontal span along i, used to validate zonal periods.
    pub(crate) fn lon_span(&self) -> f64 {
        self.bbox[1] - self.bbox[0]
    }

    /// Horizontal span along j.
    pub(crate) fn lat_span(&self) -> f64 {
        self.bbox[3] - self.bbox[2]
    }
}

fn check_axis(axis: &'static str, values: &[f64]) -> Result<(), GridError> {
    if values.len() < 2 {
        return Err(GridError::TooShort {
            axis,
            len: values.len(),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(GridError::NonFinite { axis, index });
    }
    if let Some(index) = values.windows(2).position(|w| w[1] <= w[0]) {
        return Err(GridError::NotIncreasing {
            axis,
            index: index + 1,
        });
    }
    Ok(())
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectilinear_shape_and_index() {
        let g = Grid::rectilinear(vec![0.0, 1.0, 2.0], vec![0.0, 1.0])
            .unwrap()
            .with_z_levels(vec![0.0, 10.0, 20.0, 30.0])
            .unwrap();
        assert_eq!((g.nx(), g.ny(), g.nz()), (3, 2, 4));
        assert_eq!(g.len(), 24);
        assert_eq!(g.index(1, 1, 2), (2 + 1) * 3 + 2);
        assert_eq!(g.bbox(), [0.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn axes_must_increase() {
        let err = Grid::rectilinear(vec![0.0, 2.0, 1.0], vec![0.0, 1.0]).unwrap_err();
        assert_eq!(err, GridError::NotIncreasing { axis: "lon", index: 2 });
        let err = Grid::rectilinear(vec![0.0], vec![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, GridError::TooShort { axis: "lon", len: 1 }));
        let err = Grid::rectilinear(vec![0.0, f64::NAN], vec![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, GridError::NonFinite { .. }));
    }

    #[test]
    fn curvilinear_shape_checked() {
        let err = Grid::curvilinear(2, 2, vec![0.0; 3], vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, GridError::ShapeMismatch { what: "lon", .. }));
    }

    #[test]
    fn s_levels_must_increase_per_column() {
        let g = Grid::rectilinear(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        // Column (0, 1) decreases between k = 0 and k = 1.
        let depth = vec![0.0, 5.0, 0.0, 0.0, 10.0, 1.0, 10.0, 10.0];
        let err = g.with_s_levels(2, depth).unwrap_err();
        assert!(matches!(err, GridError::NotIncreasing { axis: "depth", .. }));
    }

    #[test]
    fn each_grid_gets_its_own_id() {
        let a = Grid::rectilinear(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        let b = Grid::rectilinear(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
