//! Cell location: which grid cell contains a point, and where inside it.
//!
//! Rectilinear axes use a hinted binary search. Curvilinear meshes walk
//! cell to cell from the hinted cell, inverting the bilinear map of each
//! quadrilateral until the point's local coordinates fall inside `[0, 1]`.
//! Vertical levels are searched after the horizontal cell is known, since
//! terrain-following depths depend on the horizontal position.

use drift_core::CellHint;

use crate::grid::{Grid, Horizontal, Mesh, Vertical};

/// Behaviour of one axis outside its node range.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum AxisBoundary {
    /// Outside the node range is out of bounds.
    #[default]
    Bounded,
    /// Coordinates wrap with the given period. The cell between the last
    /// node and `first + period` interpolates between the last and first
    /// node columns.
    Periodic {
        /// Wrap length, at least the node span.
        period: f64,
    },
    /// Coordinates are clamped to the node range.
    Extrapolate,
}

/// Boundary behaviour for each spatial axis of a field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Boundaries {
    /// Along longitude / x.
    pub zonal: AxisBoundary,
    /// Along latitude / y.
    pub meridional: AxisBoundary,
    /// Along depth. Periodic is not allowed.
    pub vertical: AxisBoundary,
}

/// Bracketing nodes along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct AxisPos {
    pub lo: usize,
    pub hi: usize,
    pub frac: f64,
}

impl AxisPos {
    fn between(lo: usize, x: f64, a: f64, b: f64) -> Self {
        Self {
            lo,
            hi: lo + 1,
            frac: ((x - a) / (b - a)).clamp(0.0, 1.0),
        }
    }
}

/// A located point: corner indices per axis plus local coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellPos {
    /// West / east column indices.
    pub xi: [usize; 2],
    /// South / north row indices.
    pub yi: [usize; 2],
    /// Upper / lower layer indices (both 0 on surface grids).
    pub zi: [usize; 2],
    /// Local coordinate along i, in `[0, 1]`.
    pub xsi: f64,
    /// Local coordinate along j, in `[0, 1]`.
    pub eta: f64,
    /// Local coordinate along k, in `[0, 1]`.
    pub zeta: f64,
}

impl CellPos {
    /// Hint to cache for the next lookup.
    pub fn hint(&self) -> CellHint {
        CellHint {
            xi: self.xi[0] as u32,
            yi: self.yi[0] as u32,
            zi: self.zi[0] as u32,
        }
    }
}

/// Why a point could not be located.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum LocateError {
    OutOfBounds,
    Degenerate(&'static str),
}

/// Locate `x` among `n >= 2` strictly increasing values produced by `at`.
///
/// `hint` is the lower index of a previously found interval and is tried
/// before falling back to binary search.
pub(crate) fn locate_sorted<F>(
    n: usize,
    at: F,
    x: f64,
    boundary: AxisBoundary,
    hint: Option<usize>,
) -> Option<AxisPos>
where
    F: Fn(usize) -> f64,
{
    debug_assert!(n >= 2);
    if !x.is_finite() {
        return None;
    }
    let first = at(0);
    let last = at(n - 1);
    let x = match boundary {
        AxisBoundary::Bounded => {
            if x < first || x > last {
                return None;
            }
            x
        }
        AxisBoundary::Extrapolate => x.clamp(first, last),
        AxisBoundary::Periodic { period } => {
            let wrapped = first + (x - first).rem_euclid(period);
            let gap = first + period - last;
            if wrapped > last && gap > 0.0 {
                return Some(AxisPos {
                    lo: n - 1,
                    hi: 0,
                    frac: ((wrapped - last) / gap).clamp(0.0, 1.0),
                });
            }
            wrapped.min(last)
        }
    };

    if let Some(h) = hint {
        if h + 1 < n {
            let (a, b) = (at(h), at(h + 1));
            if a <= x && x <= b {
                return Some(AxisPos::between(h, x, a, b));
            }
        }
    }

    // First index whose value exceeds x.
    let (mut lo, mut hi) = (0usize, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if at(mid) <= x {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    let i = lo.saturating_sub(1).min(n - 2);
    Some(AxisPos::between(i, x, at(i), at(i + 1)))
}

/// Convergence tolerance for the curvilinear walk.
const TOL: f64 = 1.0e-10;

impl Grid {
    /// Locate `(z, y, x)` on this grid.
    pub(crate) fn locate(
        &self,
        z: f64,
        y: f64,
        x: f64,
        bounds: &Boundaries,
        hint: Option<CellHint>,
    ) -> Result<CellPos, LocateError> {
        let (xi, yi, xsi, eta) = match self.horizontal() {
            Horizontal::Rectilinear { lon, lat } => {
                let hx = hint.map(|h| h.xi as usize);
                let hy = hint.map(|h| h.yi as usize);
                let px = locate_sorted(lon.len(), |i| lon[i], x, bounds.zonal, hx)
                    .ok_or(LocateError::OutOfBounds)?;
                let py = locate_sorted(lat.len(), |j| lat[j], y, bounds.meridional, hy)
                    .ok_or(LocateError::OutOfBounds)?;
                ([px.lo, px.hi], [py.lo, py.hi], px.frac, py.frac)
            }
            Horizontal::Curvilinear { .. } => self.locate_curvilinear(y, x, bounds, hint)?,
        };

        let hz = hint.map(|h| h.zi as usize);
        let (zi, zeta) = match self.vertical() {
            Vertical::Surface => ([0, 0], 0.0),
            Vertical::ZLevels(levels) => {
                let pz = locate_sorted(levels.len(), |k| levels[k], z, bounds.vertical, hz)
                    .ok_or(LocateError::OutOfBounds)?;
                ([pz.lo, pz.hi], pz.frac)
            }
            Vertical::SLevels { nz, depth } => {
                let plane = self.nx() * self.ny();
                let corners = [
                    (yi[0] * self.nx() + xi[0], (1.0 - xsi) * (1.0 - eta)),
                    (yi[0] * self.nx() + xi[1], xsi * (1.0 - eta)),
                    (yi[1] * self.nx() + xi[1], xsi * eta),
                    (yi[1] * self.nx() + xi[0], (1.0 - xsi) * eta),
                ];
                let column = |k: usize| {
                    corners
                        .iter()
                        .map(|&(col, w)| w * depth[k * plane + col])
                        .sum::<f64>()
                };
                let pz = locate_sorted(*nz, column, z, bounds.vertical, hz)
                    .ok_or(LocateError::OutOfBounds)?;
                ([pz.lo, pz.hi], pz.frac)
            }
        };

        Ok(CellPos {
            xi,
            yi,
            zi,
            xsi,
            eta,
            zeta,
        })
    }

    fn locate_curvilinear(
        &self,
        y: f64,
        x: f64,
        bounds: &Boundaries,
        hint: Option<CellHint>,
    ) -> Result<([usize; 2], [usize; 2], f64, f64), LocateError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(LocateError::OutOfBounds);
        }
        let (nx, ny) = (self.nx(), self.ny());
        let [lon_min, lon_max, lat_min, lat_max] = self.bbox();

        let x = match bounds.zonal {
            AxisBoundary::Periodic { period } => lon_min + (x - lon_min).rem_euclid(period),
            AxisBoundary::Extrapolate => x.clamp(lon_min, lon_max),
            AxisBoundary::Bounded => {
                if x < lon_min || x > lon_max {
                    return Err(LocateError::OutOfBounds);
                }
                x
            }
        };
        let y = match bounds.meridional {
            AxisBoundary::Extrapolate => y.clamp(lat_min, lat_max),
            _ => {
                if y < lat_min || y > lat_max {
                    return Err(LocateError::OutOfBounds);
                }
                y
            }
        };
        let period = match bounds.zonal {
            AxisBoundary::Periodic { period } => Some(period),
            _ => None,
        };
        // A periodic mesh has one extra column of cells: the gap cell joining
        // the last node column to the first, shifted by one period.
        let columns = if period.is_some() { nx } else { nx - 1 };

        let (mut xi, mut yi) = match hint {
            Some(h) => (h.xi as usize, h.yi as usize),
            None => ((nx / 2).saturating_sub(1), (ny / 2).saturating_sub(1)),
        };
        xi = xi.min(columns - 1);
        yi = yi.min(ny - 2);

        let located = |xi: usize, yi: usize, xsi: f64, eta: f64| {
            (
                [xi, (xi + 1) % nx],
                [yi, yi + 1],
                xsi.clamp(0.0, 1.0),
                eta.clamp(0.0, 1.0),
            )
        };

        let max_iter = 2 * (columns + ny) + 16;
        for _ in 0..max_iter {
            let (xsi, eta) = self.invert_cell(yi, xi, period, y, x)?;

            let inside_x = (-TOL..=1.0 + TOL).contains(&xsi);
            let inside_y = (-TOL..=1.0 + TOL).contains(&eta);
            if inside_x && inside_y {
                return Ok(located(xi, yi, xsi, eta));
            }

            let mut moved = false;
            if xsi < -TOL {
                if xi > 0 {
                    xi -= 1;
                    moved = true;
                } else if period.is_some() {
                    xi = columns - 1;
                    moved = true;
                } else if bounds.zonal != AxisBoundary::Extrapolate {
                    return Err(LocateError::OutOfBounds);
                }
            } else if xsi > 1.0 + TOL {
                if xi + 1 < columns {
                    xi += 1;
                    moved = true;
                } else if period.is_some() {
                    xi = 0;
                    moved = true;
                } else if bounds.zonal != AxisBoundary::Extrapolate {
                    return Err(LocateError::OutOfBounds);
                }
            }
            if eta < -TOL {
                if yi > 0 {
                    yi -= 1;
                    moved = true;
                } else if bounds.meridional != AxisBoundary::Extrapolate {
                    return Err(LocateError::OutOfBounds);
                }
            } else if eta > 1.0 + TOL {
                if yi < ny - 2 {
                    yi += 1;
                    moved = true;
                } else if bounds.meridional != AxisBoundary::Extrapolate {
                    return Err(LocateError::OutOfBounds);
                }
            }

            if !moved {
                // Pinned against an extrapolating edge.
                return Ok(located(xi, yi, xsi, eta));
            }
        }
        Err(LocateError::OutOfBounds)
    }

    /// Node longitudes of the east corners of cell column `xi`. The gap
    /// column of a periodic mesh takes the first column shifted by `period`.
    fn east_lon(&self, j: usize, xi: usize, period: Option<f64>) -> f64 {
        match period {
            Some(period) if xi + 1 == self.nx() => self.node_lon(j, 0) + period,
            _ => self.node_lon(j, xi + 1),
        }
    }

    /// Local coordinates of `(x, y)` relative to cell `(yi, xi)`.
    ///
    /// Corners are taken counter-clockwise from `(yi, xi)`. The local
    /// coordinates are not restricted to `[0, 1]`; values outside tell the
    /// walk which neighbour to try next.
    fn invert_cell(
        &self,
        yi: usize,
        xi: usize,
        period: Option<f64>,
        y: f64,
        x: f64,
    ) -> Result<(f64, f64), LocateError> {
        let ei = (xi + 1) % self.nx();
        let mut px = [
            self.node_lon(yi, xi),
            self.east_lon(yi, xi, period),
            self.east_lon(yi + 1, xi, period),
            self.node_lon(yi + 1, xi),
        ];
        let py = [
            self.node_lat(yi, xi),
            self.node_lat(yi, ei),
            self.node_lat(yi + 1, ei),
            self.node_lat(yi + 1, xi),
        ];
        if self.mesh() == Mesh::Spherical {
            if px[0] < x - 225.0 {
                px[0] += 360.0;
            } else if px[0] > x + 225.0 {
                px[0] -= 360.0;
            }
            let p0 = px[0];
            for v in &mut px[1..] {
                if *v - p0 > 180.0 {
                    *v -= 360.0;
                } else if p0 - *v > 180.0 {
                    *v += 360.0;
                }
            }
        }

        let a = [
            px[0],
            px[1] - px[0],
            px[3] - px[0],
            px[0] - px[1] + px[2] - px[3],
        ];
        let b = [
            py[0],
            py[1] - py[0],
            py[3] - py[0],
            py[0] - py[1] + py[2] - py[3],
        ];

        let aa = a[3] * b[2] - a[2] * b[3];
        let bb = a[3] * b[0] - a[0] * b[3] + a[1] * b[2] - a[2] * b[1] + x * b[3] - y * a[3];
        let cc = a[1] * b[0] - a[0] * b[1] + x * b[1] - y * a[1];

        let eta = if aa.abs() < 1e-12 {
            if bb.abs() < 1e-300 {
                return Err(LocateError::Degenerate("cell has zero area"));
            }
            -cc / bb
        } else {
            let disc = bb * bb - 4.0 * aa * cc;
            if disc < 0.0 {
                return Err(LocateError::Degenerate("no real local coordinate"));
            }
            (-bb + disc.sqrt()) / (2.0 * aa)
        };

        let denom = a[1] + a[3] * eta;
        let xsi = if denom.abs() < 1e-12 {
            // Cell rotated by 90 degrees: i runs along latitude.
            ((y - py[0]) / (py[1] - py[0]) + (y - py[3]) / (py[2] - py[3])) * 0.5
        } else {
            (x - a[0] - a[2] * eta) / denom
        };
        if !xsi.is_finite() || !eta.is_finite() {
            return Err(LocateError::Degenerate("non-finite local coordinate"));
        }
        Ok((xsi, eta))
    }

    /// Bearing (radians, counter-clockwise from east) of the i-axis of a
    /// cell, averaged over its south and north edges.
    pub(crate) fn cell_bearing(&self, pos: &CellPos, bounds: &Boundaries) -> f64 {
        let [i0, i1] = pos.xi;
        let [j0, j1] = pos.yi;
        // Only the gap cell of a periodic mesh wraps back to column zero.
        let shift = match bounds.zonal {
            AxisBoundary::Periodic { period } if i1 < i0 => period,
            _ => 0.0,
        };
        let mut dlon = 0.5
            * ((self.node_lon(j0, i1) + shift - self.node_lon(j0, i0))
                + (self.node_lon(j1, i1) + shift - self.node_lon(j1, i0)));
        let dlat = 0.5
            * ((self.node_lat(j0, i1) - self.node_lat(j0, i0))
                + (self.node_lat(j1, i1) - self.node_lat(j1, i0)));
        if self.mesh() == Mesh::Spherical {
            dlon = (dlon + 180.0).rem_euclid(360.0) - 180.0;
            let lat = 0.5 * (self.node_lat(j0, i0) + self.node_lat(j1, i1));
            dlon *= lat.to_radians().cos();
        }
        dlat.atan2(dlon)
    }
}
