//! Spatial interpolation of one snapshot at a located point.

use crate::grid::Grid;
use crate::search::CellPos;

/// Spatial interpolation method for node-centred data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interp {
    /// Bilinear in the horizontal, linear in the vertical.
    #[default]
    Linear,
    /// Value of the nearest cell corner.
    Nearest,
}

/// `a + frac * (b - a)`, evaluating only the endpoints that carry weight.
///
/// Equal endpoints give that value back exactly, and `b` is never read
/// when `frac` is zero.
#[inline]
pub(crate) fn lerp(frac: f64, a: impl FnOnce() -> f64, b: impl FnOnce() -> f64) -> f64 {
    if frac == 0.0 {
        a()
    } else if frac == 1.0 {
        b()
    } else {
        let a = a();
        a + frac * (b() - a)
    }
}

/// Interpolate `data` (one snapshot on `grid`) at `pos`.
///
/// Corners with zero weight are skipped, so a value sampled exactly at a
/// node is that node's value even when neighbouring nodes hold NaN.
pub(crate) fn interpolate(grid: &Grid, data: &[f32], pos: &CellPos, method: Interp) -> f64 {
    match method {
        Interp::Linear => {
            let at = |dz: usize, dy: usize, dx: usize| {
                data[grid.index(pos.zi[dz], pos.yi[dy], pos.xi[dx])] as f64
            };
            let row = |dz: usize, dy: usize| lerp(pos.xsi, || at(dz, dy, 0), || at(dz, dy, 1));
            let layer = |dz: usize| lerp(pos.eta, || row(dz, 0), || row(dz, 1));
            lerp(pos.zeta, || layer(0), || layer(1))
        }
        Interp::Nearest => {
            let pick = |f: f64| usize::from(f >= 0.5);
            let idx = grid.index(
                pos.zi[pick(pos.zeta)],
                pos.yi[pick(pos.eta)],
                pos.xi[pick(pos.xsi)],
            );
            data[idx] as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Boundaries;

    fn ramp_grid() -> (Grid, Vec<f32>) {
        let g = Grid::rectilinear(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]).unwrap();
        // f(x, y) = x + 10 y
        let mut data = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                data.push(i as f32 + 10.0 * j as f32);
            }
        }
        (g, data)
    }

    #[test]
    fn linear_is_exact_at_nodes_and_on_ramps() {
        let (g, data) = ramp_grid();
        let b = Boundaries::default();
        for (y, x) in [(0.0, 0.0), (1.0, 2.0), (2.0, 2.0), (0.5, 1.25)] {
            let pos = g.locate(0.0, y, x, &b, None).unwrap();
            let v = interpolate(&g, &data, &pos, Interp::Linear);
            assert!((v - (x + 10.0 * y)).abs() < 1e-9, "({x}, {y}) -> {v}");
        }
    }

    #[test]
    fn zero_weight_corners_are_skipped() {
        let (g, mut data) = ramp_grid();
        data[g.index(0, 0, 1)] = f32::NAN;
        let pos = g.locate(0.0, 0.0, 0.0, &Boundaries::default(), None).unwrap();
        assert_eq!(interpolate(&g, &data, &pos, Interp::Linear), 0.0);
    }

    #[test]
    fn linear_returns_a_constant_exactly() {
        let g = Grid::rectilinear(vec![0.0, 7.0, 19.0], vec![-50.0, 13.0, 50.0]).unwrap();
        let data = vec![3.5f32; g.len()];
        let b = Boundaries::default();
        for (y, x) in [(40.2105003040209, 0.0), (-3.3, 6.999), (0.1, 18.7)] {
            let pos = g.locate(0.0, y, x, &b, None).unwrap();
            assert_eq!(interpolate(&g, &data, &pos, Interp::Linear), 3.5);
        }
    }

    #[test]
    fn lerp_skips_unweighted_endpoints() {
        assert_eq!(lerp(0.0, || 2.0, || f64::NAN), 2.0);
        assert_eq!(lerp(1.0, || f64::NAN, || 4.0), 4.0);
        assert_eq!(lerp(0.3, || 0.7, || 0.7), 0.7);
    }

    #[test]
    fn nearest_picks_closest_corner() {
        let (g, data) = ramp_grid();
        let pos = g.locate(0.0, 1.4, 0.6, &Boundaries::default(), None).unwrap();
        assert_eq!(interpolate(&g, &data, &pos, Interp::Nearest), 11.0);
    }
}
