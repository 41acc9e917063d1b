//! Field and field-set fixtures.

use std::sync::Arc;

use drift_field::{AxisBoundary, Field, FieldSet, Grid, VectorField};

/// `n` evenly spaced values from `start` to `stop` inclusive.
pub fn axis(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Flat rectilinear grid over `[lon0, lon1] x [lat0, lat1]` with nodes
/// `step` apart.
pub fn flat_grid(lon: [f64; 2], lat: [f64; 2], step: f64) -> Arc<Grid> {
    let n = |r: [f64; 2]| ((r[1] - r[0]) / step).round() as usize + 1;
    Arc::new(Grid::rectilinear(axis(lon[0], lon[1], n(lon)), axis(lat[0], lat[1], n(lat))).unwrap())
}

/// Uniform flow `(u, v)` over `[-100, 100] x [-50, 50]`, bounded on every
/// side. Registers `U`, `V` and the vector `UV`.
pub fn uniform_flow(u: f32, v: f32) -> FieldSet {
    uniform_flow_on(u, v, [-100.0, 100.0], [-50.0, 50.0], AxisBoundary::Bounded)
}

/// Uniform flow over a custom box with one zonal boundary mode. Nodes sit
/// on integer coordinates, so unit steps from integer positions land on
/// nodes exactly.
pub fn uniform_flow_on(
    u: f32,
    v: f32,
    lon: [f64; 2],
    lat: [f64; 2],
    zonal: AxisBoundary,
) -> FieldSet {
    let grid = flat_grid(lon, lat, 1.0);
    let uf = Arc::new(
        Field::builder("U", grid.clone())
            .constant(u)
            .zonal(zonal)
            .build()
            .unwrap(),
    );
    let vf = Arc::new(
        Field::builder("V", grid)
            .constant(v)
            .zonal(zonal)
            .build()
            .unwrap(),
    );
    let mut b = FieldSet::builder();
    b.add_vector_field(VectorField::builder("UV", uf, vf).build().unwrap())
        .unwrap();
    b.build()
}

/// Value of the linear ramp at a point: `2 lon + 3 lat`.
pub fn ramp_value(lon: f64, lat: f64) -> f64 {
    2.0 * lon + 3.0 * lat
}

/// Scalar `name` holding [`ramp_value`] on an integer-spaced grid over
/// `[0, 10] x [0, 5]`.
pub fn ramp_field(name: &str) -> Field {
    let lon = axis(0.0, 10.0, 11);
    let lat = axis(0.0, 5.0, 6);
    let data: Vec<f32> = lat
        .iter()
        .flat_map(|&y| lon.iter().map(move |&x| ramp_value(x, y) as f32))
        .collect();
    let grid = Arc::new(Grid::rectilinear(lon, lat).unwrap());
    Field::builder(name, grid).snapshot(data).build().unwrap()
}

/// Field set holding one ramp field `T` and the constant `scale = 2`.
pub fn ramp_fieldset() -> FieldSet {
    let mut b = FieldSet::builder();
    b.add_field(ramp_field("T")).unwrap();
    b.add_constant("scale", 2.0).unwrap();
    b.build()
}
