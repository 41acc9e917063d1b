//! Reference kernel sources.

/// Forward-Euler advection through `UV`.
pub const EULER: &str = "\
fn advect_euler(particle, fieldset, time) {
    let (u, v) = fieldset.UV[time, particle.depth, particle.lat, particle.lon];
    particle.lon += u * particle.dt;
    particle.lat += v * particle.dt;
}";

/// Fourth-order Runge-Kutta advection through `UV`.
pub const RK4: &str = "\
fn advect_rk4(particle, fieldset, time) {
    let dt = particle.dt;
    let (u1, v1) = fieldset.UV[time, particle.depth, particle.lat, particle.lon];
    let lon1 = particle.lon + u1 * 0.5 * dt;
    let lat1 = particle.lat + v1 * 0.5 * dt;
    let (u2, v2) = fieldset.UV[time + 0.5 * dt, particle.depth, lat1, lon1];
    let lon2 = particle.lon + u2 * 0.5 * dt;
    let lat2 = particle.lat + v2 * 0.5 * dt;
    let (u3, v3) = fieldset.UV[time + 0.5 * dt, particle.depth, lat2, lon2];
    let lon3 = particle.lon + u3 * dt;
    let lat3 = particle.lat + v3 * dt;
    let (u4, v4) = fieldset.UV[time + dt, particle.depth, lat3, lon3];
    particle.lon += (u1 + 2 * u2 + 2 * u3 + u4) / 6 * dt;
    particle.lat += (v1 + 2 * v2 + 2 * v3 + v4) / 6 * dt;
}";

/// Accumulates elapsed time in the `age` variable.
pub const AGE: &str = "\
fn age(particle, fieldset, time) {
    particle.age += particle.dt;
}";

/// Deletes the particle instead of letting it leave the domain.
pub const DELETE: &str = "\
fn delete_particle(particle, fieldset, time) {
    particle.delete();
}";

/// Halves the timestep and asks for a retry.
pub const HALVE_DT: &str = "\
fn halve_dt(particle, fieldset, time) {
    particle.dt /= 2;
    return Success;
}";
