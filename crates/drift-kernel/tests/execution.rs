//! End-to-end kernel execution: translate, build, bind and invoke.

use drift_core::{
    ErrorKind, Outcome, ParticleId, ParticleRecord, VarType, Variable, VariableSchema,
};
use drift_field::FieldSet;
use drift_kernel::{BindError, BoundKernel, CapturedPrint, Kernel, KernelCache, Scratch, TracingPrint};
use drift_test_utils::{kernels, ramp_fieldset, ramp_value, uniform_flow};

fn schema() -> VariableSchema {
    VariableSchema::builder()
        .variable(Variable::new("age", VarType::F64))
        .variable(Variable::new("hits", VarType::I32))
        .build()
        .unwrap()
}

fn particle(lon: f64, lat: f64, schema: &VariableSchema) -> ParticleRecord {
    let mut p = ParticleRecord::new(ParticleId(1), lon, lat, 0.0, 0.0, schema);
    p.dt = 1.0;
    p
}

fn run(kernel: Kernel, fs: &FieldSet, p: &mut ParticleRecord, schema: &VariableSchema) -> Outcome {
    let cache = KernelCache::default();
    let translated = kernel.translate(schema).unwrap();
    let compiled = cache.get_or_build(&translated).unwrap();
    let bound = BoundKernel::bind(compiled, fs).unwrap();
    bound.run(p, 7, &TracingPrint, &mut Scratch::new())
}

#[test]
fn euler_moves_with_the_flow() {
    let s = schema();
    let fs = uniform_flow(1.0, 0.5);
    let mut p = particle(0.0, 0.0, &s);
    assert_eq!(run(Kernel::new(kernels::EULER), &fs, &mut p, &s), Outcome::Success);
    assert_eq!(p.lon, 1.0);
    assert_eq!(p.lat, 0.5);
    assert_eq!(p.time, 0.0, "kernels never advance time");
}

#[test]
fn rk4_matches_euler_in_uniform_flow() {
    let s = schema();
    let fs = uniform_flow(2.0, -1.0);
    let mut a = particle(3.0, 4.0, &s);
    let mut b = a.clone();
    run(Kernel::new(kernels::EULER), &fs, &mut a, &s);
    run(Kernel::new(kernels::RK4), &fs, &mut b, &s);
    assert!((a.lon - b.lon).abs() < 1e-12);
    assert!((a.lat - b.lat).abs() < 1e-12);
}

#[test]
fn composed_kernels_share_locals_in_order() {
    let s = schema();
    let fs = ramp_fieldset();
    let set = "fn set(p, fs, t) { let k = fs.scale * 10; }";
    let use_ = "fn use_k(p, fs, t) { p.age = k + fs.T[p]; }";
    let mut p = particle(2.0, 1.0, &s);
    run(Kernel::new(set) + Kernel::new(use_), &fs, &mut p, &s);
    assert_eq!(p.vars[0], 20.0 + ramp_value(2.0, 1.0));

    // Reversed, `k` is read before any segment assigns it.
    assert!(Kernel::new(use_).then(set).translate(&s).is_err());
}

#[test]
fn locals_reset_between_invocations() {
    let s = schema();
    let fs = ramp_fieldset();
    let k = Kernel::new("fn count(p, fs, t) { n += 1; p.hits = n; }");
    let translated = k.translate(&s).unwrap();
    let compiled = KernelCache::default().get_or_build(&translated).unwrap();
    let bound = BoundKernel::bind(compiled, &fs).unwrap();
    let mut scratch = Scratch::new();
    for _ in 0..3 {
        let mut p = particle(1.0, 1.0, &s);
        bound.run(&mut p, 0, &TracingPrint, &mut scratch);
        assert_eq!(p.vars[1], 1.0);
    }
}

#[test]
fn integer_variables_truncate_on_store() {
    let s = schema();
    let fs = ramp_fieldset();
    let mut p = particle(1.0, 1.0, &s);
    run(Kernel::new("fn k(p, fs, t) { p.hits = 2.9; p.age = 2.9; }"), &fs, &mut p, &s);
    assert_eq!(p.vars.as_slice(), &[2.9, 2.0]);
}

#[test]
fn failed_sample_reports_its_kind_and_stops_the_invocation() {
    let s = schema();
    let fs = ramp_fieldset();
    let mut p = particle(50.0, 1.0, &s);
    let out = run(
        Kernel::new("fn k(p, fs, t) { p.age = 1; let x = fs.T[p]; p.age = 2; }"),
        &fs,
        &mut p,
        &s,
    );
    assert_eq!(out, Outcome::Error(ErrorKind::OutOfBounds));
    assert_eq!(p.vars[0], 1.0);
}

#[test]
fn statuses_map_to_outcomes() {
    let s = schema();
    let fs = ramp_fieldset();
    let cases = [
        ("return Delete;", Outcome::Delete),
        ("p.delete();", Outcome::Delete),
        ("return Error;", Outcome::Error(ErrorKind::Custom)),
        ("return StopExecution;", Outcome::StopExecution),
        ("return Success;", Outcome::Success),
        ("return;", Outcome::Success),
    ];
    for (body, expected) in cases {
        let mut p = particle(1.0, 1.0, &s);
        let src = format!("fn k(p, fs, t) {{ {body} }}");
        assert_eq!(run(Kernel::new(src.as_str()), &fs, &mut p, &s), expected, "{body}");
    }
}

#[test]
fn return_ends_only_its_own_function() {
    let s = schema();
    let fs = ramp_fieldset();
    let mut p = particle(1.0, 1.0, &s);
    let k = Kernel::new("fn a(p, fs, t) { return; p.age = 99; }")
        .then("fn b(p, fs, t) { p.hits = 3; }");
    assert_eq!(run(k, &fs, &mut p, &s), Outcome::Success);
    assert_eq!(p.vars.as_slice(), &[0.0, 3.0]);
}

#[test]
fn control_flow_and_math() {
    let s = schema();
    let fs = ramp_fieldset();
    let mut p = particle(1.0, 1.0, &s);
    run(
        Kernel::new(
            "fn k(p, fs, t) {
                let i = 0;
                let acc = 0;
                while true {
                    i += 1;
                    if i % 2 == 0 { acc += i; } else if i > 9 { break; }
                }
                p.age = acc + math.floor(math.pi) + math.hypot(3, 4);
                p.hits = (i >= 9 && not (acc < 0)) || 1 / 0 > 0;
            }",
        ),
        &fs,
        &mut p,
        &s,
    );
    // 2 + 4 + 6 + 8 + 10 = 30, loop exits at i = 11.
    assert_eq!(p.vars[0], 30.0 + 3.0 + 5.0);
    assert_eq!(p.vars[1], 1.0);
}

#[test]
fn explicit_and_particle_sampling_agree() {
    let s = schema();
    let fs = ramp_fieldset();
    let mut p = particle(3.25, 2.5, &s);
    run(
        Kernel::new(
            "fn k(p, fs, t) {
                p.age = fs.T[t, p.depth, p.lat, p.lon] - fs.T[p];
                p.hits = fs.T[t, 0, 1, 2];
            }",
        ),
        &fs,
        &mut p,
        &s,
    );
    assert!(p.vars[0].abs() < 1e-12);
    assert_eq!(p.vars[1], ramp_value(2.0, 1.0));
}

#[test]
fn random_draws_are_reproducible_per_particle_and_time() {
    let s = schema();
    let fs = ramp_fieldset();
    let k = Kernel::new("fn k(p, fs, t) { p.age = random.uniform(0, 1) + random.normal(0, 1); }");
    let draw = |id: u64, time: f64| {
        let mut p = ParticleRecord::new(ParticleId(id), 1.0, 1.0, 0.0, time, &s);
        run(k.clone(), &fs, &mut p, &s);
        p.vars[0]
    };
    assert_eq!(draw(1, 0.0), draw(1, 0.0));
    assert_ne!(draw(1, 0.0), draw(2, 0.0));
    assert_ne!(draw(1, 0.0), draw(1, 1.0));
}

#[test]
fn prints_go_to_the_sink() {
    let s = schema();
    let fs = ramp_fieldset();
    let translated = Kernel::new(r#"fn k(p, fs, t) { print("p{} at {:.1}", p.id, p.lon); }"#)
        .translate(&s)
        .unwrap();
    let compiled = KernelCache::default().get_or_build(&translated).unwrap();
    let bound = BoundKernel::bind(compiled, &fs).unwrap();
    let sink = CapturedPrint::new();
    let mut p = particle(1.3, 1.0, &s);
    bound.run(&mut p, 0, &sink, &mut Scratch::new());
    assert_eq!(sink.take(), vec![(ParticleId(1), "p1 at 1.3".to_string())]);
}

#[test]
fn binding_checks_names_and_components() {
    let s = schema();
    let fs = ramp_fieldset();
    let cache = KernelCache::default();
    let bind = |src: &str| {
        let t = Kernel::new(src).translate(&s).unwrap();
        BoundKernel::bind(cache.get_or_build(&t).unwrap(), &fs).map(|_| ())
    };
    assert_eq!(
        bind("fn k(p, fs, t) { p.age = fs.S[p]; }"),
        Err(BindError::UnknownField { name: "S".into() })
    );
    assert_eq!(
        bind("fn k(p, fs, t) { p.age = fs.gravity; }"),
        Err(BindError::UnknownConstant {
            name: "gravity".into()
        })
    );
    assert_eq!(
        bind("fn k(p, fs, t) { let (a, b) = fs.T[p]; }"),
        Err(BindError::ComponentMismatch {
            name: "T".into(),
            expected: 2,
            actual: 1
        })
    );
    assert!(bind("fn k(p, fs, t) { p.age = fs.T[p] * fs.scale; }").is_ok());
}
