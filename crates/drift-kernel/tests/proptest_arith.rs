//! Kernel arithmetic agrees with host arithmetic.

use drift_core::{Outcome, ParticleId, ParticleRecord, VarType, Variable, VariableSchema};
use drift_kernel::{BoundKernel, Kernel, KernelCache, Scratch, TracingPrint};
use drift_test_utils::ramp_fieldset;
use proptest::prelude::*;

fn eval(body: &str) -> f64 {
    let schema = VariableSchema::builder()
        .variable(Variable::new("out", VarType::F64))
        .build()
        .unwrap();
    let fs = ramp_fieldset();
    let src = format!("fn k(p, fs, t) {{ p.out = {body}; }}");
    let translated = Kernel::new(src.as_str()).translate(&schema).unwrap();
    let compiled = KernelCache::default().get_or_build(&translated).unwrap();
    let bound = BoundKernel::bind(compiled, &fs).unwrap();
    let mut p = ParticleRecord::new(ParticleId(0), 1.0, 1.0, 0.0, 0.0, &schema);
    assert_eq!(bound.run(&mut p, 0, &TracingPrint, &mut Scratch::new()), Outcome::Success);
    p.vars[0]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn precedence_matches_host(a in -50i64..50, b in -50i64..50, c in 1i64..20) {
        let got = eval(&format!("{a} + {b} * {c} - {a} / {c} ** 2"));
        let (a, b, c) = (a as f64, b as f64, c as f64);
        prop_assert_eq!(got, a + b * c - a / c.powf(2.0));
    }

    #[test]
    fn floored_remainder(a in -100i64..100, b in 1i64..17) {
        let got = eval(&format!("{a} % {b}"));
        prop_assert_eq!(got, a.rem_euclid(b) as f64);
    }

    #[test]
    fn comparisons_and_logic(a in -5i64..5, b in -5i64..5) {
        let got = eval(&format!("{a} < {b} && not ({a} == 0) || {b} >= 3"));
        let expected = (a < b && a != 0) || b >= 3;
        prop_assert_eq!(got, f64::from(u8::from(expected)));
    }
}
