//! End-to-end tests of the declarative model subsystem.

use rowode::model::{build_pipeline, emit, parse, CompiledModel, Descriptor};
use rowode::prelude::*;

/// Gluconic-acid style fed-batch fermentation: biomass X, product P,
/// substrate S, intermediate A, with a substrate feed at t = 60.
const GA_PRODUCTION: &str = "\
#name: GA production
#tags: model
#description: Fed-batch fermentation with a mid-run substrate feed
#equations:
  dX/dt = rate * X
  dP/dt = k1 * A
  dS/dt = -gamma * rate * X - k2 * A
  dA/dt = k3 * rate * X - k1 * A
#expressions:
  rate = mu * S / (ks + S)
#argument: t, 1-st stage
  start = 0
  finish = 60
  step = 10
#update: 2-nd stage
  duration = overall - _t1
  S += 70
#inits:
  X = 0.5
  P = 0
  S = 150
  A = 0
#parameters:
  mu = 0.17 {category: Rates}
  ks = 60
  k1 = 0.12
  k2 = 0.06
  k3 = 0.08
  gamma = 1.7
  overall = 100 {caption: total time}
#tolerance: 1e-9
";

#[test]
fn two_stage_pipeline_feeds_substrate() {
    let pipeline = build_pipeline(parse(GA_PRODUCTION).unwrap()).unwrap();
    assert_eq!(pipeline.stage_count(), 2);
    let sol = pipeline.apply(Method::Ros34PRw).unwrap();

    // Stage 1 emits 7 samples on [0, 60], stage 2 emits 5 on [60, 100];
    // the boundary argument appears once per stage.
    assert_eq!(sol.len(), 12);
    assert_eq!(sol.t[6], 60.0);
    assert_eq!(sol.t[7], 60.0);
    assert_eq!(*sol.t.last().unwrap(), 100.0);

    // The feed adds exactly 70 to S across the boundary, and components the
    // update does not touch carry over bit for bit.
    let s = sol.column("S").unwrap();
    assert_eq!(s[7], s[6] + 70.0);
    for name in ["X", "P", "A"] {
        let col = sol.column(name).unwrap();
        assert_eq!(col[7], col[6], "{name} changed across the boundary");
    }

    // Substrate is consumed within each stage
    assert!(s[6] < 150.0);
    assert!(*s.last().unwrap() < s[7]);
}

#[test]
fn methods_agree_on_the_pipeline() {
    let pipeline = build_pipeline(parse(GA_PRODUCTION).unwrap()).unwrap();
    let finals: Vec<Vec<f64>> = [Method::Mrt, Method::Ros3PRw, Method::Ros34PRw]
        .iter()
        .map(|&m| pipeline.apply(m).unwrap().last())
        .collect();
    for pair in finals.windows(2) {
        for i in 0..4 {
            let rel = (pair[0][i] - pair[1][i]).abs() / pair[0][i].abs().max(1.0);
            assert!(rel < 1e-4, "component {i} disagrees: {rel:e}");
        }
    }
}

#[test]
fn wrong_derivative_argument_is_rejected() {
    let src = GA_PRODUCTION.replace("dS/dt", "dS/dz");
    let err = parse(&src).unwrap_err();
    match err {
        ModelError::Parse {
            line,
            section,
            message,
        } => {
            assert_eq!(section, "equations");
            assert_eq!(line, 7);
            assert!(message.contains("`z`"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn parse_emit_parse_is_stable_for_the_scenario_set() {
    let outputs_and_loop = "\
#name: Cycler
#equations:
  dx/dt = -x + drive
#expressions:
  drive = 0.1 * cos(t)
#argument: t
  start = 0
  finish = 6.28
  step = 0.314
#inits:
  x = 1 [starting level]
#loop:
  count = 4
  x *= 0.5
#output:
  x {caption: level}
  drive
#tolerance: 1e-7
";
    for src in [GA_PRODUCTION, outputs_and_loop] {
        let first = parse(src).unwrap();
        let text = emit(&first);
        let second = parse(&text).unwrap();
        assert_eq!(first, second, "round trip changed the model:\n{text}");
        assert_eq!(text, emit(&second));
    }
}

#[test]
fn unknown_identifier_reports_the_token() {
    let src = GA_PRODUCTION.replace("k3 * rate * X", "k3 * rate * Y");
    let err = CompiledModel::compile(parse(&src).unwrap()).unwrap_err();
    match err {
        ModelError::UnknownName { name, .. } => assert_eq!(name, "Y"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn outputs_select_and_order_columns() {
    let src = GA_PRODUCTION.to_string() + "#output:\n  S\n  rate\n";
    let pipeline = build_pipeline(parse(&src).unwrap()).unwrap();
    let sol = pipeline.apply(Method::Ros34PRw).unwrap();
    assert_eq!(sol.names, vec!["S", "rate"]);
    // The expression column satisfies its own definition at every sample
    let s = sol.column("S").unwrap();
    let rate = sol.column("rate").unwrap();
    for k in 0..sol.len() {
        let expected = 0.17 * s[k] / (60.0 + s[k]);
        assert!((rate[k] - expected).abs() < 1e-12);
    }
}

#[test]
fn descriptor_round_trips_through_json() {
    let compiled = CompiledModel::compile(parse(GA_PRODUCTION).unwrap()).unwrap();
    let descriptor = compiled.descriptor();
    let json = serde_json::to_string(&descriptor).unwrap();
    let revived: Descriptor = serde_json::from_str(&json).unwrap();

    // The revived descriptor runs the first stage standalone
    let sol = solve(&revived.ivp(), &revived, Method::Ros34PRw).unwrap();
    assert_eq!(sol.len(), 7);
    assert_eq!(*sol.t.last().unwrap(), 60.0);

    // And it computes the same right-hand side as the compiled model
    let y = [0.5, 0.0, 150.0, 0.0];
    let mut a = [0.0; 4];
    let mut b = [0.0; 4];
    compiled.rhs(0.0, &y, &mut a);
    revived.rhs(0.0, &y, &mut b);
    assert_eq!(a, b);
}

#[test]
fn input_vector_projects_by_model_order() {
    use std::collections::HashMap;

    let model = parse(GA_PRODUCTION).unwrap();
    let order = rowode::model::input_order(&model);
    assert_eq!(order[..3], ["start", "finish", "step"]);
    assert_eq!(order[3..7], ["X", "P", "S", "A"]);
    assert_eq!(order[7], "mu");

    let mut map = HashMap::new();
    map.insert("S".to_string(), 200.0);
    let inputs = rowode::model::input_vector(&map, &model).unwrap();
    let pipeline = build_pipeline(model).unwrap();
    let sol = pipeline.apply_with(&inputs, Method::Ros34PRw).unwrap();
    assert_eq!(sol.column("S").unwrap()[0], 200.0);

    map.insert("nope".to_string(), 1.0);
    let model = parse(GA_PRODUCTION).unwrap();
    assert!(rowode::model::input_vector(&map, &model).is_err());
}
