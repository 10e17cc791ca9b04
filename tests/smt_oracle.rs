// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod common;
use common::define_counter;

use kinduct::ir::*;
use kinduct::mc::*;
use kinduct::{exit_code, Loader};

fn z3_is_available() -> bool {
    std::process::Command::new("z3")
        .arg("-version")
        .output()
        .is_ok()
}

fn z3(options: &VerifyOptions) -> OracleResult<SmtOracle> {
    SmtOracle::new(
        Z3_CMD,
        SmtOracleOptions {
            replay_file: None,
            timeout: options.oracle_timeout,
        },
    )
}

#[test]
fn z3_counter() {
    if !z3_is_available() {
        return;
    }
    let mut loader = Loader::new();
    let counter = define_counter(loader.ctx());
    loader.define_sys(counter).unwrap();
    let ctx = loader.ctx();
    let out = ctx.curr("out", Sort::Int);
    let zero = ctx.int_lit(0);
    let ten = ctx.int_lit(10);
    let nonneg = ctx.greater_or_equal(out, zero);
    let bounded = ctx.less_or_equal(out, ten);
    loader.define_prop("nonneg", "counter", nonneg).unwrap();
    loader.define_prop("bounded", "counter", bounded).unwrap();
    loader.verify("counter", &["nonneg"]).unwrap();
    loader.verify("counter", &["bounded"]).unwrap();
    let model = loader.finish().unwrap();

    let mut options = VerifyOptions::default();
    options.set("timeout_ms", "10000").unwrap();
    let reports = model.run(z3, &options).unwrap();
    assert_eq!(reports[0].results["nonneg"], VerificationResult::Proven(1));

    let trace = match &reports[1].results["bounded"] {
        VerificationResult::Disproven(trace) => trace,
        other => panic!("expected a counterexample, got {other}"),
    };
    let ctx = model.ctx();
    assert_eq!(trace.len(), 11);
    for step in 0..11 {
        assert_eq!(trace.get(ctx, "in", step), Some(Value::Bool(true)));
    }
    assert_eq!(trace.get(ctx, "out", 10), Some(Value::Int(11)));
    let sys = model.flattened("counter").unwrap();
    assert_eq!(trace.replay_check(ctx, sys), Ok(true));
    assert_eq!(exit_code(&reports), 1);
}

#[test]
fn z3_uninterpreted_functions() {
    if !z3_is_available() {
        return;
    }
    let mut loader = Loader::new();
    let limit = loader.declare_fun("limit", Sort::Int).unwrap();
    let ctx = loader.ctx();
    let a = ctx.param("a", Sort::Int);
    let b = ctx.param("b", Sort::Int);
    let body = ctx.less_or_equal(a, b);
    let below = loader.define_fun("below", vec![a, b], Sort::Bool, body).unwrap();

    let counter = define_counter(loader.ctx());
    loader.define_sys(counter).unwrap();
    let out = loader.ctx().curr("out", Sort::Int);
    let prop = loader.ctx().apply(below, &[out, limit]).unwrap();
    loader.define_prop("below_limit", "counter", prop).unwrap();
    loader.verify_with_depth("counter", &[], Some(3)).unwrap();
    let model = loader.finish().unwrap();

    let reports = model.run(z3, &VerifyOptions::default()).unwrap();
    match &reports[0].results["below_limit"] {
        VerificationResult::Disproven(trace) => {
            let ctx = model.ctx();
            let limit = trace.symbols[&ctx.find_str("limit").unwrap()];
            let last = trace.get(ctx, "out", trace.len() - 1).unwrap();
            assert!(last.as_int().unwrap() > limit.as_int().unwrap());
            assert_eq!(trace.replay_check(ctx, model.flattened("counter").unwrap()), Ok(true));
        }
        other => panic!("expected a counterexample, got {other}"),
    }
}
