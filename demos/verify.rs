// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use clap::{Parser, ValueEnum};
use kinduct::ir::*;
use kinduct::mc::*;
use kinduct::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "verify")]
#[command(author = "Kevin Laeufer <laeufer@cornell.edu>")]
#[command(version)]
#[command(about = "Builds one of the bundled models and verifies all of its requests.", long_about = None)]
struct Args {
    #[arg(value_enum, index = 1)]
    model: Demo,
    #[arg(long, value_enum, default_value = "z3")]
    solver: Solver,
    /// Verification options as `key=value`, e.g., `k_max=5`, `engine=bmc`,
    /// `relations=discharge` or `timeout_ms=1000`.
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,
    /// Logs the solver communication of the n-th oracle to `replay-<n>.smt`.
    #[arg(long, default_value_t = false)]
    replay: bool,
    /// Runs every request on its own thread.
    #[arg(long, default_value_t = false)]
    parallel: bool,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Demo {
    /// `out` counts how often `in` was set
    Counter,
    /// a parent observes the increments of a `count` subsystem
    Observer,
    /// two properties that are only inductive together
    Accumulator,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Solver {
    Z3,
    Cvc5,
    Yices2,
}

impl Solver {
    fn cmd(self) -> SmtSolverCmd {
        match self {
            Solver::Z3 => Z3_CMD,
            Solver::Cvc5 => CVC5_CMD,
            Solver::Yices2 => YICES2_CMD,
        }
    }
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut options = VerifyOptions::default();
    for option in args.options.iter() {
        let result = match option.split_once('=') {
            Some((key, value)) => options.set(key.trim(), value.trim()),
            None => options.set(option, ""),
        };
        if let Err(e) = result {
            eprintln!("{e}");
            std::process::exit(FATAL_EXIT_CODE);
        }
    }

    let model = match load(args.model) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(FATAL_EXIT_CODE);
        }
    };

    let solver = args.solver.cmd();
    let replay = args.replay;
    let num_oracles = AtomicUsize::new(0);
    let make_oracle = |options: &VerifyOptions| {
        let n = num_oracles.fetch_add(1, Ordering::Relaxed);
        SmtOracle::new(
            solver,
            SmtOracleOptions {
                replay_file: replay.then(|| PathBuf::from(format!("replay-{n}.smt"))),
                timeout: options.oracle_timeout,
            },
        )
    };
    let reports = if args.parallel {
        model.run_parallel(make_oracle, &options)
    } else {
        model.run(make_oracle, &options)
    };
    let reports = match reports {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(FATAL_EXIT_CODE);
        }
    };

    for report in reports.iter() {
        println!("verify {}", report.task.system);
        for (id, result) in report.results.iter() {
            println!("  {id}: {result}");
            if let VerificationResult::Disproven(trace) = result {
                for line in trace.display(model.ctx()).to_string().lines() {
                    println!("    {line}");
                }
            }
        }
    }
    std::process::exit(exit_code(&reports));
}

fn load(demo: Demo) -> Result<Model> {
    let mut loader = Loader::new();
    match demo {
        Demo::Counter => counter(&mut loader)?,
        Demo::Observer => observer(&mut loader)?,
        Demo::Accumulator => accumulator(&mut loader)?,
    }
    loader.finish()
}

fn counter(loader: &mut Loader) -> Result<()> {
    let ctx = loader.ctx();
    let sig = StateSignature::new(ctx, "counter", &[("in", Sort::Bool), ("out", Sort::Int)])?;
    let inp = ctx.curr("in", Sort::Bool);
    let out = ctx.curr("out", Sort::Int);
    let zero = ctx.int_lit(0);
    let one = ctx.int_lit(1);
    let ten = ctx.int_lit(10);
    let init_val = ctx.ite(inp, one, zero);
    let init = ctx.equal(out, init_val);
    let inp_next = ctx.next("in", Sort::Bool);
    let out_next = ctx.next("out", Sort::Int);
    let inc = ctx.add(out, one);
    let next_val = ctx.ite(inp_next, inc, out);
    let trans = ctx.equal(out_next, next_val);
    let nonneg = ctx.greater_or_equal(out, zero);
    let bounded = ctx.less_or_equal(out, ten);
    loader.define_sys(TransitionSystem::new("counter", sig, init, trans))?;
    loader.define_prop("nonneg", "counter", nonneg)?;
    loader.define_prop("bounded", "counter", bounded)?;
    loader.verify("counter", &["nonneg"])?;
    loader.verify("counter", &["bounded"])
}

fn observer(loader: &mut Loader) -> Result<()> {
    let ctx = loader.ctx();
    let sig = StateSignature::new(
        ctx,
        "count",
        &[("count_in", Sort::Bool), ("count_out", Sort::Int)],
    )?;
    let inp = ctx.curr("count_in", Sort::Bool);
    let out = ctx.curr("count_out", Sort::Int);
    let zero = ctx.int_lit(0);
    let one = ctx.int_lit(1);
    let init = ctx.equal(out, zero);
    let out_next = ctx.next("count_out", Sort::Int);
    let inc = ctx.add(out, one);
    let next_val = ctx.ite(inp, inc, out);
    let trans = ctx.equal(out_next, next_val);
    loader.define_sys(TransitionSystem::new("count", sig, init, trans))?;

    let ctx = loader.ctx();
    let sig = StateSignature::new(
        ctx,
        "observer",
        &[("count_in", Sort::Bool), ("count_out", Sort::Int)],
    )?;
    let inp_next = ctx.next("count_in", Sort::Bool);
    let tru = ctx.tru();
    let incremented = ctx.equal(out_next, inc);
    let out_increment = ctx.implies(inp, incremented);
    let observer = TransitionSystem::new("observer", sig, tru, tru).with_instance(
        SubsystemInstance::new("count", vec![(inp, inp_next), (out, out_next)]),
    );
    loader.define_sys(observer)?;
    loader.define_prop("out_increment", "observer", out_increment)?;
    loader.verify("observer", &[])
}

fn accumulator(loader: &mut Loader) -> Result<()> {
    let ctx = loader.ctx();
    let sig = StateSignature::new(ctx, "acc", &[("x", Sort::Int), ("y", Sort::Int)])?;
    let x = ctx.curr("x", Sort::Int);
    let y = ctx.curr("y", Sort::Int);
    let x_next = ctx.next("x", Sort::Int);
    let y_next = ctx.next("y", Sort::Int);
    let zero = ctx.int_lit(0);
    let one = ctx.int_lit(1);
    let x_zero = ctx.equal(x, zero);
    let y_zero = ctx.equal(y, zero);
    let init = ctx.and(x_zero, y_zero);
    let x_inc = ctx.add(x, one);
    let x_trans = ctx.equal(x_next, x_inc);
    let y_acc = ctx.add(y, x);
    let y_trans = ctx.equal(y_next, y_acc);
    let trans = ctx.and(x_trans, y_trans);
    let p1 = ctx.greater_or_equal(x, zero);
    let p2 = ctx.greater_or_equal(y, zero);
    loader.define_sys(TransitionSystem::new("acc", sig, init, trans))?;
    loader.define_prop("p1", "acc", p1)?;
    loader.define_prop("p2", "acc", p2)?;
    loader.verify_with_depth("acc", &["p1", "p2"], Some(2))?;
    loader.verify_with_depth("acc", &["p2"], Some(2))
}
