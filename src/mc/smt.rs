// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::OracleError;
use crate::ir::*;
use crate::mc::oracle::{default_value, CheckResponse, Oracle, OracleResult};
use crate::smt::*;
use easy_smt as smt;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct SmtSolverCmd {
    pub name: &'static str,
    pub args: &'static [&'static str],
    pub logic: &'static str,
    /// Option used to limit the time of a single `check-sat` in milliseconds.
    pub timeout_option: Option<&'static str>,
}

pub const Z3_CMD: SmtSolverCmd = SmtSolverCmd {
    name: "z3",
    args: &["-smt2", "-in"],
    logic: "ALL",
    timeout_option: Some(":timeout"),
};

pub const CVC5_CMD: SmtSolverCmd = SmtSolverCmd {
    name: "cvc5",
    args: &["--incremental", "--lang", "smt2"],
    logic: "ALL",
    timeout_option: Some(":tlimit-per"),
};

pub const YICES2_CMD: SmtSolverCmd = SmtSolverCmd {
    name: "yices-smt2",
    args: &["--incremental"],
    logic: "QF_UFNIA",
    timeout_option: None,
};

#[derive(Debug, Clone, Default)]
pub struct SmtOracleOptions {
    /// If set, the communication with the SMT solver is logged into this file. Oracles that run
    /// concurrently need distinct files.
    pub replay_file: Option<PathBuf>,
    /// Time limit for a single satisfiability check.
    pub timeout: Option<Duration>,
}

/// A constant is either a state variable at a step or a rigid symbol.
type ConstKey = (StringRef, Option<u64>);

#[derive(Debug, Default)]
struct Scope {
    consts: HashSet<ConstKey>,
    funs: HashSet<FunRef>,
}

/// Oracle backed by an external SMT-LIB solver process.
pub struct SmtOracle {
    smt_ctx: smt::Context,
    solver: SmtSolverCmd,
    /// Declarations made in every open scope, the first entry is the base scope.
    scopes: Vec<Scope>,
}

impl SmtOracle {
    pub fn new(solver: SmtSolverCmd, opts: SmtOracleOptions) -> OracleResult<Self> {
        let replay_file = match &opts.replay_file {
            Some(path) => Some(std::fs::File::create(path)?),
            None => None,
        };
        let mut smt_ctx = easy_smt::ContextBuilder::new()
            .solver(solver.name, solver.args)
            .replay_file(replay_file)
            .build()?;
        smt_ctx.set_logic(solver.logic)?;
        if let (Some(option), Some(timeout)) = (solver.timeout_option, opts.timeout) {
            let ms = smt_ctx.numeral(timeout.as_millis() as u64);
            smt_ctx.set_option(option, ms)?;
        }
        Ok(Self {
            smt_ctx,
            solver,
            scopes: vec![Scope::default()],
        })
    }

    pub fn solver(&self) -> &SmtSolverCmd {
        &self.solver
    }

    fn is_const_declared(&self, key: &ConstKey) -> bool {
        self.scopes.iter().any(|s| s.consts.contains(key))
    }

    fn is_fun_defined(&self, fun: FunRef) -> bool {
        self.scopes.iter().any(|s| s.funs.contains(&fun))
    }

    fn declare_const(&mut self, ctx: &Context, key: ConstKey, sort: Sort) -> OracleResult<()> {
        if !self.is_const_declared(&key) {
            let tpe = convert_sort(&self.smt_ctx, sort);
            let name = const_name(ctx, key);
            self.smt_ctx.declare_const(escape_smt_identifier(&name), tpe)?;
            self.current_scope().consts.insert(key);
        }
        Ok(())
    }

    fn current_scope(&mut self) -> &mut Scope {
        // there is always at least the base scope
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Declares the symbols and variables of `expr` as well as all functions it calls.
    fn declare_leaves(&mut self, ctx: &Context, expr: ExprRef, step: u64) -> OracleResult<()> {
        for fun in collect_funs(ctx, expr) {
            self.define_fun(ctx, fun)?;
        }
        for leaf in collect_leaves(ctx, expr) {
            match ctx.get(leaf) {
                Expr::Var { name, sort, tag } => {
                    self.declare_const(ctx, (*name, Some(step + tag.offset())), *sort)?
                }
                Expr::Symbol { name, sort } => self.declare_const(ctx, (*name, None), *sort)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Requires all functions called in the body to be defined already.
    fn define_fun(&mut self, ctx: &Context, fun: FunRef) -> OracleResult<()> {
        if self.is_fun_defined(fun) {
            return Ok(());
        }
        let def = ctx.get_fun(fun);
        // function bodies may refer to rigid symbols
        for leaf in collect_leaves(ctx, def.body) {
            if let Expr::Symbol { name, sort } = ctx.get(leaf) {
                self.declare_const(ctx, (*name, None), *sort)?;
            }
        }
        let params = def
            .params
            .iter()
            .map(|p| {
                let name = ctx.get_str(ctx.get(*p).leaf_name().unwrap_or(def.name));
                let sort = p.get_type(ctx);
                (
                    escape_smt_identifier(name).into_owned(),
                    convert_sort(&self.smt_ctx, sort),
                )
            })
            .collect::<Vec<_>>();
        let body = convert_expr(&self.smt_ctx, ctx, def.body, &|_| None);
        let out = convert_sort(&self.smt_ctx, def.sort);
        let name = escape_smt_identifier(ctx.get_str(def.name)).into_owned();
        self.smt_ctx.define_fun(name, params, out, body)?;
        self.current_scope().funs.insert(fun);
        Ok(())
    }

    fn get_value(&mut self, ctx: &Context, key: ConstKey, sort: Sort) -> OracleResult<Value> {
        if !self.is_const_declared(&key) {
            return Ok(default_value(sort));
        }
        let name = const_name(ctx, key);
        let atom = self.smt_ctx.atom(escape_smt_identifier(&name));
        let values = self.smt_ctx.get_value(vec![atom])?;
        let smt_value = values
            .first()
            .map(|(_, v)| *v)
            .ok_or_else(|| OracleError::Resource(format!("no value for `{name}`")))?;
        parse_smt_value(&self.smt_ctx, smt_value, sort).ok_or_else(|| {
            OracleError::Resource(format!(
                "failed to parse value of `{name}`: {}",
                self.smt_ctx.display(smt_value)
            ))
        })
    }
}

impl Oracle for SmtOracle {
    fn assert_at(&mut self, ctx: &Context, expr: ExprRef, step: u64) -> OracleResult<()> {
        self.declare_leaves(ctx, expr, step)?;
        let smt_ctx = &self.smt_ctx;
        let leaf = |e: &Expr| -> Option<smt::SExpr> {
            match e {
                Expr::Var { name, tag, .. } => {
                    let name = name_at(ctx.get_str(*name), step + tag.offset());
                    Some(smt_ctx.atom(escape_smt_identifier(&name)))
                }
                _ => None,
            }
        };
        let term = convert_expr(smt_ctx, ctx, expr, &leaf);
        self.smt_ctx.assert(term)?;
        Ok(())
    }

    fn push(&mut self) -> OracleResult<()> {
        self.smt_ctx.push_many(1)?;
        self.scopes.push(Scope::default());
        Ok(())
    }

    fn pop(&mut self) -> OracleResult<()> {
        if self.scopes.len() < 2 {
            return Err(OracleError::Resource(
                "pop without a matching push".to_string(),
            ));
        }
        self.smt_ctx.pop_many(1)?;
        self.scopes.pop();
        Ok(())
    }

    fn check(&mut self) -> OracleResult<CheckResponse> {
        let response = match self.smt_ctx.check()? {
            smt::Response::Sat => CheckResponse::Sat,
            smt::Response::Unsat => CheckResponse::Unsat,
            smt::Response::Unknown => CheckResponse::Unknown(format!(
                "{} returned unknown",
                self.solver.name
            )),
        };
        Ok(response)
    }

    fn model_value(
        &mut self,
        ctx: &Context,
        var: &StateVariable,
        step: u64,
    ) -> OracleResult<Value> {
        self.get_value(ctx, (var.name, Some(step)), var.sort)
    }

    fn symbol_value(&mut self, ctx: &Context, symbol: ExprRef) -> OracleResult<Value> {
        match ctx.get(symbol) {
            Expr::Symbol { name, sort } => self.get_value(ctx, (*name, None), *sort),
            other => Err(OracleError::Resource(format!(
                "not a symbol: {}",
                other.serialize_to_str(ctx)
            ))),
        }
    }
}

fn const_name(ctx: &Context, (name, step): ConstKey) -> String {
    match step {
        Some(step) => name_at(ctx.get_str(name), step),
        None => ctx.get_str(name).to_string(),
    }
}

fn name_at(name: &str, step: u64) -> String {
    format!("{name}{STEP_SEPARATOR}{step}")
}
