// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

#![allow(dead_code)]

use kinduct::ir::*;
use kinduct::mc::{CheckResponse, Oracle, OracleResult};
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;
use std::rc::Rc;

type Key = (StringRef, Option<u64>);

/// Decides queries by trying every assignment, with integers restricted to a small domain.
/// Only meant for tiny systems where the restriction does not change the answer.
pub struct EnumOracle {
    int_domain: RangeInclusive<i64>,
    scopes: Vec<Vec<(ExprRef, u64)>>,
    model: HashMap<Key, Value>,
    checks: Rc<Cell<usize>>,
    /// Copy of the caller's context, needed to find the unknowns of a query.
    ctx: Option<Context>,
}

const MAX_ASSIGNMENTS: usize = 1 << 20;

impl EnumOracle {
    pub fn new(int_domain: RangeInclusive<i64>) -> Self {
        Self::with_counter(int_domain, Rc::new(Cell::new(0)))
    }

    /// All oracles sharing a counter count their checks together.
    pub fn with_counter(int_domain: RangeInclusive<i64>, checks: Rc<Cell<usize>>) -> Self {
        Self {
            int_domain,
            scopes: vec![vec![]],
            model: HashMap::new(),
            checks,
            ctx: None,
        }
    }

    fn unknowns(&self, ctx: &Context) -> Vec<(Key, Sort)> {
        let mut out: Vec<(Key, Sort)> = vec![];
        for &(expr, step) in self.scopes.iter().flatten() {
            let mut roots = vec![expr];
            roots.extend(collect_funs(ctx, expr).into_iter().map(|f| ctx.get_fun(f).body));
            for root in roots {
                for leaf in collect_leaves(ctx, root) {
                    let entry = match ctx.get(leaf) {
                        Expr::Var { name, sort, tag } => ((*name, Some(step + tag.offset())), *sort),
                        Expr::Symbol { name, sort } => ((*name, None), *sort),
                        _ => continue,
                    };
                    if !out.iter().any(|(k, _)| *k == entry.0) {
                        out.push(entry);
                    }
                }
            }
        }
        out
    }

    fn domain(&self, sort: Sort) -> Vec<Value> {
        match sort {
            Sort::Bool => vec![Value::Bool(false), Value::Bool(true)],
            Sort::Int => self.int_domain.clone().map(Value::Int).collect(),
        }
    }

    fn satisfies(&self, ctx: &Context, values: &HashMap<Key, Value>) -> bool {
        self.scopes.iter().flatten().all(|&(expr, step)| {
            matches!(
                eval(ctx, expr, &AtStep { values, step }),
                Ok(Value::Bool(true))
            )
        })
    }
}

struct AtStep<'a> {
    values: &'a HashMap<Key, Value>,
    step: u64,
}

impl<'a> GetExprValue for AtStep<'a> {
    fn get_value(&self, _ctx: &Context, leaf: &Expr) -> Option<Value> {
        match leaf {
            Expr::Var { name, tag, .. } => self
                .values
                .get(&(*name, Some(self.step + tag.offset())))
                .copied(),
            Expr::Symbol { name, .. } => self.values.get(&(*name, None)).copied(),
            _ => None,
        }
    }
}

impl Oracle for EnumOracle {
    fn assert_at(&mut self, ctx: &Context, expr: ExprRef, step: u64) -> OracleResult<()> {
        let stale = self
            .ctx
            .as_ref()
            .map_or(true, |c| c.num_exprs() != ctx.num_exprs());
        if stale {
            self.ctx = Some(ctx.clone());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((expr, step));
        }
        Ok(())
    }

    fn push(&mut self) -> OracleResult<()> {
        self.scopes.push(vec![]);
        Ok(())
    }

    fn pop(&mut self) -> OracleResult<()> {
        assert!(self.scopes.len() > 1, "unbalanced pop");
        self.scopes.pop();
        Ok(())
    }

    fn check(&mut self) -> OracleResult<CheckResponse> {
        self.checks.set(self.checks.get() + 1);
        let ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            // nothing was asserted
            None => return Ok(CheckResponse::Sat),
        };
        let unknowns = self.unknowns(&ctx);
        let domains: Vec<Vec<Value>> = unknowns.iter().map(|(_, s)| self.domain(*s)).collect();
        let total = domains
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(d.len()));
        if total.map_or(true, |t| t > MAX_ASSIGNMENTS) {
            self.ctx = Some(ctx);
            return Ok(CheckResponse::Unknown("too many assignments".to_string()));
        }

        // odometer over all assignments
        let mut digits = vec![0usize; unknowns.len()];
        loop {
            let values: HashMap<Key, Value> = unknowns
                .iter()
                .zip(digits.iter())
                .zip(domains.iter())
                .map(|(((key, _), &d), domain)| (*key, domain[d]))
                .collect();
            if self.satisfies(&ctx, &values) {
                self.model = values;
                self.ctx = Some(ctx);
                return Ok(CheckResponse::Sat);
            }
            let mut pos = 0;
            loop {
                if pos == digits.len() {
                    self.ctx = Some(ctx);
                    return Ok(CheckResponse::Unsat);
                }
                digits[pos] += 1;
                if digits[pos] < domains[pos].len() {
                    break;
                }
                digits[pos] = 0;
                pos += 1;
            }
        }
    }

    fn model_value(
        &mut self,
        _ctx: &Context,
        var: &StateVariable,
        step: u64,
    ) -> OracleResult<Value> {
        Ok(self
            .model
            .get(&(var.name, Some(step)))
            .copied()
            .unwrap_or(match var.sort {
                Sort::Bool => Value::Bool(false),
                Sort::Int => Value::Int(0),
            }))
    }

    fn symbol_value(&mut self, ctx: &Context, symbol: ExprRef) -> OracleResult<Value> {
        let (name, sort) = match ctx.get(symbol) {
            Expr::Symbol { name, sort } => (*name, *sort),
            _ => return Ok(Value::Bool(false)),
        };
        Ok(self.model.get(&(name, None)).copied().unwrap_or(match sort {
            Sort::Bool => Value::Bool(false),
            Sort::Int => Value::Int(0),
        }))
    }
}


/// Answers checks from a script and takes model values from a closure over the variable name
/// and step. Only useful when the order of queries is known.
pub struct ScriptedOracle {
    answers: VecDeque<CheckResponse>,
    values: Box<dyn Fn(&str, u64) -> Value>,
    depth: usize,
    checks: Rc<Cell<usize>>,
}

impl ScriptedOracle {
    pub fn new(
        answers: impl IntoIterator<Item = CheckResponse>,
        values: impl Fn(&str, u64) -> Value + 'static,
    ) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            values: Box::new(values),
            depth: 0,
            checks: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_counter(mut self, checks: Rc<Cell<usize>>) -> Self {
        self.checks = checks;
        self
    }
}

impl Drop for ScriptedOracle {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert_eq!(self.depth, 0, "scopes left open");
        }
    }
}

impl Oracle for ScriptedOracle {
    fn assert_at(&mut self, _ctx: &Context, _expr: ExprRef, _step: u64) -> OracleResult<()> {
        Ok(())
    }

    fn push(&mut self) -> OracleResult<()> {
        self.depth += 1;
        Ok(())
    }

    fn pop(&mut self) -> OracleResult<()> {
        assert!(self.depth > 0, "unbalanced pop");
        self.depth -= 1;
        Ok(())
    }

    fn check(&mut self) -> OracleResult<CheckResponse> {
        self.checks.set(self.checks.get() + 1);
        Ok(self
            .answers
            .pop_front()
            .unwrap_or(CheckResponse::Unknown("script exhausted".to_string())))
    }

    fn model_value(
        &mut self,
        ctx: &Context,
        var: &StateVariable,
        step: u64,
    ) -> OracleResult<Value> {
        Ok((self.values)(ctx.get_str(var.name), step))
    }

    fn symbol_value(&mut self, _ctx: &Context, _symbol: ExprRef) -> OracleResult<Value> {
        Ok(Value::Int(0))
    }
}

/// `out` counts the steps in which `in` is set, starting with `in` itself.
pub fn define_counter(ctx: &mut Context) -> TransitionSystem {
    let sig =
        StateSignature::new(ctx, "counter", &[("in", Sort::Bool), ("out", Sort::Int)]).unwrap();
    let inp = ctx.curr("in", Sort::Bool);
    let out = ctx.curr("out", Sort::Int);
    let zero = ctx.int_lit(0);
    let one = ctx.int_lit(1);
    let init_val = ctx.ite(inp, one, zero);
    let init = ctx.equal(out, init_val);
    let inp_next = ctx.next("in", Sort::Bool);
    let out_next = ctx.next("out", Sort::Int);
    let inc = ctx.add(out, one);
    let next_val = ctx.ite(inp_next, inc, out);
    let trans = ctx.equal(out_next, next_val);
    TransitionSystem::new("counter", sig, init, trans)
}
