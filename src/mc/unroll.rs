// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::elab::{FlattenedSystem, Property};
use crate::ir::*;
use crate::mc::oracle::{CheckResponse, Oracle, OracleResult};
use crate::mc::options::RelationPolicy;
use crate::mc::types::{Trace, UnknownReason, VerificationResult};
use std::collections::HashMap;
use std::ops::Range;

/// A predicate that needs to hold at every position of a path. Two-state predicates only need
/// to hold on transitions, i.e., at position `i` we require `T(s_i, s_i+1) => p(s_i, s_i+1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPredicate {
    pub id: String,
    pub term: ExprRef,
    /// What is asserted for a single position.
    pub at_position: ExprRef,
    pub two_state: bool,
}

impl StepPredicate {
    pub fn new(ctx: &mut Context, sys: &FlattenedSystem, prop: &Property) -> Self {
        let two_state = !prop.is_one_state(ctx);
        let at_position = if two_state {
            ctx.implies(sys.trans, prop.term)
        } else {
            prop.term
        };
        Self {
            id: prop.id.clone(),
            term: prop.term,
            at_position,
            two_state,
        }
    }

    /// Evaluates the predicate at position `step` of a trace. Two-state predicates require the
    /// trace to contain the following step.
    pub fn holds_in(&self, ctx: &Context, trace: &Trace, step: usize) -> Result<bool, EvalError> {
        let values = trace
            .values_at(step)
            .ok_or_else(|| EvalError::new(format!("trace has no step {step}")))?;
        let value = eval(ctx, self.at_position, &values)?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

/// Splits the requested properties and the relations of a system into the predicates that
/// need to be proven and the ones that may be assumed. A relation that is requested explicitly
/// is never assumed.
pub fn targets_and_assumptions(
    ctx: &mut Context,
    sys: &FlattenedSystem,
    properties: &[&Property],
    relations: &[&Property],
    policy: RelationPolicy,
) -> (Vec<StepPredicate>, Vec<StepPredicate>) {
    let mut targets: Vec<StepPredicate> = properties
        .iter()
        .map(|p| StepPredicate::new(ctx, sys, p))
        .collect();
    let mut assumptions = vec![];
    for rel in relations.iter() {
        if targets.iter().any(|t| t.id == rel.id) {
            continue;
        }
        let pred = StepPredicate::new(ctx, sys, rel);
        match policy {
            RelationPolicy::Trust => assumptions.push(pred),
            RelationPolicy::Discharge => targets.push(pred),
        }
    }
    (targets, assumptions)
}

/// The assertions of a single oracle query.
#[derive(Debug, Default, Clone)]
pub struct Query {
    assertions: Vec<(ExprRef, u64)>,
}

impl Query {
    /// States `0..=len` connected by `len` transitions.
    pub fn path(sys: &FlattenedSystem, len: u64, from_init: bool) -> Self {
        let mut query = Query::default();
        if from_init {
            query.assert(sys.init, 0);
        }
        for step in 0..len {
            query.assert(sys.trans, step);
        }
        query
    }

    pub fn assert(&mut self, expr: ExprRef, step: u64) {
        self.assertions.push((expr, step));
    }

    pub fn assume(&mut self, preds: &[StepPredicate], positions: Range<u64>) {
        for position in positions {
            for pred in preds.iter() {
                self.assert(pred.at_position, position);
            }
        }
    }

    /// Requires at least one of `preds` to be violated at `position`.
    pub fn violate(&mut self, ctx: &mut Context, preds: &[StepPredicate], position: u64) {
        let all = ctx.and_many(preds.iter().map(|p| p.at_position));
        let violated = ctx.not(all);
        self.assert(violated, position);
    }

    /// Opens a new scope, asserts the query and checks it. The caller needs to `pop` the scope
    /// once it is done with the model.
    pub fn check<O: Oracle + ?Sized>(
        &self,
        ctx: &Context,
        oracle: &mut O,
    ) -> OracleResult<CheckResponse> {
        oracle.push()?;
        for &(expr, step) in self.assertions.iter() {
            oracle.assert_at(ctx, expr, step)?;
        }
        oracle.check()
    }
}

/// Unrolls a flattened system under a fixed set of assumptions.
pub struct Unroller<'a> {
    pub sys: &'a FlattenedSystem,
    pub assumptions: Vec<StepPredicate>,
}

impl<'a> Unroller<'a> {
    /// Searches for a path of length `depth` from an initial state which violates one of `open`
    /// in its last position while satisfying all of them before. Returns the properties that
    /// are violated by the path that was found.
    pub fn base_check<O: Oracle + ?Sized>(
        &self,
        ctx: &mut Context,
        oracle: &mut O,
        open: &[StepPredicate],
        depth: u64,
    ) -> Result<Vec<(String, VerificationResult)>, UnknownReason> {
        let mut query = Query::path(self.sys, depth, true);
        query.assume(&self.assumptions, 0..depth + 1);
        query.assume(open, 0..depth);
        query.violate(ctx, open, depth);
        let falsified = match query.check(ctx, oracle).map_err(UnknownReason::from)? {
            CheckResponse::Unsat => Ok(vec![]),
            CheckResponse::Sat => self.falsified(ctx, oracle, open, depth),
            CheckResponse::Unknown(msg) => {
                tracing::warn!(system = %self.sys.name, depth, "base check: {msg}");
                Err(UnknownReason::OracleTimeout)
            }
        };
        oracle.pop().map_err(UnknownReason::from)?;
        falsified
    }

    /// Finds out which properties are violated by the model of the last base check.
    fn falsified<O: Oracle + ?Sized>(
        &self,
        ctx: &Context,
        oracle: &mut O,
        open: &[StepPredicate],
        depth: u64,
    ) -> Result<Vec<(String, VerificationResult)>, UnknownReason> {
        let lookahead = open.iter().any(|p| p.two_state) as u64;
        let trace = self
            .extract_trace(ctx, oracle, depth + 1 + lookahead)
            .map_err(UnknownReason::from)?;
        let mut falsified = vec![];
        for pred in open.iter() {
            match pred.holds_in(ctx, &trace, depth as usize) {
                Ok(true) => {}
                Ok(false) => {
                    let mut cex = trace.clone();
                    // the successor state only belongs to the counterexample of a two-state
                    // property, for which it is guaranteed to satisfy the transition predicate
                    let len = depth as usize + 1 + pred.two_state as usize;
                    cex.steps.truncate(len);
                    falsified.push((pred.id.clone(), VerificationResult::Disproven(cex)));
                }
                Err(e) => falsified.push((
                    pred.id.clone(),
                    VerificationResult::Unknown(UnknownReason::Evaluation(e.get_msg().to_string())),
                )),
            }
        }
        if falsified.is_empty() {
            // the model does not match our own semantics, give up on all properties to ensure
            // that the engine makes progress
            tracing::warn!(system = %self.sys.name, depth, "counterexample violates no property");
            let reason =
                UnknownReason::Evaluation("counterexample does not violate any property".into());
            falsified = open
                .iter()
                .map(|p| (p.id.clone(), VerificationResult::Unknown(reason.clone())))
                .collect();
        }
        Ok(falsified)
    }

    /// Reads states `0..num_states` from the oracle's model.
    pub fn extract_trace<O: Oracle + ?Sized>(
        &self,
        ctx: &Context,
        oracle: &mut O,
        num_states: u64,
    ) -> OracleResult<Trace> {
        let mut steps = Vec::with_capacity(num_states as usize);
        for step in 0..num_states {
            let values = self
                .sys
                .variables
                .iter()
                .map(|var| oracle.model_value(ctx, var, step))
                .collect::<OracleResult<Vec<_>>>()?;
            steps.push(values);
        }
        let mut symbols = HashMap::new();
        for symbol in ctx.symbols() {
            if let Some(name) = ctx.get(symbol).leaf_name() {
                symbols.insert(name, oracle.symbol_value(ctx, symbol)?);
            }
        }
        Ok(Trace {
            variables: self.sys.variables.clone(),
            steps,
            symbols,
        })
    }
}
