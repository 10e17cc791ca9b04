// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::elab::{FlattenedSystem, Property};
use crate::ir::*;
use crate::mc::oracle::{CheckResponse, Oracle};
use crate::mc::options::RelationPolicy;
use crate::mc::types::{UnknownReason, VerificationResult};
use crate::mc::unroll::*;
use indexmap::IndexMap;
use tracing::{info, warn};

/// Proves invariants by k-induction. All properties are proven together, which allows them to
/// serve as each other's induction hypothesis.
pub struct KInduction<'a> {
    unroller: Unroller<'a>,
    targets: Vec<StepPredicate>,
}

impl<'a> KInduction<'a> {
    pub fn new(
        ctx: &mut Context,
        sys: &'a FlattenedSystem,
        properties: &[&Property],
        relations: &[&Property],
        policy: RelationPolicy,
    ) -> Self {
        let (targets, assumptions) =
            targets_and_assumptions(ctx, sys, properties, relations, policy);
        Self {
            unroller: Unroller { sys, assumptions },
            targets,
        }
    }

    /// Ids of all properties that are going to be proven, including relations that need to be
    /// discharged.
    pub fn targets(&self) -> impl Iterator<Item = &str> + '_ {
        self.targets.iter().map(|t| t.id.as_str())
    }

    /// Returns a result for every target. Oracle failures only affect the properties that are
    /// still open when they occur.
    pub fn run<O: Oracle + ?Sized>(
        &self,
        ctx: &mut Context,
        oracle: &mut O,
        k_max: u64,
    ) -> IndexMap<String, VerificationResult> {
        let name = self.unroller.sys.name.as_str();
        let mut results = IndexMap::new();
        let mut open = self.targets.clone();

        // the initial states are always checked, even without any induction depth
        for depth in 0..k_max.max(1) {
            // no property may be violated in the first `depth + 1` states
            while !open.is_empty() {
                info!(system = %name, depth, properties = open.len(), "base check");
                match self.unroller.base_check(ctx, oracle, &open, depth) {
                    Ok(falsified) if falsified.is_empty() => break,
                    Ok(falsified) => {
                        for (id, result) in falsified {
                            info!(system = %name, property = %id, depth, "{result}");
                            open.retain(|p| p.id != id);
                            results.insert(id, result);
                        }
                    }
                    Err(reason) => {
                        give_up(&mut results, &open, reason);
                        return self.in_order(results);
                    }
                }
            }
            if open.is_empty() {
                return self.in_order(results);
            }

            let k = depth + 1;
            if k > k_max {
                break;
            }
            info!(system = %name, k, properties = open.len(), "inductive check");
            match self.inductive_check(ctx, oracle, &open, k) {
                Ok(true) => {
                    info!(system = %name, k, "combined properties are inductive");
                    self.certify(ctx, oracle, &open, k, &mut results);
                    return self.in_order(results);
                }
                Ok(false) => {}
                Err(reason) => {
                    give_up(&mut results, &open, reason);
                    return self.in_order(results);
                }
            }
        }

        give_up(&mut results, &open, UnknownReason::DepthExhausted);
        self.in_order(results)
    }

    /// Is `open` preserved by every path of `k` transitions on which it holds for the first
    /// `k` states?
    fn inductive_check<O: Oracle + ?Sized>(
        &self,
        ctx: &mut Context,
        oracle: &mut O,
        open: &[StepPredicate],
        k: u64,
    ) -> Result<bool, UnknownReason> {
        let query = self.step_query(ctx, open, open, k);
        let response = query.check(ctx, oracle).map_err(UnknownReason::from)?;
        oracle.pop().map_err(UnknownReason::from)?;
        match response {
            CheckResponse::Unsat => Ok(true),
            CheckResponse::Sat => Ok(false),
            CheckResponse::Unknown(msg) => {
                warn!(system = %self.unroller.sys.name, k, "inductive check: {msg}");
                Err(UnknownReason::OracleTimeout)
            }
        }
    }

    fn step_query(
        &self,
        ctx: &mut Context,
        hypothesis: &[StepPredicate],
        goal: &[StepPredicate],
        k: u64,
    ) -> Query {
        let mut query = Query::path(self.unroller.sys, k, false);
        query.assume(&self.unroller.assumptions, 0..k + 1);
        query.assume(hypothesis, 0..k);
        query.violate(ctx, goal, k);
        query
    }

    /// Re-establishes every property of a combined proof on its own, with the other properties
    /// as induction hypothesis.
    fn certify<O: Oracle + ?Sized>(
        &self,
        ctx: &mut Context,
        oracle: &mut O,
        open: &[StepPredicate],
        k: u64,
        results: &mut IndexMap<String, VerificationResult>,
    ) {
        if let [single] = open {
            results.insert(single.id.clone(), VerificationResult::Proven(k));
            return;
        }
        for (ii, pred) in open.iter().enumerate() {
            let query = self.step_query(ctx, open, std::slice::from_ref(pred), k);
            let response = query.check(ctx, oracle).and_then(|r| {
                oracle.pop()?;
                Ok(r)
            });
            let result = match response {
                Ok(CheckResponse::Unsat) => VerificationResult::Proven(k),
                Ok(CheckResponse::Sat) => {
                    warn!(system = %self.unroller.sys.name, property = %pred.id, k, "not certified");
                    VerificationResult::Unknown(UnknownReason::NotCertified)
                }
                Ok(CheckResponse::Unknown(msg)) => {
                    warn!(system = %self.unroller.sys.name, property = %pred.id, k, "certification: {msg}");
                    VerificationResult::Unknown(UnknownReason::OracleTimeout)
                }
                Err(e) => {
                    // the oracle is unusable from here on
                    give_up(results, &open[ii..], e.into());
                    return;
                }
            };
            results.insert(pred.id.clone(), result);
        }
    }

    fn in_order(
        &self,
        mut results: IndexMap<String, VerificationResult>,
    ) -> IndexMap<String, VerificationResult> {
        self.targets
            .iter()
            .filter_map(|t| results.swap_remove(&t.id).map(|r| (t.id.clone(), r)))
            .collect()
    }
}

pub(crate) fn give_up(
    results: &mut IndexMap<String, VerificationResult>,
    open: &[StepPredicate],
    reason: UnknownReason,
) {
    for pred in open.iter() {
        results.insert(
            pred.id.clone(),
            VerificationResult::Unknown(reason.clone()),
        );
    }
}
