// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::elab::{FlattenedSystem, Property};
use crate::ir::*;
use crate::mc::kind::give_up;
use crate::mc::oracle::Oracle;
use crate::mc::options::RelationPolicy;
use crate::mc::types::{UnknownReason, VerificationResult};
use crate::mc::unroll::*;
use indexmap::IndexMap;
use tracing::info;

/// Bounded model checking: searches for counterexamples, but never proves a property.
pub struct Bmc<'a> {
    unroller: Unroller<'a>,
    targets: Vec<StepPredicate>,
}

impl<'a> Bmc<'a> {
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

    pub fn targets(&self) -> impl Iterator<Item = &str> + '_ {
        self.targets.iter().map(|t| t.id.as_str())
    }

    /// Checks all paths of up to `k_max` transitions.
    pub fn run<O: Oracle + ?Sized>(
        &self,
        ctx: &mut Context,
        oracle: &mut O,
        k_max: u64,
    ) -> IndexMap<String, VerificationResult> {
        let name = self.unroller.sys.name.as_str();
        let mut results = IndexMap::new();
        let mut open = self.targets.clone();
        'depths: for depth in 0..=k_max {
            while !open.is_empty() {
                info!(system = %name, depth, properties = open.len(), "bmc");
                match self.unroller.base_check(ctx, oracle, &open, depth) {
                    Ok(falsified) if falsified.is_empty() => continue 'depths,
                    Ok(falsified) => {
                        for (id, result) in falsified {
                            info!(system = %name, property = %id, depth, "{result}");
                            open.retain(|p| p.id != id);
                            results.insert(id, result);
                        }
                    }
                    Err(reason) => {
                        give_up(&mut results, &open, reason);
                        open.clear();
                    }
                }
            }
            break;
        }
        give_up(&mut results, &open, UnknownReason::DepthExhausted);
        self.targets
            .iter()
            .filter_map(|t| results.swap_remove(&t.id).map(|r| (t.id.clone(), r)))
            .collect()
    }
}
