// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::elab::*;
use crate::error::{Error, OracleError, Result};
use crate::ir::*;
use crate::mc::*;
use indexmap::IndexMap;
use tracing::info;

/// Exit code of a driver when loading a model fails.
pub const FATAL_EXIT_CODE: i32 = 2;

/// Processes the top-level forms of a model in order. Any error is fatal, since later forms
/// may depend on the one that failed.
#[derive(Default)]
pub struct Loader {
    ctx: Context,
    systems: SystemRegistry,
    flattener: Flattener,
    props: PropertyRegistry,
    requests: Vec<VerificationTask>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Used to build the terms of the forms.
    pub fn ctx(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// `params` need to be created with [`Context::param`].
    pub fn define_fun(
        &mut self,
        name: &str,
        params: Vec<ExprRef>,
        sort: Sort,
        body: ExprRef,
    ) -> Result<FunRef> {
        self.ctx.define_fun(name, &params, sort, body)
    }

    pub fn declare_fun(&mut self, name: &str, sort: Sort) -> Result<ExprRef> {
        self.ctx.declare_fun(name, sort)
    }

    pub fn define_sys(&mut self, system: TransitionSystem) -> Result<()> {
        self.systems.declare(&self.ctx, system)
    }

    pub fn define_prop(&mut self, id: &str, system: &str, term: ExprRef) -> Result<()> {
        self.define_property(id, system, PropertyKind::Safety, term)
    }

    pub fn define_rel(&mut self, id: &str, system: &str, term: ExprRef) -> Result<()> {
        self.define_property(id, system, PropertyKind::Relation, term)
    }

    fn define_property(
        &mut self,
        id: &str,
        system: &str,
        kind: PropertyKind,
        term: ExprRef,
    ) -> Result<()> {
        self.systems.lookup(system)?;
        // properties may refer to the renamed variables of subsystems
        let flat = self.flattener.flatten(&mut self.ctx, &self.systems, system)?;
        self.props.define(&self.ctx, flat, id, kind, term)
    }

    /// Requests the verification of `properties`. An empty list selects all safety properties
    /// of the system.
    pub fn verify(&mut self, system: &str, properties: &[&str]) -> Result<()> {
        self.verify_with_depth(system, properties, None)
    }

    pub fn verify_with_depth(
        &mut self,
        system: &str,
        properties: &[&str],
        k_max: Option<u64>,
    ) -> Result<()> {
        self.systems.lookup(system)?;
        let properties: Vec<String> = if properties.is_empty() {
            self.props
                .iter()
                .filter(|p| p.system == system && p.kind == PropertyKind::Safety)
                .map(|p| p.id.clone())
                .collect()
        } else {
            properties.iter().map(|p| p.to_string()).collect()
        };
        if properties.is_empty() {
            return Err(Error::declaration(system, "no properties to verify"));
        }
        for id in properties.iter() {
            let prop = self.props.lookup(id)?;
            if prop.system != system {
                return Err(Error::declaration(
                    id,
                    format!("property of `{}`, cannot be verified on `{system}`", prop.system),
                ));
            }
        }
        self.requests.push(VerificationTask {
            system: system.to_string(),
            properties,
            k_max,
        });
        Ok(())
    }

    /// Elaborates every system. No verification may start before this succeeded.
    pub fn finish(mut self) -> Result<Model> {
        self.flattener.flatten_all(&mut self.ctx, &self.systems)?;
        info!(
            systems = self.systems.len(),
            properties = self.props.len(),
            requests = self.requests.len(),
            "model loaded"
        );
        Ok(Model {
            ctx: self.ctx,
            systems: self.systems,
            flattener: self.flattener,
            props: self.props,
            requests: self.requests,
        })
    }
}

/// A completely elaborated model. It is never modified, which allows verification tasks to
/// share it across threads.
pub struct Model {
    ctx: Context,
    systems: SystemRegistry,
    flattener: Flattener,
    props: PropertyRegistry,
    requests: Vec<VerificationTask>,
}

/// Per property results of a verification request, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: VerificationTask,
    pub results: IndexMap<String, VerificationResult>,
}

impl Model {
    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    pub fn flattened(&self, system: &str) -> Option<&FlattenedSystem> {
        self.flattener.get(system)
    }

    pub fn properties(&self) -> &PropertyRegistry {
        &self.props
    }

    pub fn requests(&self) -> &[VerificationTask] {
        &self.requests
    }

    /// Runs all requests in order, each with a fresh oracle.
    pub fn run<O, F>(&self, make_oracle: F, options: &VerifyOptions) -> Result<Vec<TaskReport>>
    where
        O: Oracle,
        F: Fn(&VerifyOptions) -> OracleResult<O>,
    {
        self.requests
            .iter()
            .map(|task| self.verify(task, &make_oracle, options))
            .collect()
    }

    /// Runs all requests on separate threads.
    pub fn run_parallel<O, F>(
        &self,
        make_oracle: F,
        options: &VerifyOptions,
    ) -> Result<Vec<TaskReport>>
    where
        O: Oracle,
        F: Fn(&VerifyOptions) -> OracleResult<O> + Sync,
    {
        let make_oracle = &make_oracle;
        std::thread::scope(|s| {
            let handles: Vec<_> = self
                .requests
                .iter()
                .map(|task| s.spawn(move || self.verify(task, make_oracle, options)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(report) => report,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    /// Verifies a single request on a private copy of the term context. Oracle failures are
    /// reported as unknown results, errors are only returned for invalid requests.
    pub fn verify<O, F>(
        &self,
        task: &VerificationTask,
        make_oracle: F,
        options: &VerifyOptions,
    ) -> Result<TaskReport>
    where
        O: Oracle,
        F: FnOnce(&VerifyOptions) -> OracleResult<O>,
    {
        self.systems.lookup(&task.system)?;
        let sys = self
            .flattener
            .get(&task.system)
            .ok_or_else(|| Error::declaration(&task.system, "system was not elaborated"))?;
        let mut properties = Vec::with_capacity(task.properties.len());
        for id in task.properties.iter() {
            let prop = self.props.lookup(id)?;
            if prop.system != task.system {
                return Err(Error::declaration(
                    id,
                    format!("property of `{}`, not `{}`", prop.system, task.system),
                ));
            }
            properties.push(prop);
        }
        let relations: Vec<&Property> = self.props.relations_of(&task.system).collect();
        let k_max = task.k_max.unwrap_or(options.k_max);
        info!(system = %task.system, properties = ?task.properties, k_max, "verify");

        let mut ctx = self.ctx.clone();
        let results = match options.engine {
            Engine::KInduction => {
                let engine =
                    KInduction::new(&mut ctx, sys, &properties, &relations, options.relations);
                match make_oracle(options) {
                    Ok(mut oracle) => engine.run(&mut ctx, &mut oracle, k_max),
                    Err(e) => oracle_unavailable(engine.targets(), e),
                }
            }
            Engine::Bmc => {
                let engine = Bmc::new(&mut ctx, sys, &properties, &relations, options.relations);
                match make_oracle(options) {
                    Ok(mut oracle) => engine.run(&mut ctx, &mut oracle, k_max),
                    Err(e) => oracle_unavailable(engine.targets(), e),
                }
            }
        };
        for (id, result) in results.iter() {
            info!(system = %task.system, property = %id, "{result}");
        }
        Ok(TaskReport {
            task: task.clone(),
            results,
        })
    }
}

fn oracle_unavailable<'a>(
    targets: impl Iterator<Item = &'a str>,
    e: OracleError,
) -> IndexMap<String, VerificationResult> {
    tracing::warn!("failed to start oracle: {e}");
    let reason = UnknownReason::from(e);
    targets
        .map(|id| (id.to_string(), VerificationResult::Unknown(reason.clone())))
        .collect()
}

/// 0 if every property passed, 1 if any failed, and 3 if some are unknown but none failed.
pub fn exit_code(reports: &[TaskReport]) -> i32 {
    let results = || reports.iter().flat_map(|r| r.results.values());
    if results().any(|r| r.is_disproven()) {
        1
    } else if results().any(|r| r.is_unknown()) {
        3
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(loader: &mut Loader) {
        let ctx = loader.ctx();
        let sig = StateSignature::new(ctx, "counter", &[("in", Sort::Bool), ("out", Sort::Int)])
            .unwrap();
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
        loader
            .define_sys(TransitionSystem::new("counter", sig, init, trans))
            .unwrap();
    }

    #[test]
    fn verify_requests_are_validated() {
        let mut loader = Loader::new();
        counter(&mut loader);
        let out = loader.ctx().curr("out", Sort::Int);
        let zero = loader.ctx().int_lit(0);
        let nonneg = loader.ctx().greater_or_equal(out, zero);
        assert!(matches!(
            loader.define_prop("nonneg", "countr", nonneg),
            Err(Error::UnknownSystem { .. })
        ));
        loader.define_prop("nonneg", "counter", nonneg).unwrap();
        assert_eq!(
            loader.verify("counter", &["nneg"]).unwrap_err().to_string(),
            "declaration error in `nneg`: unknown property, did you mean: nonneg?"
        );
        loader.verify("counter", &[]).unwrap();
        loader.verify_with_depth("counter", &["nonneg"], Some(2)).unwrap();
        let model = loader.finish().unwrap();
        assert_eq!(model.requests().len(), 2);
        assert_eq!(model.requests()[0].properties, ["nonneg"]);
        assert_eq!(model.requests()[1].k_max, Some(2));
    }

    #[test]
    fn relations_are_not_selected_by_default() {
        let mut loader = Loader::new();
        counter(&mut loader);
        let out = loader.ctx().curr("out", Sort::Int);
        let out_next = loader.ctx().next("out", Sort::Int);
        let mono = loader.ctx().greater_or_equal(out_next, out);
        loader.define_rel("mono", "counter", mono).unwrap();
        let err = loader.verify("counter", &[]).unwrap_err();
        assert!(matches!(err, Error::Declaration { .. }), "{err}");
        // but they can be requested explicitly
        loader.verify("counter", &["mono"]).unwrap();
    }

    #[test]
    fn exit_codes() {
        let task = VerificationTask {
            system: "s".to_string(),
            properties: vec![],
            k_max: None,
        };
        let report = |results: Vec<VerificationResult>| TaskReport {
            task: task.clone(),
            results: results
                .into_iter()
                .enumerate()
                .map(|(ii, r)| (format!("p{ii}"), r))
                .collect(),
        };
        let pass = report(vec![VerificationResult::Proven(1)]);
        let unknown = report(vec![VerificationResult::Unknown(UnknownReason::DepthExhausted)]);
        let fail = report(vec![VerificationResult::Disproven(Trace {
            variables: vec![],
            steps: vec![],
            symbols: Default::default(),
        })]);
        assert_eq!(exit_code(&[]), 0);
        assert_eq!(exit_code(&[pass.clone()]), 0);
        assert_eq!(exit_code(&[pass.clone(), unknown.clone()]), 3);
        assert_eq!(exit_code(&[unknown, fail, pass]), 1);
    }
}
