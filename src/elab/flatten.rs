// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::elab::SystemRegistry;
use crate::error::{Error, Result};
use crate::ir::*;
use indexmap::IndexMap;

/// A system without any composition. `variables` starts with the system's own signature and
/// locals, followed by the renamed internal variables of all (transitively) instantiated
/// subsystems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedSystem {
    pub name: String,
    pub variables: Vec<StateVariable>,
    pub init: ExprRef,
    pub trans: ExprRef,
}

impl FlattenedSystem {
    pub fn find_var(&self, name: StringRef) -> Option<&StateVariable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

impl SerializableIrNode for FlattenedSystem {
    fn serialize<W: std::io::Write>(&self, ctx: &Context, writer: &mut W) -> std::io::Result<()> {
        serialize_flat_system(ctx, &self.name, &self.variables, self.init, self.trans, writer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Orders the systems reachable from `roots` such that every subsystem comes before the
/// systems that instantiate it. Fails if a system (transitively) instantiates itself.
pub fn topological_order<'a>(
    graph: &IndexMap<&'a str, Vec<&'a str>>,
    roots: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<&'a str>> {
    let mut marks: IndexMap<&'a str, Mark> = IndexMap::new();
    let mut order = vec![];
    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        // iterative DFS, each stack entry remembers how many children were visited
        let mut stack: Vec<(&'a str, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::Visiting);
        while let Some((node, next_child)) = stack.pop() {
            let children = graph.get(node).map(|c| c.as_slice()).unwrap_or(&[]);
            if let Some(&child) = children.get(next_child) {
                stack.push((node, next_child + 1));
                match marks.get(child) {
                    Some(Mark::Done) => {}
                    Some(Mark::Visiting) => {
                        let start = stack
                            .iter()
                            .position(|(n, _)| *n == child)
                            .unwrap_or_default();
                        let mut path: Vec<String> =
                            stack[start..].iter().map(|(n, _)| n.to_string()).collect();
                        path.push(child.to_string());
                        return Err(Error::CompositionCycle { path });
                    }
                    None => {
                        marks.insert(child, Mark::Visiting);
                        stack.push((child, 0));
                    }
                }
            } else {
                marks.insert(node, Mark::Done);
                order.push(node);
            }
        }
    }
    Ok(order)
}

/// Memoizes the flattened version of every system.
#[derive(Debug, Default, Clone)]
pub struct Flattener {
    arena: IndexMap<String, FlattenedSystem>,
}

impl Flattener {
    pub fn get(&self, id: &str) -> Option<&FlattenedSystem> {
        self.arena.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlattenedSystem> + '_ {
        self.arena.values()
    }

    /// Returns the flattened version of `id`, computing it and all its subsystems if needed.
    pub fn flatten(
        &mut self,
        ctx: &mut Context,
        registry: &SystemRegistry,
        id: &str,
    ) -> Result<&FlattenedSystem> {
        if !self.arena.contains_key(id) {
            registry.lookup(id)?;
            let graph = registry.composition_graph();
            let order = topological_order(&graph, [id])?;
            for name in order {
                if !self.arena.contains_key(name) {
                    let flat = self.flatten_one(ctx, registry, registry.lookup(name)?)?;
                    tracing::debug!(
                        "flattened `{}` into {} state variables",
                        name,
                        flat.variables.len()
                    );
                    self.arena.insert(name.to_string(), flat);
                }
            }
        }
        self.arena.get(id).ok_or_else(|| Error::UnknownSystem {
            id: id.to_string(),
            suggestions: vec![],
        })
    }

    /// Flattens every declared system. Cycles are reported before anything is flattened.
    pub fn flatten_all(&mut self, ctx: &mut Context, registry: &SystemRegistry) -> Result<()> {
        let graph = registry.composition_graph();
        topological_order(&graph, registry.names())?;
        for name in registry.names() {
            self.flatten(ctx, registry, name)?;
        }
        Ok(())
    }

    /// Requires all subsystems of `sys` to be flattened already.
    fn flatten_one(
        &self,
        ctx: &mut Context,
        registry: &SystemRegistry,
        sys: &TransitionSystem,
    ) -> Result<FlattenedSystem> {
        let mut variables: Vec<StateVariable> = sys.variables().copied().collect();
        let mut inits = vec![sys.init];
        let mut transs = vec![sys.trans];

        for (position, inst) in sys.composition.iter().enumerate() {
            let label = inst.label(position);
            let child = self
                .arena
                .get(&inst.system)
                .ok_or_else(|| Error::declaration(&sys.name, format!("`{label}` is unresolved")))?;
            let formals = &registry.lookup(&inst.system)?.signature;

            if inst.args.len() != formals.len() {
                return Err(Error::arity(
                    &sys.name,
                    format!(
                        "`{label}` expects {} arguments, got {}",
                        formals.len(),
                        inst.args.len()
                    ),
                ));
            }

            let mut subst = VarSubstitution::new();
            for (formal, &(curr, next)) in formals.iter().zip(inst.args.iter()) {
                for actual in [curr, next] {
                    let sort = actual.get_type(ctx);
                    if sort != formal.sort {
                        return Err(Error::tpe(
                            &sys.name,
                            format!(
                                "argument `{}` of `{label}` is of sort {}, but `{}` is {sort}",
                                ctx.get_str(formal.name),
                                formal.sort,
                                actual.serialize_to_str(ctx),
                            ),
                        ));
                    }
                }
                subst.insert((formal.name, StateTag::Curr), curr);
                subst.insert((formal.name, StateTag::Next), next);
            }

            for internal in child.variables[formals.len()..].iter() {
                let qualified = format!("{label}.{}", ctx.get_str(internal.name));
                let name = ctx.string(qualified.as_str().into());
                if variables.iter().any(|v| v.name == name) {
                    return Err(Error::declaration(
                        &sys.name,
                        format!("renamed variable `{qualified}` collides with an existing one"),
                    ));
                }
                variables.push(StateVariable {
                    name,
                    sort: internal.sort,
                });
                let curr = ctx.curr(&qualified, internal.sort);
                let next = ctx.next(&qualified, internal.sort);
                subst.insert((internal.name, StateTag::Curr), curr);
                subst.insert((internal.name, StateTag::Next), next);
            }

            let substituted = substitute(ctx, &[child.init, child.trans], &subst);
            inits.push(substituted[0]);
            transs.push(substituted[1]);
        }

        let init = ctx.and_many(inits);
        let trans = ctx.and_many(transs);
        Ok(FlattenedSystem {
            name: sys.name.clone(),
            variables,
            init,
            trans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `count` increments `count_out` whenever `count_in` is set and tracks the number of
    /// steps in a local variable. `top` exposes both interface variables of one instance.
    fn count_and_top(ctx: &mut Context, reg: &mut SystemRegistry) {
        let sig = StateSignature::new(
            ctx,
            "count",
            &[("count_in", Sort::Bool), ("count_out", Sort::Int)],
        )
        .unwrap();
        let locals = StateSignature::new(ctx, "count", &[("steps", Sort::Int)]).unwrap();
        let out = ctx.curr("count_out", Sort::Int);
        let steps = ctx.curr("steps", Sort::Int);
        let zero = ctx.int_lit(0);
        let one = ctx.int_lit(1);
        let init_out = ctx.equal(out, zero);
        let init_steps = ctx.equal(steps, zero);
        let init = ctx.and(init_out, init_steps);
        let inp_next = ctx.next("count_in", Sort::Bool);
        let out_next = ctx.next("count_out", Sort::Int);
        let inc = ctx.add(out, one);
        let next_val = ctx.ite(inp_next, inc, out);
        let trans_out = ctx.equal(out_next, next_val);
        let steps_next = ctx.next("steps", Sort::Int);
        let steps_inc = ctx.add(steps, one);
        let trans_steps = ctx.equal(steps_next, steps_inc);
        let trans = ctx.and(trans_out, trans_steps);
        let count = TransitionSystem::new("count", sig, init, trans).with_locals(locals);
        reg.declare(ctx, count).unwrap();

        let sig = StateSignature::new(ctx, "top", &[("a", Sort::Bool), ("b", Sort::Int)]).unwrap();
        let a = ctx.curr("a", Sort::Bool);
        let a_next = ctx.next("a", Sort::Bool);
        let b = ctx.curr("b", Sort::Int);
        let b_next = ctx.next("b", Sort::Int);
        let tru = ctx.tru();
        let top = TransitionSystem::new("top", sig, tru, tru)
            .with_instance(SubsystemInstance::new("count", vec![(a, a_next), (b, b_next)]));
        reg.declare(ctx, top).unwrap();
    }

    fn var_names(ctx: &Context, flat: &FlattenedSystem) -> Vec<String> {
        flat.variables
            .iter()
            .map(|v| ctx.get_str(v.name).to_string())
            .collect()
    }

    #[test]
    fn flatten_substitutes_formals_and_renames_locals() {
        let mut ctx = Context::default();
        let mut reg = SystemRegistry::default();
        count_and_top(&mut ctx, &mut reg);
        let mut flattener = Flattener::default();
        let flat = flattener.flatten(&mut ctx, &reg, "top").unwrap().clone();
        assert_eq!(var_names(&ctx, &flat), ["a", "b", "count#0.steps"]);
        insta::assert_snapshot!(flat.serialize_to_str(&ctx), @r###"
        (define-sys top ((a Bool) (b Int) (count#0.steps Int))
          (and (= (curr b) 0) (= (curr count#0.steps) 0))
          (and (= (next b) (ite (next a) (+ (curr b) 1) (curr b))) (= (next count#0.steps) (+ (curr count#0.steps) 1)))
          ())
        "###);
        // the subsystem was flattened along the way
        let count = flattener.get("count").unwrap();
        assert_eq!(var_names(&ctx, count), ["count_in", "count_out", "steps"]);
    }

    #[test]
    fn flatten_nested_prefixes() {
        let mut ctx = Context::default();
        let mut reg = SystemRegistry::default();
        count_and_top(&mut ctx, &mut reg);
        // `outer` instantiates `top` twice, labels are unique per position
        let sig = StateSignature::new(&mut ctx, "outer", &[("x", Sort::Bool), ("y", Sort::Int)])
            .unwrap();
        let x = ctx.curr("x", Sort::Bool);
        let x_next = ctx.next("x", Sort::Bool);
        let y = ctx.curr("y", Sort::Int);
        let y_next = ctx.next("y", Sort::Int);
        let tru = ctx.tru();
        let outer = TransitionSystem::new("outer", sig, tru, tru)
            .with_instance(SubsystemInstance::new("top", vec![(x, x_next), (y, y_next)]))
            .with_instance(SubsystemInstance::new("top", vec![(x, x_next), (y, y_next)]));
        reg.declare(&ctx, outer).unwrap();
        let mut flattener = Flattener::default();
        let flat = flattener.flatten(&mut ctx, &reg, "outer").unwrap().clone();
        assert_eq!(
            var_names(&ctx, &flat),
            ["x", "y", "top#0.count#0.steps", "top#1.count#0.steps"]
        );
    }

    #[test]
    fn flatten_checks_arity_and_sorts() {
        let mut ctx = Context::default();
        let mut reg = SystemRegistry::default();
        count_and_top(&mut ctx, &mut reg);
        let tru = ctx.tru();

        // `wrap` binds only one of the two interface variables of `top`
        let sig = StateSignature::new(&mut ctx, "wrap", &[("go", Sort::Bool)]).unwrap();
        let go = ctx.curr("go", Sort::Bool);
        let go_next = ctx.next("go", Sort::Bool);
        let wrap = TransitionSystem::new("wrap", sig, tru, tru)
            .with_instance(SubsystemInstance::new("top", vec![(go, go_next)]));
        // a wrong number of arguments is only detected during flattening
        reg.declare(&ctx, wrap).unwrap();
        let mut flattener = Flattener::default();
        let err = flattener.flatten(&mut ctx, &reg, "wrap").unwrap_err();
        assert_eq!(
            err.to_string(),
            "arity error in `wrap`: `top#0` expects 2 arguments, got 1"
        );

        // `swap` binds the interface variables in the wrong order
        let sig = StateSignature::new(&mut ctx, "swap", &[("i", Sort::Int), ("b", Sort::Bool)])
            .unwrap();
        let i = ctx.curr("i", Sort::Int);
        let i_next = ctx.next("i", Sort::Int);
        let b = ctx.curr("b", Sort::Bool);
        let b_next = ctx.next("b", Sort::Bool);
        let swap = TransitionSystem::new("swap", sig, tru, tru)
            .with_instance(SubsystemInstance::new("top", vec![(i, i_next), (b, b_next)]));
        reg.declare(&ctx, swap).unwrap();
        let err = flattener.flatten(&mut ctx, &reg, "swap").unwrap_err();
        assert!(matches!(err, Error::Type { .. }), "{err}");
        assert!(flattener.get("swap").is_none());
    }

    #[test]
    fn flatten_detects_name_collisions() {
        let mut ctx = Context::default();
        let mut reg = SystemRegistry::default();
        count_and_top(&mut ctx, &mut reg);
        let sig = StateSignature::new(&mut ctx, "clash", &[("a", Sort::Bool), ("b", Sort::Int)])
            .unwrap();
        let locals = StateSignature::new(&mut ctx, "clash", &[("count#0.steps", Sort::Int)])
            .unwrap();
        let a = ctx.curr("a", Sort::Bool);
        let a_next = ctx.next("a", Sort::Bool);
        let b = ctx.curr("b", Sort::Int);
        let b_next = ctx.next("b", Sort::Int);
        let tru = ctx.tru();
        let clash = TransitionSystem::new("clash", sig, tru, tru)
            .with_locals(locals)
            .with_instance(SubsystemInstance::new("count", vec![(a, a_next), (b, b_next)]));
        reg.declare(&ctx, clash).unwrap();
        let err = Flattener::default()
            .flatten(&mut ctx, &reg, "clash")
            .unwrap_err();
        assert!(matches!(err, Error::Declaration { .. }), "{err}");
    }

    #[test]
    fn flatten_is_idempotent() {
        let mut ctx = Context::default();
        let mut reg = SystemRegistry::default();
        count_and_top(&mut ctx, &mut reg);
        let first = Flattener::default()
            .flatten(&mut ctx, &reg, "top")
            .unwrap()
            .clone();
        let num_exprs = ctx.num_exprs();
        let second = Flattener::default()
            .flatten(&mut ctx, &reg, "top")
            .unwrap()
            .clone();
        assert_eq!(first, second);
        // hash consing: no new terms were created the second time around
        assert_eq!(num_exprs, ctx.num_exprs());
    }

    #[test]
    fn topological_order_detects_cycles() {
        let graph: IndexMap<&str, Vec<&str>> = IndexMap::from_iter([
            ("a", vec!["b"]),
            ("b", vec!["c"]),
            ("c", vec!["a"]),
            ("d", vec![]),
        ]);
        let err = topological_order(&graph, ["d", "a"]).unwrap_err();
        assert_eq!(err.to_string(), "composition cycle: a -> b -> c -> a");

        let graph: IndexMap<&str, Vec<&str>> = IndexMap::from_iter([
            ("top", vec!["mid", "leaf"]),
            ("mid", vec!["leaf"]),
            ("leaf", vec![]),
        ]);
        assert_eq!(
            topological_order(&graph, ["top"]).unwrap(),
            vec!["leaf", "mid", "top"]
        );
    }

    #[test]
    fn self_instantiation_is_a_cycle() {
        let mut ctx = Context::default();
        let mut reg = SystemRegistry::default();
        let sig = StateSignature::new(&mut ctx, "loop", &[]).unwrap();
        let tru = ctx.tru();
        let sys = TransitionSystem::new("loop", sig, tru, tru)
            .with_instance(SubsystemInstance::new("loop", vec![]));
        reg.declare(&ctx, sys).unwrap();
        let mut flattener = Flattener::default();
        let err = flattener.flatten_all(&mut ctx, &reg).unwrap_err();
        assert_eq!(err.to_string(), "composition cycle: loop -> loop");
        assert!(flattener.get("loop").is_none());
    }
}
