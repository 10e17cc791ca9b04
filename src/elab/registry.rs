// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{suggest_names, Error, Result};
use crate::ir::*;
use indexmap::IndexMap;

/// All transition systems of a model, in declaration order.
#[derive(Debug, Default, Clone)]
pub struct SystemRegistry {
    systems: IndexMap<String, TransitionSystem>,
}

impl SystemRegistry {
    /// Validates and adds `system`. Subsystems need to be declared first, except for the
    /// system itself which is rejected later as a composition cycle.
    pub fn declare(&mut self, ctx: &Context, system: TransitionSystem) -> Result<()> {
        let id = system.name.as_str();
        if self.systems.contains_key(id) {
            return Err(Error::declaration(id, "system is declared twice"));
        }
        for local in system.locals.iter() {
            if system.signature.find(local.name).is_some() {
                return Err(Error::declaration(
                    id,
                    format!(
                        "`{}` is declared as interface and as local variable",
                        ctx.get_str(local.name)
                    ),
                ));
            }
        }
        check_predicate(ctx, &system, system.init, "init")?;
        check_predicate(ctx, &system, system.trans, "trans")?;
        if !is_one_state(ctx, system.init) {
            return Err(Error::declaration(
                id,
                "the initial state predicate may only refer to the current state",
            ));
        }
        for inst in system.composition.iter() {
            if inst.system != system.name && !self.systems.contains_key(&inst.system) {
                let suggestions = suggest_names(&inst.system, self.names());
                let mut msg = format!("unknown subsystem `{}`", inst.system);
                if !suggestions.is_empty() {
                    msg.push_str(&format!(", did you mean: {}?", suggestions.join(", ")));
                }
                return Err(Error::declaration(id, msg));
            }
            for &(curr, next) in inst.args.iter() {
                check_actual(ctx, &system, &inst.system, curr)?;
                check_actual(ctx, &system, &inst.system, next)?;
                if !is_one_state(ctx, curr) {
                    return Err(Error::declaration(
                        id,
                        format!(
                            "current state argument `{}` of `{}` refers to the next state",
                            curr.serialize_to_str(ctx),
                            inst.system
                        ),
                    ));
                }
            }
        }
        self.systems.insert(system.name.clone(), system);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<&TransitionSystem> {
        self.systems.get(id).ok_or_else(|| Error::UnknownSystem {
            id: id.to_string(),
            suggestions: suggest_names(id, self.names()),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.systems.contains_key(id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.systems.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransitionSystem> + '_ {
        self.systems.values()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Edges from every system to the subsystems it instantiates.
    pub fn composition_graph(&self) -> IndexMap<&str, Vec<&str>> {
        self.systems
            .iter()
            .map(|(name, sys)| (name.as_str(), sys.subsystems().collect()))
            .collect()
    }
}

/// Checks that `pred` is a boolean term over the system's own state variables.
fn check_predicate(ctx: &Context, sys: &TransitionSystem, pred: ExprRef, what: &str) -> Result<()> {
    let sort = pred.type_check_deep(ctx).map_err(|e| e.in_form(&sys.name))?;
    if sort != Sort::Bool {
        return Err(Error::tpe(
            &sys.name,
            format!("{what} needs to be a Bool predicate, not {sort}"),
        ));
    }
    check_leaves(ctx, sys, pred)
}

fn check_actual(ctx: &Context, sys: &TransitionSystem, child: &str, actual: ExprRef) -> Result<()> {
    actual
        .type_check_deep(ctx)
        .map_err(|e| Error::tpe(&sys.name, format!("argument of `{child}`: {}", e.get_msg())))?;
    check_leaves(ctx, sys, actual)
}

fn check_leaves(ctx: &Context, sys: &TransitionSystem, e: ExprRef) -> Result<()> {
    for leaf in collect_leaves(ctx, e) {
        match ctx.get(leaf) {
            Expr::Var { name, sort, .. } => match sys.find_var(*name) {
                None => {
                    return Err(Error::declaration(
                        &sys.name,
                        format!("unbound state variable `{}`", ctx.get_str(*name)),
                    ))
                }
                Some(var) if var.sort != *sort => {
                    return Err(Error::tpe(
                        &sys.name,
                        format!(
                            "state variable `{}` is declared as {}, but used as {sort}",
                            ctx.get_str(*name),
                            var.sort
                        ),
                    ))
                }
                Some(_) => {}
            },
            Expr::Param { name, .. } => {
                return Err(Error::declaration(
                    &sys.name,
                    format!(
                        "function parameter `{}` used outside of a function body",
                        ctx.get_str(*name)
                    ),
                ))
            }
            _ => {}
        }
    }
    Ok(())
}
