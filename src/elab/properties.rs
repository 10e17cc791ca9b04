// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::elab::FlattenedSystem;
use crate::error::{suggest_names, Error, Result};
use crate::ir::*;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// An invariant that needs to be proven.
    Safety,
    /// An auxiliary fact about the system, trusted unless explicitly requested.
    Relation,
}

/// A named predicate over the (flattened) variables of a system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub id: String,
    pub system: String,
    pub kind: PropertyKind,
    pub term: ExprRef,
}

impl Property {
    /// Two-state predicates relate a state to its successor and can only be evaluated on a
    /// transition.
    pub fn is_one_state(&self, ctx: &Context) -> bool {
        is_one_state(ctx, self.term)
    }
}

/// Properties and relations share one namespace.
#[derive(Debug, Default, Clone)]
pub struct PropertyRegistry {
    props: IndexMap<String, Property>,
}

impl PropertyRegistry {
    /// Adds a property of `system`. All variables need to be part of the flattened system,
    /// internal variables of subsystems are referred to by their qualified name.
    pub fn define(
        &mut self,
        ctx: &Context,
        system: &FlattenedSystem,
        id: &str,
        kind: PropertyKind,
        term: ExprRef,
    ) -> Result<()> {
        if self.props.contains_key(id) {
            return Err(Error::declaration(id, "property is declared twice"));
        }
        let sort = term.type_check_deep(ctx).map_err(|e| e.in_form(id))?;
        if sort != Sort::Bool {
            return Err(Error::tpe(id, format!("needs to be a Bool predicate, not {sort}")));
        }
        for leaf in collect_leaves(ctx, term) {
            match ctx.get(leaf) {
                Expr::Var { name, sort, .. } => match system.find_var(*name) {
                    Some(var) if var.sort == *sort => {}
                    Some(var) => {
                        return Err(Error::tpe(
                            id,
                            format!(
                                "`{}` of `{}` is of sort {}, not {sort}",
                                ctx.get_str(*name),
                                system.name,
                                var.sort
                            ),
                        ))
                    }
                    None => {
                        let known = system.variables.iter().map(|v| ctx.get_str(v.name));
                        let suggestions = suggest_names(ctx.get_str(*name), known);
                        let mut msg = format!(
                            "`{}` is not a state variable of `{}`",
                            ctx.get_str(*name),
                            system.name
                        );
                        if !suggestions.is_empty() {
                            msg.push_str(&format!(", did you mean: {}?", suggestions.join(", ")));
                        }
                        return Err(Error::declaration(id, msg));
                    }
                },
                Expr::Param { name, .. } => {
                    return Err(Error::declaration(
                        id,
                        format!(
                            "function parameter `{}` used outside of a function body",
                            ctx.get_str(*name)
                        ),
                    ))
                }
                _ => {}
            }
        }
        self.props.insert(
            id.to_string(),
            Property {
                id: id.to_string(),
                system: system.name.clone(),
                kind,
                term,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<&Property> {
        self.props.get(id).ok_or_else(|| {
            let suggestions = suggest_names(id, self.props.keys().map(|k| k.as_str()));
            let mut msg = "unknown property".to_string();
            if !suggestions.is_empty() {
                msg.push_str(&format!(", did you mean: {}?", suggestions.join(", ")));
            }
            Error::declaration(id, msg)
        })
    }

    /// Relations attached to `system`, in definition order.
    pub fn relations_of<'a>(&'a self, system: &'a str) -> impl Iterator<Item = &'a Property> + 'a {
        self.props
            .values()
            .filter(move |p| p.kind == PropertyKind::Relation && p.system == system)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> + '_ {
        self.props.values()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}
