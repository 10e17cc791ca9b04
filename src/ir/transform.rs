// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ir::*;
use std::collections::HashMap;

/// Rewrites all `roots` with a shared memo table. `foo` is called once per node with the
/// already transformed children; returning `None` keeps the node (re-created if a child
/// changed).
pub fn transform_exprs(
    ctx: &mut Context,
    roots: &[ExprRef],
    foo: impl FnMut(&mut Context, ExprRef, &[ExprRef]) -> Option<ExprRef>,
) -> Vec<ExprRef> {
    let transformed = do_transform_expr(ctx, roots.to_vec(), foo);
    roots
        .iter()
        .map(|r| transformed.get(*r).expect("all roots are transformed"))
        .collect()
}

fn do_transform_expr(
    ctx: &mut Context,
    mut todo: Vec<ExprRef>,
    mut foo: impl FnMut(&mut Context, ExprRef, &[ExprRef]) -> Option<ExprRef>,
) -> ExprMetaData<Option<ExprRef>> {
    let mut transformed = ExprMetaData::default();
    let mut children = Vec::with_capacity(4);

    while let Some(expr_ref) = todo.pop() {
        if transformed.get(expr_ref).is_some() {
            continue;
        }
        // check to see if we translated all the children
        children.clear();
        let mut children_changed = false; // track whether any of the children changed
        let mut all_transformed = true; // tracks whether all children have been transformed or if there is more work to do
        ctx.get(expr_ref).for_each_child(|c| match transformed.get(*c) {
            Some(new_child_expr) => {
                if *new_child_expr != *c {
                    children_changed = true; // child changed
                }
                children.push(*new_child_expr);
            }
            None => {
                if all_transformed {
                    todo.push(expr_ref);
                }
                all_transformed = false;
                todo.push(*c);
            }
        });
        if !all_transformed {
            continue;
        }

        // call out to the transform
        let foo_res = (foo)(ctx, expr_ref, &children);
        let new_expr_ref = match foo_res {
            Some(e) => e,
            None => {
                if children_changed {
                    let new_expr = ctx.get(expr_ref).with_children(&children);
                    ctx.add_expr(new_expr)
                } else {
                    // if no children changed and the transform does not want to do changes,
                    // we can just keep the old expression
                    expr_ref
                }
            }
        };
        // remember the transformed version
        *transformed.get_mut(expr_ref) = Some(new_expr_ref);
    }
    transformed
}

/// Maps a state variable occurrence (identified by name and tag) to its replacement.
pub type VarSubstitution = HashMap<(StringRef, StateTag), ExprRef>;

/// Replaces state variables according to `subst`. Variables without an entry are kept.
/// All `roots` share one memo table, thus common sub-terms are only rewritten once.
pub fn substitute(ctx: &mut Context, roots: &[ExprRef], subst: &VarSubstitution) -> Vec<ExprRef> {
    if subst.is_empty() {
        return roots.to_vec();
    }
    transform_exprs(ctx, roots, |ctx, e, _| match ctx.get(e) {
        Expr::Var { name, tag, .. } => subst.get(&(*name, *tag)).copied(),
        _ => None,
    })
}
