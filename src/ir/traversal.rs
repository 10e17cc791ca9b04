// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ir::{Context, Expr, ExprRef, ForEachChild};

/// Folds a term from its leaves to its root. `f` receives a node together with the results of
/// its children, in child order. Shared sub-terms are folded once per occurrence.
pub fn bottom_up<R>(
    ctx: &Context,
    root: ExprRef,
    mut f: impl FnMut(&Context, &Expr, &[R]) -> R,
) -> R {
    // `(node, children_done)`
    let mut todo = vec![(root, false)];
    let mut results: Vec<R> = Vec::with_capacity(4);

    while let Some((node, children_done)) = todo.pop() {
        let expr = ctx.get(node);
        if !children_done && expr.num_children() > 0 {
            todo.push((node, true));
            // reversed, so that the first child is folded first and its result ends up first
            let first = todo.len();
            expr.for_each_child(|c| todo.push((*c, false)));
            todo[first..].reverse();
            continue;
        }
        let first_child = results.len() - expr.num_children();
        let value = f(ctx, expr, &results[first_child..]);
        results.truncate(first_child);
        results.push(value);
    }

    debug_assert_eq!(results.len(), 1);
    results.pop().expect("the root produces exactly one result")
}
