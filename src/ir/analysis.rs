// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ir::context::{FunRef, StringRef};
use crate::ir::{Context, Expr, ExprRef, ForEachChild, Sort, StateTag};
use std::ops::Index;

/// Returns every distinct variable, symbol and parameter in `root` in the order they are
/// first encountered. Does not look into the bodies of applied functions.
pub fn collect_leaves(ctx: &Context, root: ExprRef) -> Vec<ExprRef> {
    let mut visited = ExprMetaData::<bool>::default();
    let mut todo = vec![root];
    let mut out = vec![];
    while let Some(expr_ref) = todo.pop() {
        if *visited.get(expr_ref) {
            continue;
        }
        *visited.get_mut(expr_ref) = true;
        let expr = ctx.get(expr_ref);
        if expr.leaf_name().is_some() {
            out.push(expr_ref);
        }
        // reverse order, so that children are visited left to right
        let mut children = Vec::with_capacity(expr.num_children());
        expr.collect_children(&mut children);
        todo.extend(children.into_iter().rev());
    }
    out
}

/// A state variable occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarUse {
    pub name: StringRef,
    pub sort: Sort,
    pub tag: StateTag,
}

/// All state variable occurrences in `root`.
pub fn collect_vars(ctx: &Context, root: ExprRef) -> Vec<VarUse> {
    collect_leaves(ctx, root)
        .into_iter()
        .flat_map(|e| match ctx.get(e) {
            Expr::Var { name, sort, tag } => Some(VarUse {
                name: *name,
                sort: *sort,
                tag: *tag,
            }),
            _ => None,
        })
        .collect()
}

/// True iff `root` does not refer to the successor state.
pub fn is_one_state(ctx: &Context, root: ExprRef) -> bool {
    collect_vars(ctx, root)
        .iter()
        .all(|v| v.tag == StateTag::Curr)
}

/// Returns every function that `root` applies, directly or through other function bodies.
/// The result is ordered by definition, i.e. callees come before their callers.
pub fn collect_funs(ctx: &Context, root: ExprRef) -> Vec<FunRef> {
    let mut funs: Vec<FunRef> = vec![];
    let mut todo = vec![root];
    let mut visited = ExprMetaData::<bool>::default();
    while let Some(expr_ref) = todo.pop() {
        if *visited.get(expr_ref) {
            continue;
        }
        *visited.get_mut(expr_ref) = true;
        let expr = ctx.get(expr_ref);
        if let Expr::Apply { fun, .. } = expr {
            if !funs.contains(fun) {
                funs.push(*fun);
                todo.push(ctx.get_fun(*fun).body);
            }
        }
        expr.for_each_child(|c| {
            if !*visited.get(*c) {
                todo.push(*c);
            }
        });
    }
    funs.sort();
    funs
}

/// A dense hash map to store meta-data related to each expression
#[derive(Debug, Default, Clone)]
pub struct ExprMetaData<T: Default + Clone> {
    inner: Vec<T>,
    default: T,
}

impl<T: Default + Clone> ExprMetaData<T> {
    pub fn get(&self, e: ExprRef) -> &T {
        self.inner.get(e.index()).unwrap_or(&self.default)
    }

    pub fn get_mut(&mut self, e: ExprRef) -> &mut T {
        if self.inner.len() <= e.index() {
            self.inner.resize(e.index() + 1, T::default());
        }
        &mut self.inner[e.index()]
    }
}

impl<T: Default + Clone> Index<ExprRef> for ExprMetaData<T> {
    type Output = T;

    fn index(&self, index: ExprRef) -> &Self::Output {
        self.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_in_order() {
        let mut ctx = Context::default();
        let a = ctx.curr("a", Sort::Int);
        let b = ctx.next("b", Sort::Int);
        let one = ctx.int_lit(1);
        let sum = ctx.add(a, one);
        let e = ctx.equal(b, sum);
        let e2 = ctx.and(e, e);
        assert_eq!(collect_leaves(&ctx, e2), vec![b, a]);
        assert!(!is_one_state(&ctx, e2));
        assert!(is_one_state(&ctx, sum));
        let vars = collect_vars(&ctx, e2);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].tag, StateTag::Next);
        assert_eq!(ctx.get_str(vars[1].name), "a");
    }

    #[test]
    fn funs_in_definition_order() {
        let mut ctx = Context::default();
        let x = ctx.param("x", Sort::Int);
        let one = ctx.int_lit(1);
        let body = ctx.add(x, one);
        let inc = ctx.define_fun("inc", &[x], Sort::Int, body).unwrap();
        let inc_x = ctx.apply(inc, &[x]).unwrap();
        let body2 = ctx.apply(inc, &[inc_x]).unwrap();
        let inc2 = ctx.define_fun("inc2", &[x], Sort::Int, body2).unwrap();
        let a = ctx.curr("a", Sort::Int);
        let e = ctx.apply(inc2, &[a]).unwrap();
        assert_eq!(collect_funs(&ctx, e), vec![inc, inc2]);
        assert!(collect_funs(&ctx, a).is_empty());
    }
}
