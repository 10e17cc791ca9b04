// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{Context, Expr, ExprRef, ForEachChild, Sort};
use crate::error::Error;
use crate::ir::traversal::bottom_up;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCheckError {
    msg: String,
}

impl TypeCheckError {
    pub fn get_msg(&self) -> &str {
        &self.msg
    }

    /// Attributes the error to the form `id`.
    pub fn in_form(self, id: &str) -> Error {
        Error::tpe(id, self.msg)
    }
}

impl Sort {
    fn expect(&self, expected: Sort, op: &str) -> Result<Sort, TypeCheckError> {
        if *self == expected {
            Ok(*self)
        } else {
            Err(TypeCheckError {
                msg: format!("{op} expects {expected} arguments, not {self}."),
            })
        }
    }
}

fn expect_same_sort(op: &str, a: Sort, b: Sort) -> Result<Sort, TypeCheckError> {
    if a == b {
        Ok(a)
    } else {
        Err(TypeCheckError {
            msg: format!("{op} requires two arguments of the same sort, not {a} and {b}"),
        })
    }
}

pub trait TypeCheck {
    /// Type check expression node. Does not recurse to lower nodes.
    fn type_check(&self, ctx: &Context) -> Result<Sort, TypeCheckError>;
    /// Type checks the complete expression tree.
    fn type_check_deep(&self, ctx: &Context) -> Result<Sort, TypeCheckError>;
    /// gets sort as fast as possible without performing any checks
    fn get_type(&self, ctx: &Context) -> Sort;
}

impl TypeCheck for Expr {
    fn type_check(&self, ctx: &Context) -> Result<Sort, TypeCheckError> {
        let mut children = Vec::with_capacity(4);
        self.collect_children(&mut children);
        let sorts: Vec<Sort> = children.iter().map(|c| c.get_type(ctx)).collect();
        check_node(ctx, self, &sorts)
    }

    fn type_check_deep(&self, ctx: &Context) -> Result<Sort, TypeCheckError> {
        let mut children = Vec::with_capacity(4);
        self.collect_children(&mut children);
        let sorts = children
            .iter()
            .map(|c| c.type_check_deep(ctx))
            .collect::<Result<Vec<_>, _>>()?;
        check_node(ctx, self, &sorts)
    }

    fn get_type(&self, ctx: &Context) -> Sort {
        match self {
            Expr::Var { sort, .. } | Expr::Symbol { sort, .. } | Expr::Param { sort, .. } => *sort,
            Expr::BoolLit(_) => Sort::Bool,
            Expr::IntLit(_) => Sort::Int,
            Expr::Not(_)
            | Expr::And(_, _)
            | Expr::Or(_, _)
            | Expr::Implies(_, _)
            | Expr::Xor(_, _)
            | Expr::Equal(_, _)
            | Expr::Distinct(_, _)
            | Expr::Less(_, _)
            | Expr::LessEqual(_, _)
            | Expr::Greater(_, _)
            | Expr::GreaterEqual(_, _) => Sort::Bool,
            Expr::Neg(_)
            | Expr::Add(_, _)
            | Expr::Sub(_, _)
            | Expr::Mul(_, _)
            | Expr::Div(_, _)
            | Expr::Mod(_, _) => Sort::Int,
            Expr::Ite { tru, .. } => tru.get_type(ctx),
            Expr::Apply { fun, .. } => ctx.get_fun(*fun).sort,
        }
    }
}

/// Checks a single node given the sorts of its children.
fn check_node(ctx: &Context, expr: &Expr, children: &[Sort]) -> Result<Sort, TypeCheckError> {
    match expr {
        Expr::Var { sort, .. } | Expr::Symbol { sort, .. } | Expr::Param { sort, .. } => Ok(*sort),
        Expr::BoolLit(_) => Ok(Sort::Bool),
        Expr::IntLit(_) => Ok(Sort::Int),
        Expr::Not(_) => children[0].expect(Sort::Bool, "not"),
        Expr::Neg(_) => children[0].expect(Sort::Int, "-"),
        Expr::And(_, _) | Expr::Or(_, _) | Expr::Implies(_, _) | Expr::Xor(_, _) => {
            let op = bool_op_name(expr);
            children[0].expect(Sort::Bool, op)?;
            children[1].expect(Sort::Bool, op)
        }
        Expr::Equal(_, _) | Expr::Distinct(_, _) => {
            expect_same_sort("equality", children[0], children[1])?;
            Ok(Sort::Bool)
        }
        Expr::Add(_, _) | Expr::Sub(_, _) | Expr::Mul(_, _) | Expr::Div(_, _) | Expr::Mod(_, _) => {
            children[0].expect(Sort::Int, "arithmetic")?;
            children[1].expect(Sort::Int, "arithmetic")
        }
        Expr::Less(_, _) | Expr::LessEqual(_, _) | Expr::Greater(_, _) | Expr::GreaterEqual(_, _) => {
            children[0].expect(Sort::Int, "comparison")?;
            children[1].expect(Sort::Int, "comparison")?;
            Ok(Sort::Bool)
        }
        Expr::Ite { .. } => {
            children[0].expect(Sort::Bool, "ite condition")?;
            expect_same_sort("ite", children[1], children[2])
        }
        Expr::Apply { fun, .. } => {
            let def = ctx.get_fun(*fun);
            let name = ctx.get_str(def.name);
            if def.params.len() != children.len() {
                return Err(TypeCheckError {
                    msg: format!(
                        "{name} expects {} arguments, got {}",
                        def.params.len(),
                        children.len()
                    ),
                });
            }
            for (param, actual) in def.params.iter().zip(children.iter()) {
                let formal = param.get_type(ctx);
                if formal != *actual {
                    return Err(TypeCheckError {
                        msg: format!(
                            "argument `{}` of {name} is of sort {formal}, not {actual}",
                            ctx.get_str(ctx.get(*param).leaf_name().unwrap_or(def.name)),
                        ),
                    });
                }
            }
            Ok(def.sort)
        }
    }
}

fn bool_op_name(expr: &Expr) -> &'static str {
    match expr {
        Expr::And(_, _) => "and",
        Expr::Or(_, _) => "or",
        Expr::Implies(_, _) => "=>",
        _ => "xor",
    }
}

impl TypeCheck for ExprRef {
    fn type_check(&self, ctx: &Context) -> Result<Sort, TypeCheckError> {
        ctx.get(*self).type_check(ctx)
    }

    fn type_check_deep(&self, ctx: &Context) -> Result<Sort, TypeCheckError> {
        bottom_up(ctx, *self, |ctx, expr, children: &[Result<Sort, TypeCheckError>]| {
            let sorts = children.iter().cloned().collect::<Result<Vec<_>, _>>()?;
            check_node(ctx, expr, &sorts)
        })
    }

    fn get_type(&self, ctx: &Context) -> Sort {
        ctx.get(*self).get_type(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_check_arithmetic() {
        let mut ctx = Context::default();
        let a = ctx.curr("a", Sort::Int);
        let b = ctx.curr("b", Sort::Bool);
        let one = ctx.int_lit(1);
        let sum = ctx.add(a, one);
        assert_eq!(sum.type_check_deep(&ctx), Ok(Sort::Int));
        let cmp = ctx.greater_or_equal(sum, one);
        assert_eq!(cmp.type_check_deep(&ctx), Ok(Sort::Bool));
        let bad = ctx.add(a, b);
        let err = bad.type_check_deep(&ctx).unwrap_err();
        assert_eq!(err.get_msg(), "arithmetic expects Int arguments, not Bool.");
        // the error is found even when nested
        let nested = ctx.equal(bad, one);
        assert!(nested.type_check_deep(&ctx).is_err());
        // shallow type checking only looks at the immediate children
        assert_eq!(nested.type_check(&ctx), Ok(Sort::Bool));
    }

    #[test]
    fn type_check_ite_and_equal() {
        let mut ctx = Context::default();
        let c = ctx.curr("c", Sort::Bool);
        let one = ctx.int_lit(1);
        let tru = ctx.tru();
        let ite = ctx.ite(c, one, tru);
        assert!(ite.type_check_deep(&ctx).is_err());
        let eq = ctx.equal(one, tru);
        assert!(eq.type_check_deep(&ctx).is_err());
        let ite = ctx.ite(c, one, one);
        assert_eq!(ite.get_type(&ctx), Sort::Int);
    }

    #[test]
    fn type_check_apply() {
        let mut ctx = Context::default();
        let x = ctx.param("x", Sort::Int);
        let zero = ctx.int_lit(0);
        let body = ctx.greater(x, zero);
        let pos = ctx.define_fun("pos", &[x], Sort::Bool, body).unwrap();
        let tru = ctx.tru();
        let bad = ctx.apply(pos, &[tru]).unwrap();
        let err = bad.type_check_deep(&ctx).unwrap_err();
        assert_eq!(err.get_msg(), "argument `x` of pos is of sort Int, not Bool");
        let good = ctx.apply(pos, &[zero]).unwrap();
        assert_eq!(good.type_check_deep(&ctx), Ok(Sort::Bool));
    }
}
