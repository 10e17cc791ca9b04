// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ir::{Context, Expr, ExprRef, StateTag, StateVariable, StringRef};
use crate::ir::traversal::bottom_up;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    msg: String,
}

impl EvalError {
    pub(crate) fn new(msg: impl ToString) -> Self {
        Self {
            msg: msg.to_string(),
        }
    }

    pub fn get_msg(&self) -> &str {
        &self.msg
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

/// Returns a value for a state variable or symbol if it is available.
pub trait GetExprValue {
    fn get_value(&self, ctx: &Context, leaf: &Expr) -> Option<Value>;
}

/// Values of one state, optionally its successor, and of all rigid symbols.
pub struct StepValues<'a> {
    pub variables: &'a [StateVariable],
    pub curr: &'a [Value],
    pub next: Option<&'a [Value]>,
    pub symbols: &'a HashMap<StringRef, Value>,
}

impl<'a> GetExprValue for StepValues<'a> {
    fn get_value(&self, _ctx: &Context, leaf: &Expr) -> Option<Value> {
        match leaf {
            Expr::Var { name, tag, .. } => {
                let index = self.variables.iter().position(|v| v.name == *name)?;
                match tag {
                    StateTag::Curr => self.curr.get(index).copied(),
                    StateTag::Next => self.next.and_then(|n| n.get(index).copied()),
                }
            }
            Expr::Symbol { name, .. } => self.symbols.get(name).copied(),
            _ => None,
        }
    }
}

/// Evaluates `expr` with integer semantics of SMT-LIB. Function applications are evaluated
/// by binding their parameters.
pub fn eval(ctx: &Context, expr: ExprRef, values: &impl GetExprValue) -> Result<Value, EvalError> {
    eval_with_params(ctx, expr, values, &[])
}

fn eval_with_params(
    ctx: &Context,
    expr: ExprRef,
    values: &impl GetExprValue,
    params: &[(StringRef, Value)],
) -> Result<Value, EvalError> {
    bottom_up(ctx, expr, |ctx, expr, children: &[Result<Value, EvalError>]| {
        let args = children.iter().cloned().collect::<Result<Vec<_>, _>>()?;
        eval_node(ctx, expr, &args, values, params)
    })
}

fn eval_node(
    ctx: &Context,
    expr: &Expr,
    args: &[Value],
    values: &impl GetExprValue,
    params: &[(StringRef, Value)],
) -> Result<Value, EvalError> {
    let b = |ii: usize| -> Result<bool, EvalError> {
        args[ii]
            .as_bool()
            .ok_or_else(|| EvalError::new("expected a boolean"))
    };
    let i = |ii: usize| -> Result<i64, EvalError> {
        args[ii]
            .as_int()
            .ok_or_else(|| EvalError::new("expected an integer"))
    };
    let overflow = || EvalError::new("integer overflow");
    let value = match expr {
        Expr::Var { name, .. } | Expr::Symbol { name, .. } => {
            values.get_value(ctx, expr).ok_or_else(|| {
                EvalError::new(format!("no value for `{}`", ctx.get_str(*name)))
            })?
        }
        Expr::Param { name, .. } => params
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| EvalError::new(format!("unbound parameter `{}`", ctx.get_str(*name))))?,
        Expr::BoolLit(v) => Value::Bool(*v),
        Expr::IntLit(v) => Value::Int(*v),
        Expr::Not(_) => Value::Bool(!b(0)?),
        Expr::Neg(_) => Value::Int(i(0)?.checked_neg().ok_or_else(overflow)?),
        Expr::And(_, _) => Value::Bool(b(0)? && b(1)?),
        Expr::Or(_, _) => Value::Bool(b(0)? || b(1)?),
        Expr::Implies(_, _) => Value::Bool(!b(0)? || b(1)?),
        Expr::Xor(_, _) => Value::Bool(b(0)? ^ b(1)?),
        Expr::Equal(_, _) => Value::Bool(args[0] == args[1]),
        Expr::Distinct(_, _) => Value::Bool(args[0] != args[1]),
        Expr::Add(_, _) => Value::Int(i(0)?.checked_add(i(1)?).ok_or_else(overflow)?),
        Expr::Sub(_, _) => Value::Int(i(0)?.checked_sub(i(1)?).ok_or_else(overflow)?),
        Expr::Mul(_, _) => Value::Int(i(0)?.checked_mul(i(1)?).ok_or_else(overflow)?),
        Expr::Div(_, _) | Expr::Mod(_, _) => {
            let (a, d) = (i(0)?, i(1)?);
            if d == 0 {
                // unspecified in SMT-LIB, the solver may pick any value
                return Err(EvalError::new("division by zero"));
            }
            let res = if matches!(expr, Expr::Div(_, _)) {
                a.checked_div_euclid(d)
            } else {
                a.checked_rem_euclid(d)
            };
            Value::Int(res.ok_or_else(overflow)?)
        }
        Expr::Less(_, _) => Value::Bool(i(0)? < i(1)?),
        Expr::LessEqual(_, _) => Value::Bool(i(0)? <= i(1)?),
        Expr::Greater(_, _) => Value::Bool(i(0)? > i(1)?),
        Expr::GreaterEqual(_, _) => Value::Bool(i(0)? >= i(1)?),
        Expr::Ite { .. } => {
            if b(0)? {
                args[1]
            } else {
                args[2]
            }
        }
        Expr::Apply { fun, .. } => {
            let def = ctx.get_fun(*fun);
            let bound: Vec<(StringRef, Value)> = def
                .params
                .iter()
                .zip(args.iter())
                .flat_map(|(p, v)| ctx.get(*p).leaf_name().map(|n| (n, *v)))
                .collect();
            eval_with_params(ctx, def.body, values, &bound)?
        }
    };
    Ok(value)
}
