// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::OracleError;
use crate::ir::*;

pub type OracleResult<T> = std::result::Result<T, OracleError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResponse {
    Sat,
    Unsat,
    /// The decision procedure gave up, e.g., because the query is outside of its decidable
    /// fragment or because it ran out of time.
    Unknown(String),
}

/// A decision procedure for the predicate logic of our terms. State variables are unrolled over
/// discrete steps: a `curr` occurrence asserted at step `k` refers to state `k` and a `next`
/// occurrence to state `k + 1`. Symbols declared with `declare-fun` are rigid, i.e., they have
/// the same value in every step.
pub trait Oracle {
    fn assert_at(&mut self, ctx: &Context, expr: ExprRef, step: u64) -> OracleResult<()>;
    /// Opens a new assertion scope.
    fn push(&mut self) -> OracleResult<()>;
    /// Removes all assertions made since the matching `push`.
    fn pop(&mut self) -> OracleResult<()>;
    fn check(&mut self) -> OracleResult<CheckResponse>;
    /// Value of a state variable in the model of the last satisfiable `check`. Variables that
    /// were never mentioned in an assertion are unconstrained and may take any value.
    fn model_value(&mut self, ctx: &Context, var: &StateVariable, step: u64)
        -> OracleResult<Value>;
    /// Value of a rigid symbol in the model of the last satisfiable `check`.
    fn symbol_value(&mut self, ctx: &Context, symbol: ExprRef) -> OracleResult<Value>;
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn assert_at(&mut self, ctx: &Context, expr: ExprRef, step: u64) -> OracleResult<()> {
        (**self).assert_at(ctx, expr, step)
    }

    fn push(&mut self) -> OracleResult<()> {
        (**self).push()
    }

    fn pop(&mut self) -> OracleResult<()> {
        (**self).pop()
    }

    fn check(&mut self) -> OracleResult<CheckResponse> {
        (**self).check()
    }

    fn model_value(
        &mut self,
        ctx: &Context,
        var: &StateVariable,
        step: u64,
    ) -> OracleResult<Value> {
        (**self).model_value(ctx, var, step)
    }

    fn symbol_value(&mut self, ctx: &Context, symbol: ExprRef) -> OracleResult<Value> {
        (**self).symbol_value(ctx, symbol)
    }
}

/// Value that an unconstrained variable of `sort` takes.
pub(crate) fn default_value(sort: Sort) -> Value {
    match sort {
        Sort::Bool => Value::Bool(false),
        Sort::Int => Value::Int(0),
    }
}
