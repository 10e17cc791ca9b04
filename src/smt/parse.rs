// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ir::*;
use easy_smt as smt;

pub fn parse_smt_bool(smt_ctx: &smt::Context, expr: smt::SExpr) -> Option<bool> {
    match smt_ctx.get(expr) {
        smt::SExprData::Atom("true") => Some(true),
        smt::SExprData::Atom("false") => Some(false),
        // unwraps expressions like: ((a true))
        smt::SExprData::List([inner]) => parse_smt_bool(smt_ctx, *inner),
        // unwraps expressions like: (a true)
        smt::SExprData::List([_, value]) => parse_smt_bool(smt_ctx, *value),
        _ => None,
    }
}

/// Parses non-negative numerals as well as negative numbers which solvers print as `(- 5)`.
pub fn parse_smt_int(smt_ctx: &smt::Context, expr: smt::SExpr) -> Option<i64> {
    match smt_ctx.get(expr) {
        smt::SExprData::Atom(value) => value.parse::<i64>().ok(),
        smt::SExprData::List([inner]) => parse_smt_int(smt_ctx, *inner),
        smt::SExprData::List([op, value]) => {
            if let smt::SExprData::Atom("-") = smt_ctx.get(*op) {
                // negating the parsed magnitude would overflow for i64::MIN
                match smt_ctx.get(*value) {
                    smt::SExprData::Atom(digits) => format!("-{digits}").parse::<i64>().ok(),
                    _ => parse_smt_int(smt_ctx, *value)?.checked_neg(),
                }
            } else {
                parse_smt_int(smt_ctx, *value)
            }
        }
        _ => None,
    }
}

pub fn parse_smt_value(smt_ctx: &smt::Context, expr: smt::SExpr, sort: Sort) -> Option<Value> {
    match sort {
        Sort::Bool => parse_smt_bool(smt_ctx, expr).map(Value::Bool),
        Sort::Int => parse_smt_int(smt_ctx, expr).map(Value::Int),
    }
}
