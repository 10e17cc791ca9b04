// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ir::*;
use easy_smt as smt;
use std::borrow::Cow;

pub fn convert_sort(smt_ctx: &smt::Context, sort: Sort) -> smt::SExpr {
    match sort {
        Sort::Bool => smt_ctx.bool_sort(),
        Sort::Int => smt_ctx.int_sort(),
    }
}

pub fn convert_int(smt_ctx: &smt::Context, value: i64) -> smt::SExpr {
    let magnitude = smt_ctx.numeral(value.unsigned_abs());
    if value < 0 {
        smt_ctx.list(vec![smt_ctx.atom("-"), magnitude])
    } else {
        magnitude
    }
}

/// Converts an expression into an SMT-LIB term. State variables and symbols are translated by
/// `leaf`, function parameters keep their name and function calls refer to the function by
/// name, i.e., the caller needs to make sure that all of them are declared.
pub fn convert_expr(
    smt_ctx: &smt::Context,
    ctx: &Context,
    expr_ref: ExprRef,
    leaf: &impl Fn(&Expr) -> Option<smt::SExpr>,
) -> smt::SExpr {
    bottom_up(ctx, expr_ref, |ctx, expr, args: &[smt::SExpr]| {
        if let Some(replaced) = (leaf)(expr) {
            return replaced;
        }
        let op = |name: &str| -> smt::SExpr {
            let mut list = Vec::with_capacity(args.len() + 1);
            list.push(smt_ctx.atom(name));
            list.extend_from_slice(args);
            smt_ctx.list(list)
        };
        match expr {
            Expr::Var { name, .. } | Expr::Symbol { name, .. } | Expr::Param { name, .. } => {
                smt_ctx.atom(escape_smt_identifier(ctx.get_str(*name)))
            }
            Expr::BoolLit(true) => smt_ctx.true_(),
            Expr::BoolLit(false) => smt_ctx.false_(),
            Expr::IntLit(value) => convert_int(smt_ctx, *value),
            Expr::Not(_) => smt_ctx.not(args[0]),
            Expr::Neg(_) => op("-"),
            Expr::And(_, _) => smt_ctx.and(args[0], args[1]),
            Expr::Or(_, _) => smt_ctx.or(args[0], args[1]),
            Expr::Implies(_, _) => smt_ctx.imp(args[0], args[1]),
            Expr::Xor(_, _) => smt_ctx.xor(args[0], args[1]),
            Expr::Equal(_, _) => smt_ctx.eq(args[0], args[1]),
            Expr::Distinct(_, _) => op("distinct"),
            Expr::Add(_, _) => op("+"),
            Expr::Sub(_, _) => op("-"),
            Expr::Mul(_, _) => op("*"),
            Expr::Div(_, _) => op("div"),
            Expr::Mod(_, _) => op("mod"),
            Expr::Less(_, _) => op("<"),
            Expr::LessEqual(_, _) => op("<="),
            Expr::Greater(_, _) => op(">"),
            Expr::GreaterEqual(_, _) => op(">="),
            Expr::Ite { .. } => smt_ctx.ite(args[0], args[1], args[2]),
            Expr::Apply { fun, .. } => {
                let name = escape_smt_identifier(ctx.get_str(ctx.get_fun(*fun).name));
                if args.is_empty() {
                    smt_ctx.atom(name)
                } else {
                    op(&name)
                }
            }
        }
    })
}

/// See <simple_symbol> definition in the Concrete Syntax Appendix of the SMTLib Spec
fn is_simple_smt_identifier(id: &str) -> bool {
    if id.is_empty() {
        return false; // needs to be non-empty
    }
    let mut is_first = true;
    for cc in id.chars() {
        if !cc.is_ascii() {
            return false; // all allowed characters are ASCII characters
        }
        let ac = cc as u8;
        let is_alpha = ac.is_ascii_uppercase() || ac.is_ascii_lowercase();
        let is_num = ac.is_ascii_digit();
        let is_other_allowed_char = matches!(
            ac,
            b'+' | b'-'
                | b'/'
                | b'*'
                | b'='
                | b'%'
                | b'?'
                | b'!'
                | b'.'
                | b'$'
                | b'_'
                | b'~'
                | b'&'
                | b'^'
                | b'<'
                | b'>'
                | b'@'
        );
        if !(is_alpha | is_num | is_other_allowed_char) {
            return false;
        }
        if is_num && is_first {
            return false; // the first character is not allowed ot be a digit
        }
        is_first = false;
    }
    true // passed all checks
}

pub fn escape_smt_identifier(id: &str) -> Cow<'_, str> {
    if is_simple_smt_identifier(id) {
        Cow::Borrowed(id)
    } else {
        let escaped = format!("|{}|", id);
        Cow::Owned(escaped)
    }
}

#[cfg(test)]
fn unescape_smt_identifier(id: &str) -> &str {
    if id.starts_with('|') {
        assert!(id.ends_with('|'));
        &id[1..id.len() - 1]
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easy_smt::*;

    #[test]
    fn easy_smt_symbol_escaping() {
        let ctx = ContextBuilder::new().build().unwrap();
        let test = ctx.atom("test");
        assert_eq!(ctx.display(test).to_string(), "test");
        // turns out easy_smt does not do any escaping!
        let needs_to_be_escaped_1 = ctx.atom("a b");
        assert_eq!(ctx.display(needs_to_be_escaped_1).to_string(), "a b");
    }

    #[test]
    fn test_our_escaping() {
        assert_eq!(
            unescape_smt_identifier(&escape_smt_identifier("a b")),
            "a b"
        );
        // instance labels contain a `#` and thus always need to be quoted
        assert_eq!(escape_smt_identifier("count#0.steps@3"), "|count#0.steps@3|");
        assert_eq!(escape_smt_identifier("out@3"), "out@3");
    }

    #[test]
    fn convert_counter_trans() {
        let smt_ctx = ContextBuilder::new().build().unwrap();
        let mut ctx = Context::default();
        let inp = ctx.next("in", Sort::Bool);
        let out = ctx.curr("out", Sort::Int);
        let out_next = ctx.next("out", Sort::Int);
        let minus_one = ctx.int_lit(-1);
        let dec = ctx.add(out, minus_one);
        let ite = ctx.ite(inp, dec, out);
        let trans = ctx.equal(out_next, ite);
        let leaf = |e: &Expr| match e {
            Expr::Var { name, tag, .. } => {
                let step = tag.offset() + 3;
                Some(smt_ctx.atom(format!("{}@{step}", ctx.get_str(*name))))
            }
            _ => None,
        };
        let res = convert_expr(&smt_ctx, &ctx, trans, &leaf);
        assert_eq!(
            smt_ctx.display(res).to_string(),
            "(= out@4 (ite in@4 (+ out@3 (- 1)) out@3))"
        );
    }
}
