// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::{Context, Expr, ExprRef, StateVariable};
use crate::ir::{ForEachChild, TransitionSystem};
use std::io::Write;

pub trait SerializableIrNode {
    fn serialize<W: Write>(&self, ctx: &Context, writer: &mut W) -> std::io::Result<()>;
    fn serialize_to_str(&self, ctx: &Context) -> String {
        let mut buf = Vec::new();
        self.serialize(ctx, &mut buf)
            .expect("Failed to write to string!");
        String::from_utf8(buf).expect("Failed to read string we wrote!")
    }
}

impl SerializableIrNode for Expr {
    fn serialize<W: Write>(&self, ctx: &Context, writer: &mut W) -> std::io::Result<()> {
        serialize_expr(self, ctx, writer)
    }
}

impl SerializableIrNode for ExprRef {
    fn serialize<W: Write>(&self, ctx: &Context, writer: &mut W) -> std::io::Result<()> {
        serialize_expr(ctx.get(*self), ctx, writer)
    }
}

/// Name of the operator as used in s-expressions. Leaves return `None`.
fn op_name<'a>(expr: &Expr, ctx: &'a Context) -> Option<&'a str> {
    let name = match expr {
        Expr::Var { .. }
        | Expr::Symbol { .. }
        | Expr::Param { .. }
        | Expr::BoolLit(_)
        | Expr::IntLit(_) => return None,
        Expr::Not(_) => "not",
        Expr::Neg(_) => "-",
        Expr::And(_, _) => "and",
        Expr::Or(_, _) => "or",
        Expr::Implies(_, _) => "=>",
        Expr::Xor(_, _) => "xor",
        Expr::Equal(_, _) => "=",
        Expr::Distinct(_, _) => "distinct",
        Expr::Add(_, _) => "+",
        Expr::Sub(_, _) => "-",
        Expr::Mul(_, _) => "*",
        Expr::Div(_, _) => "div",
        Expr::Mod(_, _) => "mod",
        Expr::Less(_, _) => "<",
        Expr::LessEqual(_, _) => "<=",
        Expr::Greater(_, _) => ">",
        Expr::GreaterEqual(_, _) => ">=",
        Expr::Ite { .. } => "ite",
        Expr::Apply { fun, .. } => ctx.get_str(ctx.get_fun(*fun).name),
    };
    Some(name)
}

fn serialize_expr<W: Write>(expr: &Expr, ctx: &Context, writer: &mut W) -> std::io::Result<()> {
    match expr {
        Expr::Var { name, tag, .. } => write!(writer, "({tag} {})", ctx.get_str(*name)),
        Expr::Symbol { name, .. } | Expr::Param { name, .. } => {
            write!(writer, "{}", ctx.get_str(*name))
        }
        Expr::BoolLit(value) => write!(writer, "{value}"),
        Expr::IntLit(value) if *value < 0 => write!(writer, "(- {})", value.unsigned_abs()),
        Expr::IntLit(value) => write!(writer, "{value}"),
        Expr::Apply { args, .. } if args.is_empty() => {
            write!(writer, "{}", op_name(expr, ctx).unwrap_or_default())
        }
        other => {
            write!(writer, "({}", op_name(other, ctx).unwrap_or_default())?;
            let mut res = Ok(());
            other.for_each_child(|c| {
                if res.is_ok() {
                    res = write!(writer, " ").and_then(|_| c.serialize(ctx, writer));
                }
            });
            res?;
            write!(writer, ")")
        }
    }
}

fn serialize_signature<'a, W: Write>(
    ctx: &Context,
    vars: impl Iterator<Item = &'a StateVariable>,
    writer: &mut W,
) -> std::io::Result<()> {
    write!(writer, "(")?;
    for (ii, var) in vars.enumerate() {
        if ii > 0 {
            write!(writer, " ")?;
        }
        write!(writer, "({} {})", ctx.get_str(var.name), var.sort)?;
    }
    write!(writer, ")")
}

fn serialize_transition_system<W: Write>(
    ctx: &Context,
    sys: &TransitionSystem,
    writer: &mut W,
) -> std::io::Result<()> {
    write!(writer, "(define-sys {} ", sys.name)?;
    serialize_signature(ctx, sys.signature.iter(), writer)?;
    if !sys.locals.is_empty() {
        write!(writer, " (local ")?;
        serialize_signature(ctx, sys.locals.iter(), writer)?;
        write!(writer, ")")?;
    }
    writeln!(writer)?;
    write!(writer, "  ")?;
    sys.init.serialize(ctx, writer)?;
    writeln!(writer)?;
    write!(writer, "  ")?;
    sys.trans.serialize(ctx, writer)?;
    writeln!(writer)?;
    write!(writer, "  (")?;
    for (ii, inst) in sys.composition.iter().enumerate() {
        if ii > 0 {
            write!(writer, "\n   ")?;
        }
        write!(writer, "({}", inst.system)?;
        for (curr, next) in inst.args.iter() {
            write!(writer, " ")?;
            curr.serialize(ctx, writer)?;
            write!(writer, " ")?;
            next.serialize(ctx, writer)?;
        }
        write!(writer, ")")?;
    }
    writeln!(writer, "))")
}

impl SerializableIrNode for TransitionSystem {
    fn serialize<W: Write>(&self, ctx: &Context, writer: &mut W) -> std::io::Result<()> {
        serialize_transition_system(ctx, self, writer)
    }
}

/// Serializes a flat `(Init, Trans)` pair over an explicit variable list.
pub(crate) fn serialize_flat_system<W: Write>(
    ctx: &Context,
    name: &str,
    variables: &[StateVariable],
    init: ExprRef,
    trans: ExprRef,
    writer: &mut W,
) -> std::io::Result<()> {
    write!(writer, "(define-sys {name} ")?;
    serialize_signature(ctx, variables.iter(), writer)?;
    writeln!(writer)?;
    write!(writer, "  ")?;
    init.serialize(ctx, writer)?;
    writeln!(writer)?;
    write!(writer, "  ")?;
    trans.serialize(ctx, writer)?;
    writeln!(writer, "\n  ())")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Sort, StateSignature};

    #[test]
    fn simple_serialization() {
        let mut ctx = Context::default();
        let out = ctx.curr("out", Sort::Int);
        assert_eq!("(curr out)", out.serialize_to_str(&ctx));
        let minus_five = ctx.int_lit(-5);
        assert_eq!("(- 5)", minus_five.serialize_to_str(&ctx));
        let out_next = ctx.next("out", Sort::Int);
        let sum = ctx.add(out, minus_five);
        let eq = ctx.equal(out_next, sum);
        assert_eq!(
            "(= (next out) (+ (curr out) (- 5)))",
            eq.serialize_to_str(&ctx)
        );
    }

    #[test]
    fn serialize_apply() {
        let mut ctx = Context::default();
        let x = ctx.param("x", Sort::Int);
        let zero = ctx.int_lit(0);
        let body = ctx.greater_or_equal(x, zero);
        let nonneg = ctx.define_fun("nonneg", &[x], Sort::Bool, body).unwrap();
        let tru = ctx.tru();
        let konst = ctx.define_fun("konst", &[], Sort::Bool, tru).unwrap();
        let a = ctx.curr("a", Sort::Int);
        let call = ctx.apply(nonneg, &[a]).unwrap();
        assert_eq!("(nonneg (curr a))", call.serialize_to_str(&ctx));
        assert_eq!("(>= x 0)", body.serialize_to_str(&ctx));
        let call = ctx.apply(konst, &[]).unwrap();
        assert_eq!("konst", call.serialize_to_str(&ctx));
    }

    #[test]
    fn serialize_system() {
        let mut ctx = Context::default();
        let sig = StateSignature::new(&mut ctx, "count", &[("in", Sort::Bool)]).unwrap();
        let init = ctx.curr("in", Sort::Bool);
        let trans = ctx.tru();
        let sys = TransitionSystem::new("count", sig, init, trans);
        insta::assert_snapshot!(sys.serialize_to_str(&ctx), @r###"
        (define-sys count ((in Bool))
          (curr in)
          true
          ())
        "###);
    }
}
