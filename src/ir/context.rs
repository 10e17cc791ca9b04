// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{Error, Result};
use crate::ir::analysis::collect_leaves;
use crate::ir::expr::*;
use crate::ir::TypeCheck;
use std::fmt::{Debug, Formatter};
use std::num::NonZeroU32;

/// Separates a state variable name from its step once a system is unrolled.
pub const STEP_SEPARATOR: char = '@';

#[derive(PartialEq, Eq, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct StringRef(NonZeroU32);

impl Debug for StringRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StringRef({})", self.index())
    }
}

impl StringRef {
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new((index + 1) as u32).unwrap())
    }

    fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ExprRef(NonZeroU32);

impl Debug for ExprRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // we need a custom implementation in order to show the zero based index
        write!(f, "ExprRef({})", self.index())
    }
}

impl ExprRef {
    pub fn from_index(index: usize) -> Self {
        ExprRef(NonZeroU32::new((index + 1) as u32).unwrap())
    }

    pub(crate) fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Refers to a function introduced through `define-fun`.
#[derive(PartialEq, Eq, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct FunRef(NonZeroU32);

impl Debug for FunRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FunRef({})", self.index())
    }
}

impl FunRef {
    fn from_index(index: usize) -> Self {
        FunRef(NonZeroU32::new((index + 1) as u32).unwrap())
    }

    pub(crate) fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// A function macro. Applications are expanded by the oracle or evaluated by binding the
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunDef {
    pub name: StringRef,
    /// `Expr::Param` nodes in declaration order.
    pub params: Vec<ExprRef>,
    pub sort: Sort,
    pub body: ExprRef,
}

/// Context which is used to create all expressions. Expressions are interned such that
/// reference equivalence implies structural equivalence.
#[derive(Clone, Default)]
pub struct Context {
    strings: indexmap::IndexSet<String>,
    exprs: indexmap::IndexSet<Expr>,
    funs: indexmap::IndexMap<StringRef, FunDef>,
    symbols: indexmap::IndexMap<StringRef, ExprRef>,
}

/// Adding and removing nodes.
impl Context {
    pub fn get(&self, reference: ExprRef) -> &Expr {
        self.exprs
            .get_index(reference.index())
            .expect("Invalid ExprRef!")
    }

    pub(crate) fn add_expr(&mut self, value: Expr) -> ExprRef {
        let (index, _) = self.exprs.insert_full(value);
        ExprRef::from_index(index)
    }

    pub fn get_str(&self, reference: StringRef) -> &str {
        self.strings
            .get_index(reference.index())
            .expect("Invalid StringRef!")
    }

    pub fn string(&mut self, value: std::borrow::Cow<str>) -> StringRef {
        if let Some(index) = self.strings.get_index_of(value.as_ref()) {
            StringRef::from_index(index)
        } else {
            let (index, _) = self.strings.insert_full(value.into_owned());
            StringRef::from_index(index)
        }
    }

    /// Looks up a string without interning it.
    pub fn find_str(&self, value: &str) -> Option<StringRef> {
        self.strings.get_index_of(value).map(StringRef::from_index)
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }
}

/// Global function and symbol tables.
impl Context {
    /// Declares an uninterpreted constant. The returned expression can be used in any term.
    pub fn declare_fun(&mut self, name: &str, sort: Sort) -> Result<ExprRef> {
        let name_ref = self.string(name.into());
        self.check_global_name_is_free(name, name_ref)?;
        let symbol = self.add_expr(Expr::Symbol {
            name: name_ref,
            sort,
        });
        self.symbols.insert(name_ref, symbol);
        Ok(symbol)
    }

    /// Defines a function macro. `params` must be distinct `Expr::Param` nodes and the
    /// body may only refer to those parameters, to declared symbols and to other functions.
    pub fn define_fun(
        &mut self,
        name: &str,
        params: &[ExprRef],
        sort: Sort,
        body: ExprRef,
    ) -> Result<FunRef> {
        let name_ref = self.string(name.into());
        self.check_global_name_is_free(name, name_ref)?;
        let mut param_names = Vec::with_capacity(params.len());
        for &p in params.iter() {
            match self.get(p) {
                Expr::Param { name: pn, .. } => {
                    if param_names.contains(pn) {
                        return Err(Error::declaration(
                            name,
                            format!("parameter `{}` is declared twice", self.get_str(*pn)),
                        ));
                    }
                    param_names.push(*pn);
                }
                _ => {
                    return Err(Error::declaration(
                        name,
                        "function parameters need to be plain parameter declarations",
                    ))
                }
            }
        }
        for leaf in collect_leaves(self, body) {
            match self.get(leaf) {
                Expr::Var { name: vn, .. } => {
                    return Err(Error::declaration(
                        name,
                        format!(
                            "function bodies may not refer to state variable `{}`",
                            self.get_str(*vn)
                        ),
                    ))
                }
                Expr::Param { .. } if !params.contains(&leaf) => {
                    return Err(Error::declaration(
                        name,
                        format!("unbound parameter `{}`", self.get_str(self.leaf_name(leaf))),
                    ))
                }
                _ => {}
            }
        }
        let body_sort = body.type_check_deep(self).map_err(|e| e.in_form(name))?;
        if body_sort != sort {
            return Err(Error::tpe(
                name,
                format!("declared to return {sort}, but the body is of sort {body_sort}"),
            ));
        }
        let (index, _) = self.funs.insert_full(
            name_ref,
            FunDef {
                name: name_ref,
                params: params.to_vec(),
                sort,
                body,
            },
        );
        Ok(FunRef::from_index(index))
    }

    fn check_global_name_is_free(&self, name: &str, name_ref: StringRef) -> Result<()> {
        if self.funs.contains_key(&name_ref) || self.symbols.contains_key(&name_ref) {
            Err(Error::declaration(name, "already declared"))
        } else if name.contains(STEP_SEPARATOR) {
            // unrolled state variables are named `name@step`
            Err(Error::declaration(
                name,
                format!("global names may not contain `{STEP_SEPARATOR}`"),
            ))
        } else {
            Ok(())
        }
    }

    fn leaf_name(&self, e: ExprRef) -> StringRef {
        self.get(e)
            .leaf_name()
            .expect("only called on named leaves")
    }

    pub fn get_fun(&self, fun: FunRef) -> &FunDef {
        self.funs
            .get_index(fun.index())
            .map(|(_, f)| f)
            .expect("Invalid FunRef!")
    }

    pub fn lookup_fun(&self, name: &str) -> Option<FunRef> {
        let name_ref = self.find_str(name)?;
        self.funs.get_index_of(&name_ref).map(FunRef::from_index)
    }

    pub fn lookup_symbol(&self, name: &str) -> Option<ExprRef> {
        let name_ref = self.find_str(name)?;
        self.symbols.get(&name_ref).copied()
    }

    pub fn funs(&self) -> impl Iterator<Item = (FunRef, &FunDef)> + '_ {
        self.funs
            .values()
            .enumerate()
            .map(|(ii, f)| (FunRef::from_index(ii), f))
    }

    pub fn symbols(&self) -> impl Iterator<Item = ExprRef> + '_ {
        self.symbols.values().copied()
    }
}

/// Convenience methods to construct IR nodes.
impl Context {
    pub fn var(&mut self, name: &str, sort: Sort, tag: StateTag) -> ExprRef {
        let name_ref = self.string(name.into());
        self.add_expr(Expr::Var {
            name: name_ref,
            sort,
            tag,
        })
    }
    pub fn curr(&mut self, name: &str, sort: Sort) -> ExprRef {
        self.var(name, sort, StateTag::Curr)
    }
    pub fn next(&mut self, name: &str, sort: Sort) -> ExprRef {
        self.var(name, sort, StateTag::Next)
    }
    pub fn param(&mut self, name: &str, sort: Sort) -> ExprRef {
        let name_ref = self.string(name.into());
        self.add_expr(Expr::Param {
            name: name_ref,
            sort,
        })
    }
    pub fn bool_lit(&mut self, value: bool) -> ExprRef {
        self.add_expr(Expr::BoolLit(value))
    }
    pub fn tru(&mut self) -> ExprRef {
        self.bool_lit(true)
    }
    pub fn fals(&mut self) -> ExprRef {
        self.bool_lit(false)
    }
    pub fn int_lit(&mut self, value: i64) -> ExprRef {
        self.add_expr(Expr::IntLit(value))
    }
    pub fn not(&mut self, e: ExprRef) -> ExprRef {
        self.add_expr(Expr::Not(e))
    }
    pub fn neg(&mut self, e: ExprRef) -> ExprRef {
        self.add_expr(Expr::Neg(e))
    }
    pub fn and(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::And(a, b))
    }
    pub fn or(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Or(a, b))
    }
    pub fn implies(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Implies(a, b))
    }
    pub fn xor(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Xor(a, b))
    }
    pub fn equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Equal(a, b))
    }
    pub fn distinct(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Distinct(a, b))
    }
    pub fn add(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Add(a, b))
    }
    pub fn sub(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Sub(a, b))
    }
    pub fn mul(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Mul(a, b))
    }
    pub fn div(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Div(a, b))
    }
    pub fn modulo(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Mod(a, b))
    }
    pub fn less(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Less(a, b))
    }
    pub fn less_or_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::LessEqual(a, b))
    }
    pub fn greater(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::Greater(a, b))
    }
    pub fn greater_or_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.add_expr(Expr::GreaterEqual(a, b))
    }
    pub fn ite(&mut self, cond: ExprRef, tru: ExprRef, fals: ExprRef) -> ExprRef {
        self.add_expr(Expr::Ite { cond, tru, fals })
    }

    /// Calls a previously defined function.
    pub fn apply(&mut self, fun: FunRef, args: &[ExprRef]) -> Result<ExprRef> {
        let def = self.get_fun(fun);
        if def.params.len() != args.len() {
            let name = self.get_str(def.name).to_string();
            return Err(Error::arity(
                &name,
                format!(
                    "function `{name}` expects {} arguments, got {}",
                    def.params.len(),
                    args.len()
                ),
            ));
        }
        Ok(self.add_expr(Expr::Apply {
            fun,
            args: args.iter().copied().collect(),
        }))
    }

    /// Conjunction of all terms. Literal `true` operands are skipped.
    pub fn and_many(&mut self, terms: impl IntoIterator<Item = ExprRef>) -> ExprRef {
        let mut out: Option<ExprRef> = None;
        for t in terms.into_iter() {
            if self.get(t).is_true() {
                continue;
            }
            out = Some(match out {
                None => t,
                Some(prev) => self.and(prev, t),
            });
        }
        out.unwrap_or_else(|| self.tru())
    }

    /// Disjunction of all terms. Literal `false` operands are skipped.
    pub fn or_many(&mut self, terms: impl IntoIterator<Item = ExprRef>) -> ExprRef {
        let mut out: Option<ExprRef> = None;
        for t in terms.into_iter() {
            if self.get(t).is_false() {
                continue;
            }
            out = Some(match out {
                None => t,
                Some(prev) => self.or(prev, t),
            });
        }
        out.unwrap_or_else(|| self.fals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_type_size() {
        assert_eq!(std::mem::size_of::<StringRef>(), 4);
        assert_eq!(std::mem::size_of::<ExprRef>(), 4);
        assert_eq!(std::mem::size_of::<Option<ExprRef>>(), 4);
    }

    #[test]
    fn reference_ids() {
        let mut ctx = Context::default();
        let id0 = ctx.curr("a", Sort::Int);
        assert_eq!(id0.0.get(), 1, "ids start at one (for now)");
        let id0_b = ctx.curr("a", Sort::Int);
        assert_eq!(id0, id0_b, "ids should be interned!");
        let id1 = ctx.next("a", Sort::Int);
        assert_eq!(id0.0.get() + 1, id1.0.get(), "ids should increment!");
    }

    #[test]
    fn and_many_skips_true() {
        let mut ctx = Context::default();
        let a = ctx.curr("a", Sort::Bool);
        let tru = ctx.tru();
        assert_eq!(ctx.and_many([tru, a, tru]), a);
        assert_eq!(ctx.and_many([]), tru);
        let fals = ctx.fals();
        assert_eq!(ctx.or_many([fals]), fals);
    }

    #[test]
    fn define_fun_checks_body() {
        let mut ctx = Context::default();
        let x = ctx.param("x", Sort::Int);
        let one = ctx.int_lit(1);
        let body = ctx.add(x, one);
        let inc = ctx.define_fun("inc", &[x], Sort::Int, body).unwrap();
        assert_eq!(ctx.lookup_fun("inc"), Some(inc));
        assert_eq!(ctx.get_fun(inc).sort, Sort::Int);

        // redeclaration
        assert!(matches!(
            ctx.define_fun("inc", &[x], Sort::Int, body),
            Err(Error::Declaration { .. })
        ));
        // wrong return sort
        assert!(matches!(
            ctx.define_fun("inc2", &[x], Sort::Bool, body),
            Err(Error::Type { .. })
        ));
        // state variables are not allowed
        let v = ctx.curr("v", Sort::Int);
        let bad = ctx.add(v, one);
        assert!(matches!(
            ctx.define_fun("bad", &[], Sort::Int, bad),
            Err(Error::Declaration { .. })
        ));
        // unbound parameter
        assert!(matches!(
            ctx.define_fun("unbound", &[], Sort::Int, body),
            Err(Error::Declaration { .. })
        ));
        // arity of applications
        assert!(matches!(ctx.apply(inc, &[]), Err(Error::Arity { .. })));
        assert!(ctx.apply(inc, &[one]).is_ok());
    }

    #[test]
    fn declare_fun_is_global() {
        let mut ctx = Context::default();
        let c = ctx.declare_fun("c", Sort::Int).unwrap();
        assert_eq!(ctx.lookup_symbol("c"), Some(c));
        assert!(ctx.declare_fun("c", Sort::Bool).is_err());
        let x = ctx.param("x", Sort::Int);
        assert!(ctx.define_fun("c", &[x], Sort::Int, x).is_err());
    }

    #[test]
    fn global_names_cannot_look_like_unrolled_variables() {
        let mut ctx = Context::default();
        let err = ctx.declare_fun("x@0", Sort::Int).unwrap_err();
        assert_eq!(
            err.to_string(),
            "declaration error in `x@0`: global names may not contain `@`"
        );
        let x = ctx.param("x", Sort::Int);
        assert!(ctx.define_fun("f@1", &[x], Sort::Int, x).is_err());
        assert!(ctx.lookup_symbol("x@0").is_none());
    }
}
