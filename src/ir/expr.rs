// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ir::context::{FunRef, StringRef};
use crate::ir::ExprRef;
use smallvec::SmallVec;

/// Sort of a state variable, symbol or term.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Sort {
    Bool,
    Int,
}

impl Sort {
    pub fn is_bool(&self) -> bool {
        matches!(self, Sort::Bool)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Sort::Int)
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
        }
    }
}

/// Distinguishes references to the current state from references to the successor state.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum StateTag {
    Curr,
    Next,
}

impl StateTag {
    /// Offset of the tagged state relative to the step a term is evaluated at.
    pub fn offset(&self) -> u64 {
        match self {
            StateTag::Curr => 0,
            StateTag::Next => 1,
        }
    }
}

impl std::fmt::Display for StateTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateTag::Curr => write!(f, "curr"),
            StateTag::Next => write!(f, "next"),
        }
    }
}

/// Arguments of a function application. Most functions take very few arguments.
pub type Args = SmallVec<[ExprRef; 4]>;

/// Expression nodes. Only valid together with the [`crate::ir::Context`] they were created in.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Expr {
    // nullary
    /// A state variable of the current or the next state.
    Var {
        name: StringRef,
        sort: Sort,
        tag: StateTag,
    },
    /// An uninterpreted constant introduced by `declare-fun`. Its value never changes.
    Symbol { name: StringRef, sort: Sort },
    /// A formal argument of a `define-fun`. Only legal inside a function body.
    Param { name: StringRef, sort: Sort },
    BoolLit(bool),
    IntLit(i64),
    // unary operations
    Not(ExprRef),
    Neg(ExprRef),
    // binary operations
    And(ExprRef, ExprRef),
    Or(ExprRef, ExprRef),
    Implies(ExprRef, ExprRef),
    Xor(ExprRef, ExprRef),
    Equal(ExprRef, ExprRef),
    Distinct(ExprRef, ExprRef),
    Add(ExprRef, ExprRef),
    Sub(ExprRef, ExprRef),
    Mul(ExprRef, ExprRef),
    /// Integer division as defined by SMT-LIB (euclidean).
    Div(ExprRef, ExprRef),
    Mod(ExprRef, ExprRef),
    Less(ExprRef, ExprRef),
    LessEqual(ExprRef, ExprRef),
    Greater(ExprRef, ExprRef),
    GreaterEqual(ExprRef, ExprRef),
    // ternary
    Ite {
        cond: ExprRef,
        tru: ExprRef,
        fals: ExprRef,
    },
    /// Call of a function defined through `define-fun`.
    Apply { fun: FunRef, args: Args },
}

impl Expr {
    pub fn is_var(&self) -> bool {
        matches!(self, Expr::Var { .. })
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Expr::Symbol { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Expr::Var { .. }
                | Expr::Symbol { .. }
                | Expr::Param { .. }
                | Expr::BoolLit(_)
                | Expr::IntLit(_)
        )
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Expr::BoolLit(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Expr::BoolLit(false))
    }

    /// Name of a variable, symbol or parameter.
    pub fn leaf_name(&self) -> Option<StringRef> {
        match self {
            Expr::Var { name, .. } | Expr::Symbol { name, .. } | Expr::Param { name, .. } => {
                Some(*name)
            }
            _ => None,
        }
    }

    /// Re-creates this node with different children. `children` must be ordered the
    /// same way [`ForEachChild::for_each_child`] visits them.
    pub fn with_children(&self, children: &[ExprRef]) -> Expr {
        debug_assert_eq!(children.len(), self.num_children());
        match self {
            Expr::Not(_) => Expr::Not(children[0]),
            Expr::Neg(_) => Expr::Neg(children[0]),
            Expr::And(_, _) => Expr::And(children[0], children[1]),
            Expr::Or(_, _) => Expr::Or(children[0], children[1]),
            Expr::Implies(_, _) => Expr::Implies(children[0], children[1]),
            Expr::Xor(_, _) => Expr::Xor(children[0], children[1]),
            Expr::Equal(_, _) => Expr::Equal(children[0], children[1]),
            Expr::Distinct(_, _) => Expr::Distinct(children[0], children[1]),
            Expr::Add(_, _) => Expr::Add(children[0], children[1]),
            Expr::Sub(_, _) => Expr::Sub(children[0], children[1]),
            Expr::Mul(_, _) => Expr::Mul(children[0], children[1]),
            Expr::Div(_, _) => Expr::Div(children[0], children[1]),
            Expr::Mod(_, _) => Expr::Mod(children[0], children[1]),
            Expr::Less(_, _) => Expr::Less(children[0], children[1]),
            Expr::LessEqual(_, _) => Expr::LessEqual(children[0], children[1]),
            Expr::Greater(_, _) => Expr::Greater(children[0], children[1]),
            Expr::GreaterEqual(_, _) => Expr::GreaterEqual(children[0], children[1]),
            Expr::Ite { .. } => Expr::Ite {
                cond: children[0],
                tru: children[1],
                fals: children[2],
            },
            Expr::Apply { fun, .. } => Expr::Apply {
                fun: *fun,
                args: children.iter().copied().collect(),
            },
            leaf => leaf.clone(),
        }
    }
}

pub trait ForEachChild<T: Clone> {
    fn for_each_child(&self, visitor: impl FnMut(&T));
    fn collect_children(&self, children: &mut Vec<T>) {
        self.for_each_child(|c: &T| {
            children.push(c.clone());
        });
    }

    fn num_children(&self) -> usize;
}

impl ForEachChild<ExprRef> for Expr {
    fn for_each_child(&self, mut visitor: impl FnMut(&ExprRef)) {
        match self {
            Expr::Var { .. }
            | Expr::Symbol { .. }
            | Expr::Param { .. }
            | Expr::BoolLit(_)
            | Expr::IntLit(_) => {} // no children
            Expr::Not(e) | Expr::Neg(e) => {
                (visitor)(e);
            }
            Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Implies(a, b)
            | Expr::Xor(a, b)
            | Expr::Equal(a, b)
            | Expr::Distinct(a, b)
            | Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Mod(a, b)
            | Expr::Less(a, b)
            | Expr::LessEqual(a, b)
            | Expr::Greater(a, b)
            | Expr::GreaterEqual(a, b) => {
                (visitor)(a);
                (visitor)(b);
            }
            Expr::Ite { cond, tru, fals } => {
                (visitor)(cond);
                (visitor)(tru);
                (visitor)(fals);
            }
            Expr::Apply { args, .. } => {
                for arg in args.iter() {
                    (visitor)(arg);
                }
            }
        }
    }

    fn num_children(&self) -> usize {
        match self {
            Expr::Var { .. }
            | Expr::Symbol { .. }
            | Expr::Param { .. }
            | Expr::BoolLit(_)
            | Expr::IntLit(_) => 0,
            Expr::Not(_) | Expr::Neg(_) => 1,
            Expr::Ite { .. } => 3,
            Expr::Apply { args, .. } => args.len(),
            _ => 2,
        }
    }
}
