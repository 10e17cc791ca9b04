// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
mod analysis;
mod context;
mod eval;
mod expr;
mod serialize;
mod transform;
mod transition_system;
mod traversal;
mod type_check;

pub use analysis::{
    collect_funs, collect_leaves, collect_vars, is_one_state, ExprMetaData, VarUse,
};
pub use context::{Context, ExprRef, FunDef, FunRef, StringRef, STEP_SEPARATOR};
pub use eval::{eval, EvalError, GetExprValue, StepValues, Value};
pub use expr::{Args, Expr, ForEachChild, Sort, StateTag};
pub(crate) use serialize::serialize_flat_system;
pub use serialize::SerializableIrNode;
pub use transform::{substitute, transform_exprs, VarSubstitution};
pub use transition_system::{StateSignature, StateVariable, SubsystemInstance, TransitionSystem};
pub use traversal::bottom_up;
pub use type_check::{TypeCheck, TypeCheckError};
