// Copyright 2023 The Regents of the University of California
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@berkeley.edu>

mod bmc;
mod kind;
mod options;
mod oracle;
mod smt;
mod types;
mod unroll;

pub use bmc::Bmc;
pub use kind::KInduction;
pub use options::{Engine, RelationPolicy, VerifyOptions};
pub use oracle::{CheckResponse, Oracle, OracleResult};
pub use smt::{SmtOracle, SmtOracleOptions, SmtSolverCmd, CVC5_CMD, YICES2_CMD, Z3_CMD};
pub use types::{
    DisplayTrace, Trace, UnknownReason, VerificationResult, VerificationTask,
};
pub use unroll::StepPredicate;
