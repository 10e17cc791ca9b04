// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

//! Compositional transition systems and k-induction invariant checking.

pub mod elab;
pub mod error;
pub mod ir;
pub mod mc;
pub mod session;
pub mod smt;

pub use error::{Error, OracleError, Result};
pub use session::{exit_code, Loader, Model, TaskReport, FATAL_EXIT_CODE};
