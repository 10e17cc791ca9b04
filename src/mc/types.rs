// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::elab::FlattenedSystem;
use crate::error::OracleError;
use crate::ir::*;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// A request to verify some properties of a system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTask {
    pub system: String,
    pub properties: Vec<String>,
    /// Overrides the configured maximum induction depth.
    pub k_max: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownReason {
    /// Neither a proof nor a counterexample was found up to the maximum depth.
    DepthExhausted,
    OracleTimeout,
    OracleResource(String),
    /// The combined proof succeeded, but the property could not be re-established on its own.
    NotCertified,
    /// A counterexample could not be evaluated, e.g., because it divides by zero.
    Evaluation(String),
}

impl Display for UnknownReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnknownReason::DepthExhausted => write!(f, "induction depth bound exhausted"),
            UnknownReason::OracleTimeout => write!(f, "oracle timeout"),
            UnknownReason::OracleResource(msg) => write!(f, "oracle resource error: {msg}"),
            UnknownReason::NotCertified => write!(f, "not certified individually"),
            UnknownReason::Evaluation(msg) => write!(f, "evaluation failed: {msg}"),
        }
    }
}

impl From<OracleError> for UnknownReason {
    fn from(value: OracleError) -> Self {
        match value {
            OracleError::Timeout => UnknownReason::OracleTimeout,
            OracleError::Resource(msg) => UnknownReason::OracleResource(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// The property is `k`-inductive.
    Proven(u64),
    Disproven(Trace),
    Unknown(UnknownReason),
}

impl VerificationResult {
    pub fn is_proven(&self) -> bool {
        matches!(self, VerificationResult::Proven(_))
    }

    pub fn is_disproven(&self) -> bool {
        matches!(self, VerificationResult::Disproven(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, VerificationResult::Unknown(_))
    }
}

/// Prints the verdict without the counterexample.
impl Display for VerificationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationResult::Proven(k) => write!(f, "PASS({k})"),
            VerificationResult::Disproven(_) => write!(f, "FAIL"),
            VerificationResult::Unknown(reason) => write!(f, "UNKNOWN({reason})"),
        }
    }
}

/// A finite path through a flattened system. Every step assigns a value to each variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub variables: Vec<StateVariable>,
    pub steps: Vec<Vec<Value>>,
    /// Values of rigid symbols.
    pub symbols: HashMap<StringRef, Value>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, ctx: &Context, name: &str, step: usize) -> Option<Value> {
        let index = self
            .variables
            .iter()
            .position(|v| ctx.get_str(v.name) == name)?;
        self.steps.get(step)?.get(index).copied()
    }

    /// Values at `step` with `next` referring to the following step, if there is one.
    /// Returns `None` if the trace is shorter than `step + 1`.
    pub fn values_at(&self, step: usize) -> Option<StepValues<'_>> {
        Some(StepValues {
            variables: &self.variables,
            curr: self.steps.get(step)?,
            next: self.steps.get(step + 1).map(|s| s.as_slice()),
            symbols: &self.symbols,
        })
    }

    /// Checks that the trace starts in an initial state of `sys` and that every pair of
    /// consecutive steps is related by its transition predicate.
    pub fn replay_check(&self, ctx: &Context, sys: &FlattenedSystem) -> Result<bool, EvalError> {
        let Some(first) = self.values_at(0) else {
            return Ok(true);
        };
        if !is_true(eval(ctx, sys.init, &first)?) {
            return Ok(false);
        }
        for step in 0..self.steps.len() - 1 {
            let Some(values) = self.values_at(step) else {
                break;
            };
            if !is_true(eval(ctx, sys.trans, &values)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn display<'a>(&'a self, ctx: &'a Context) -> DisplayTrace<'a> {
        DisplayTrace { trace: self, ctx }
    }
}

fn is_true(value: Value) -> bool {
    value.as_bool().unwrap_or(false)
}

/// Prints a trace as a table with one row per variable and one column per step.
pub struct DisplayTrace<'a> {
    trace: &'a Trace,
    ctx: &'a Context,
}

impl<'a> Display for DisplayTrace<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ctx = self.ctx;
        let names: Vec<&str> = self
            .trace
            .variables
            .iter()
            .map(|v| ctx.get_str(v.name))
            .collect();
        let name_width = names.iter().map(|n| n.len()).max().unwrap_or(0).max(4);
        let cells: Vec<Vec<String>> = self
            .trace
            .steps
            .iter()
            .map(|s| s.iter().map(|v| v.to_string()).collect())
            .collect();
        let col_width = cells
            .iter()
            .flatten()
            .map(|c| c.len())
            .chain((0..cells.len()).map(|s| s.to_string().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:<name_width$}", "step")?;
        for step in 0..cells.len() {
            write!(f, " {:>col_width$}", step)?;
        }
        writeln!(f)?;
        for (index, name) in names.iter().enumerate() {
            write!(f, "{:<name_width$}", name)?;
            for step in cells.iter() {
                write!(f, " {:>col_width$}", step[index])?;
            }
            writeln!(f)?;
        }
        let mut symbols: Vec<(&str, Value)> = self
            .trace
            .symbols
            .iter()
            .map(|(name, value)| (ctx.get_str(*name), *value))
            .collect();
        symbols.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in symbols {
            writeln!(f, "{name} = {value}")?;
        }
        Ok(())
    }
}
