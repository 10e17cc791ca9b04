// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::error::{suggest_names, Error, Result};
use std::time::Duration;

/// How relations attached to a system are used by the verification engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationPolicy {
    /// Relations are assumed to hold in every step.
    #[default]
    Trust,
    /// Relations are proven together with the requested properties and never assumed.
    Discharge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    #[default]
    KInduction,
    /// Bounded model checking, only finds counterexamples.
    Bmc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    pub engine: Engine,
    /// Maximum induction depth, or maximum number of transitions for bounded model checking.
    pub k_max: u64,
    pub relations: RelationPolicy,
    /// Time limit for a single oracle query.
    pub oracle_timeout: Option<Duration>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            engine: Engine::KInduction,
            k_max: 20,
            relations: RelationPolicy::Trust,
            oracle_timeout: None,
        }
    }
}

const KEYS: [&str; 4] = ["engine", "k_max", "relations", "timeout_ms"];

impl VerifyOptions {
    /// Applies a textual `key = value` setting.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.trim() {
            "engine" => {
                self.engine = match value {
                    "kind" => Engine::KInduction,
                    "bmc" => Engine::Bmc,
                    other => {
                        return Err(Error::syntax(
                            key,
                            format!("expected `kind` or `bmc`, not `{other}`"),
                        ))
                    }
                };
            }
            "k_max" => {
                self.k_max = parse_number(key, value)?;
            }
            "relations" => {
                self.relations = match value {
                    "trust" => RelationPolicy::Trust,
                    "discharge" => RelationPolicy::Discharge,
                    other => {
                        return Err(Error::syntax(
                            key,
                            format!("expected `trust` or `discharge`, not `{other}`"),
                        ))
                    }
                };
            }
            "timeout_ms" => {
                let ms = parse_number(key, value)?;
                self.oracle_timeout = if ms == 0 {
                    None
                } else {
                    Some(Duration::from_millis(ms))
                };
            }
            other => {
                let suggestions = suggest_names(other, KEYS.iter().copied());
                let mut msg = "unknown option".to_string();
                if !suggestions.is_empty() {
                    msg.push_str(&format!(", did you mean: {}?", suggestions.join(", ")));
                }
                return Err(Error::syntax(other, msg));
            }
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| Error::syntax(key, format!("expected a non-negative number, not `{value}`")))
}
