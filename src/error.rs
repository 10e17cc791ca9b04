// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while loading and elaborating a model.
/// Each variant names the form (`id`) that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("syntax error in `{id}`: {msg}")]
    Syntax { id: String, msg: String },
    #[error("declaration error in `{id}`: {msg}")]
    Declaration { id: String, msg: String },
    #[error("unknown system `{id}`{}", suggestion_suffix(.suggestions))]
    UnknownSystem { id: String, suggestions: Vec<String> },
    #[error("arity error in `{id}`: {msg}")]
    Arity { id: String, msg: String },
    #[error("type error in `{id}`: {msg}")]
    Type { id: String, msg: String },
    #[error("composition cycle: {}", .path.join(" -> "))]
    CompositionCycle { path: Vec<String> },
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl Error {
    pub(crate) fn syntax(id: impl ToString, msg: impl ToString) -> Self {
        Error::Syntax {
            id: id.to_string(),
            msg: msg.to_string(),
        }
    }

    pub(crate) fn declaration(id: impl ToString, msg: impl ToString) -> Self {
        Error::Declaration {
            id: id.to_string(),
            msg: msg.to_string(),
        }
    }

    pub(crate) fn arity(id: impl ToString, msg: impl ToString) -> Self {
        Error::Arity {
            id: id.to_string(),
            msg: msg.to_string(),
        }
    }

    pub(crate) fn tpe(id: impl ToString, msg: impl ToString) -> Self {
        Error::Type {
            id: id.to_string(),
            msg: msg.to_string(),
        }
    }

    /// Elaboration errors invalidate everything loaded after them, oracle errors only
    /// affect a single verification task.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Oracle(_))
    }

    /// The identifier of the offending form, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Error::Syntax { id, .. }
            | Error::Declaration { id, .. }
            | Error::UnknownSystem { id, .. }
            | Error::Arity { id, .. }
            | Error::Type { id, .. } => Some(id),
            Error::CompositionCycle { path } => path.first().map(|s| s.as_str()),
            Error::Oracle(_) => None,
        }
    }
}

/// Runtime failures of a decision procedure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle timed out")]
    Timeout,
    #[error("oracle resource error: {0}")]
    Resource(String),
}

impl From<std::io::Error> for OracleError {
    fn from(value: std::io::Error) -> Self {
        OracleError::Resource(value.to_string())
    }
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(", did you mean: {}?", suggestions.join(", "))
    }
}

/// Returns up to five known names that look similar to `name`, best match first.
pub fn suggest_names<'a>(name: &str, known: impl Iterator<Item = &'a str>) -> Vec<String> {
    let matcher = SkimMatcherV2::default();
    let mut matches: Vec<(i64, &str)> = known
        .flat_map(|other| matcher.fuzzy_match(other, name).map(|s| (s, other)))
        .collect();
    matches.sort_by_key(|(score, _)| -(*score));
    matches
        .into_iter()
        .take(5)
        .map(|(_, n)| n.to_string())
        .collect()
}
