//! Error types surfaced by the schema crate.
//!
//! Linking and validation never stop at the first problem: every message is
//! accumulated by [`crate::error_collector::ErrorCollector`] and surfaced in a
//! single [`SchemaError`] at the end of a phase.

use thiserror::Error;

/// All linking and validation problems found in one pass, in report order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", errors.join("\n\n"))]
pub struct SchemaError {
    pub errors: Vec<String>,
}

impl SchemaError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// True if any message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.errors.iter().any(|e| e.contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("unable to find {path}")]
    NotFound { path: String },

    #[error("{path} is ambiguous:\n  {}", candidates.join("\n  "))]
    Ambiguous {
        path: String,
        candidates: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoTypeError {
    #[error("empty type name")]
    Empty,

    #[error("malformed type name `{0}`")]
    Malformed(String),

    #[error("map key must be a scalar other than float, double or bytes: {0}")]
    InvalidMapKey(String),

    #[error("map value must not be a map: {0}")]
    NestedMap(String),

    #[error("members cannot be declared on {0}")]
    MemberOnScalar(String),

    #[error("malformed member `{0}`: expected TYPE#MEMBER")]
    MalformedMember(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("same rule(s) defined in both {kind}: {}", identifiers.join(", "))]
    ConflictingRules {
        kind: &'static str,
        identifiers: Vec<String>,
    },

    #[error("cannot set `only` together with `since` or `until`")]
    VersionConflict,

    #[error("`since` ({since}) must not be greater than `until` ({until})")]
    InvertedVersionRange { since: String, until: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologicalOrderError {
    #[error("graph has a cycle: {remaining} node(s) could not be ordered")]
    Cycle { remaining: usize },
}

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_joins_messages_with_blank_lines() {
        let err = SchemaError::new(vec!["first".to_string(), "second\n  for x".to_string()]);
        assert_eq!(err.to_string(), "first\n\nsecond\n  for x");
        assert!(err.mentions("for x"));
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn ambiguous_load_lists_candidates() {
        let err = LoadError::Ambiguous {
            path: "a.proto".to_string(),
            candidates: vec!["/x/a.proto".to_string(), "/y/a.proto".to_string()],
        };
        assert_eq!(err.to_string(), "a.proto is ambiguous:\n  /x/a.proto\n  /y/a.proto");
    }
}
