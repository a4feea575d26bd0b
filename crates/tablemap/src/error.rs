//! Errors

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Translation and generation errors.
///
/// Every variant is raised synchronously while a predicate is compiled or a statement is
/// generated. Nothing is deferred into the emitted SQL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No class map could be resolved for the entity type.
    #[error("no class map resolvable for entity `{entity}`")]
    MappingNotFound { entity: String },

    /// More than one explicit mapper targets the same entity type.
    #[error("{count} mappers registered for entity `{entity}`; expected at most one")]
    AmbiguousMapper { entity: String, count: usize },

    /// A predicate, sort or update references an unknown or ignored property.
    #[error("property `{property}` is not mapped on entity `{entity}`")]
    UnmappedProperty { entity: String, property: String },

    /// The condition tree contains a node the compiler cannot translate.
    #[error("unsupported expression shape: {shape}")]
    UnsupportedExpressionShape { shape: String },

    /// None, or more than one, of {key, predicate, match object} was supplied.
    #[error("{statement} requires exactly one of key, predicate or match object; {supplied} supplied")]
    InvalidUpdateTarget { statement: &'static str, supplied: usize },

    /// An UPDATE resolved to no assignable properties.
    #[error("update of entity `{entity}` assigns no writable properties")]
    EmptyUpdate { entity: String },

    /// The statement needs a key but the class map declares none.
    #[error("entity `{entity}` has no key property")]
    MissingKeyStrategy { entity: String },

    /// A class map violates its invariants.
    #[error("invalid class map for entity `{entity}`: {reason}")]
    InvalidMapping { entity: String, reason: String },

    /// A predicate node is well formed structurally but cannot be rendered.
    #[error("invalid predicate on `{property}`: {reason}")]
    InvalidPredicate { property: String, reason: String },
}

impl Error {
    pub(crate) fn unmapped(entity: &str, property: &str) -> Self {
        Self::UnmappedProperty {
            entity: entity.to_string(),
            property: property.to_string(),
        }
    }

    pub(crate) fn unsupported(shape: impl Into<String>) -> Self {
        Self::UnsupportedExpressionShape { shape: shape.into() }
    }

    pub(crate) fn invalid_predicate(property: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            property: property.to_string(),
            reason: reason.into(),
        }
    }
}
