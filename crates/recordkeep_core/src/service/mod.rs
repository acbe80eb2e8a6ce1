//! Business-logic layer.
//!
//! # Responsibility
//! - Implement the entity-agnostic CRUD skeleton once (`CrudLogic`).
//! - Add entity-specific extensions by composition (`ItemLogic`,
//!   `AuditLogLogic`).
//! - Convert every failure into a result envelope.
//!
//! # Invariants
//! - Public operations never return raw repository errors.
//! - Only consumer-friendly messages reach callers verbatim; everything else
//!   is replaced by `GENERIC_FAILURE_MESSAGE` and logged.
//! - A failed operation leaves no uncommitted writes behind in its scope.

use crate::model::{EntityId, ValidationError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod audit_log_logic;
pub mod crud;
pub mod item_logic;
pub mod mapping;

pub const GENERIC_FAILURE_MESSAGE: &str =
    "An unexpected error occurred while processing the request.";
pub const CANCELLED_MESSAGE: &str = "The operation was cancelled.";

/// Failure raised inside a business-logic operation.
#[derive(Debug)]
pub enum BusinessError {
    /// Entity factory rejected its input.
    Validation(ValidationError),
    /// Operation-level input rule failed (e.g. empty batch).
    InvalidInput(String),
    NotFound { entity: &'static str, id: EntityId },
    Conflict(String),
    Cancelled,
    /// Any other persistence failure; never shown to callers.
    Repo(RepoError),
}

impl BusinessError {
    /// Message safe to hand to callers, or `None` when the error must be
    /// hidden behind the generic message.
    pub fn consumer_message(&self) -> Option<String> {
        match self {
            Self::Validation(err) => Some(err.message.clone()),
            Self::InvalidInput(message) | Self::Conflict(message) => Some(message.clone()),
            Self::NotFound { entity, id } => Some(format!("The {entity} `{id}` was not found.")),
            Self::Cancelled => Some(CANCELLED_MESSAGE.to_string()),
            Self::Repo(_) => None,
        }
    }

    pub fn is_consumer_friendly(&self) -> bool {
        !matches!(self, Self::Repo(_))
    }
}

impl Display for BusinessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BusinessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for BusinessError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for BusinessError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict(message) => Self::Conflict(message),
            RepoError::Cancelled => Self::Cancelled,
            other => Self::Repo(other),
        }
    }
}
