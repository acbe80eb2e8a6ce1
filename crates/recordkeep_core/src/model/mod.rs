//! Entity models shared by every repository and business-logic type.
//!
//! # Responsibility
//! - Define the `Entity` capability all persisted records implement.
//! - Host per-entity factories and their validation rules.
//!
//! # Invariants
//! - Entities are built through named factories, never struct literals.
//! - `id` and `created_at` are assigned by the store at insert time.

use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod audit_log;
pub mod item;

/// Stable identifier for every persisted entity.
pub type EntityId = Uuid;

/// Capability shared by all persisted record types.
pub trait Entity: Clone + 'static {
    /// Human-readable entity name used in messages and log events.
    const NAME: &'static str;

    /// Store-assigned identifier; `None` until the entity has been inserted.
    fn id(&self) -> Option<EntityId>;
}

/// Factory-level validation failure.
///
/// Messages are safe to show to callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}
