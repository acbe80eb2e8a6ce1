//! Audit log domain model.
//!
//! # Responsibility
//! - Capture request metadata of a completed action.
//!
//! # Invariants
//! - Instances are immutable after `AuditLog::create`; no setters exist.
//! - `request_uri` and `method` are always present and stored exactly as
//!   given; any HTTP request line can be audited.
//! - `status_code` is stored verbatim, without range checks.

use super::{Entity, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// Immutable record of a triggering action's request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    id: Option<EntityId>,
    request_uri: String,
    status_code: i32,
    method: String,
    ip_address: Option<String>,
    created_at: Option<i64>,
}

impl AuditLog {
    /// Builds a new, not yet persisted audit entry.
    ///
    /// # Errors
    /// - `request_uri` or `method` is blank.
    pub fn create(
        request_uri: &str,
        status_code: i32,
        method: &str,
        ip_address: Option<&str>,
    ) -> Result<Self, ValidationError> {
        require_present("request_uri", "request uri is required", request_uri)?;
        require_present("method", "http method is required", method)?;

        Ok(Self {
            id: None,
            request_uri: request_uri.to_string(),
            status_code,
            method: method.to_string(),
            ip_address: ip_address.map(str::to_string),
            created_at: None,
        })
    }

    /// Rehydrates a stored row. Used by repositories only.
    pub(crate) fn from_storage(
        id: EntityId,
        request_uri: String,
        status_code: i32,
        method: String,
        ip_address: Option<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: Some(id),
            request_uri,
            status_code,
            method,
            ip_address,
            created_at: Some(created_at),
        }
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Epoch milliseconds; set once persisted.
    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }
}

impl Entity for AuditLog {
    const NAME: &'static str = "audit log";

    fn id(&self) -> Option<EntityId> {
        self.id
    }
}

fn require_present(
    field: &'static str,
    message: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::AuditLog;

    #[test]
    fn create_stores_fields_exactly() {
        let entry =
            AuditLog::create(" /items ", 201, "post", Some(" 10.0.0.1 ")).expect("valid entry");
        assert_eq!(entry.request_uri(), " /items ");
        assert_eq!(entry.method(), "post");
        assert_eq!(entry.ip_address(), Some(" 10.0.0.1 "));
        assert_eq!(entry.status_code(), 201);
    }

    #[test]
    fn create_accepts_any_request_line() {
        let options = AuditLog::create("*", 200, "OPTIONS", None).expect("asterisk form");
        assert_eq!(options.request_uri(), "*");
        assert_eq!(options.method(), "OPTIONS");

        let search = AuditLog::create("/", 200, "M-SEARCH", None).expect("extension method");
        assert_eq!(search.method(), "M-SEARCH");

        let absolute = AuditLog::create("https://api.example.com/items/1", 204, "DELETE", None)
            .expect("absolute uri");
        assert_eq!(absolute.request_uri(), "https://api.example.com/items/1");
    }

    #[test]
    fn create_keeps_status_code_verbatim() {
        let entry = AuditLog::create("/odd", 799, "GET", None).expect("valid entry");
        assert_eq!(entry.status_code(), 799);
    }

    #[test]
    fn create_rejects_missing_uri_or_method() {
        assert_eq!(
            AuditLog::create("", 200, "GET", None)
                .expect_err("blank uri must fail")
                .field,
            "request_uri"
        );
        assert_eq!(
            AuditLog::create("/items", 200, " ", None)
                .expect_err("blank method must fail")
                .field,
            "method"
        );
    }
}
