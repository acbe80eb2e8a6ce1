//! Uniform result envelopes returned by every business-logic operation.
//!
//! # Invariants
//! - `success == false` exactly when `error_message` is set.
//! - `DataResult::data` is present only on success.
//! - Fields are private; envelopes are built only through `ok`/`fail`, so a
//!   partially populated envelope cannot exist.

use serde::Serialize;

/// Outcome of an operation without payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    success: bool,
    error_message: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Outcome of an operation carrying data on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResult<T> {
    success: bool,
    error_message: Option<String>,
    data: Option<T>,
}

impl<T> DataResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error_message: None,
            data: Some(data),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Transforms the payload, keeping a failure untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DataResult<U> {
        DataResult {
            success: self.success,
            error_message: self.error_message,
            data: self.data.map(f),
        }
    }

    /// Drops the payload.
    pub fn into_action(self) -> ActionResult {
        ActionResult {
            success: self.success,
            error_message: self.error_message,
        }
    }

    /// Converts into a plain `Result`, the error being the caller-safe message.
    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error_message) {
            (Some(data), None) => Ok(data),
            (_, Some(message)) => Err(message),
            (None, None) => Err(String::from("result carried no data")),
        }
    }
}

impl From<ActionResult> for DataResult<()> {
    fn from(value: ActionResult) -> Self {
        match value.error_message {
            None => Self::ok(()),
            Some(message) => Self::fail(message),
        }
    }
}
