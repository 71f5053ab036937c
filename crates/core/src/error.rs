use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Per-item failures
// ---------------------------------------------------------------------------

/// Category of a failure isolated to a single item of a sync pass.
///
/// Item failures never unwind the pass; they are accumulated and written to
/// the run's error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    /// A registry file could not be fetched or read.
    SourceUnavailable,
    /// A registry file could not be decoded to text.
    DecodeError,
    /// A storage write for one product (or one catalog batch) failed.
    UpsertFailure,
    /// The reset-to-available step failed.
    ResetFailure,
    /// Change detection or notification fan-out failed for one event.
    DeliveryFailure,
}

impl ItemErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source_unavailable",
            Self::DecodeError => "decode_error",
            Self::UpsertFailure => "upsert_failure",
            Self::ResetFailure => "reset_failure",
            Self::DeliveryFailure => "delivery_failure",
        }
    }
}

/// An `(item, error)` pair collected during a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub kind: ItemErrorKind,
    /// The item the failure belongs to: a file name, product code, etc.
    pub item: String,
    pub message: String,
}

impl ItemError {
    pub fn new(kind: ItemErrorKind, item: impl Into<String>, message: impl ToString) -> Self {
        Self {
            kind,
            item: item.into(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind.as_str(), self.item, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_error_display_includes_kind_item_and_message() {
        let err = ItemError::new(ItemErrorKind::UpsertFailure, "CIS001", "deadlock detected");
        assert_eq!(err.to_string(), "upsert_failure CIS001: deadlock detected");
    }

    #[test]
    fn core_error_display_validation() {
        let err = CoreError::Validation("bad range".to_string());
        assert_eq!(err.to_string(), "Validation failed: bad range");
    }
}
