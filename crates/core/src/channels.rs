//! Well-known notification channel name constants.
//!
//! These must match the values stored in the `notifications.channel` column.

/// Stored for the in-app history of a user with no active push endpoint.
pub const CHANNEL_IN_APP: &str = "in_app";

/// Delivered as a mobile push notification (and kept as in-app history).
pub const CHANNEL_PUSH: &str = "push";

/// Delivered via SMTP.
pub const CHANNEL_EMAIL: &str = "email";
