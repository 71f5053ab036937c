//! Alert (subscription) types, matching rules and notification templates.
//!
//! Pure functions used by the notification fan-out engine.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::availability::MedicationStatus;
use crate::types::{DbId, Timestamp};

/// Value of the `type` key in every push / in-app payload.
pub const NOTIFICATION_TYPE: &str = "MEDICATION_STATUS";

// ---------------------------------------------------------------------------
// AlertType
// ---------------------------------------------------------------------------

/// What a user asked to be alerted about for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Available,
    Tension,
    Shortage,
    AnyChange,
    /// Forecast-based alerts; never triggered by an observed status change.
    Prediction,
}

impl AlertType {
    /// Return the alert type as stored in `alerts.alert_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Tension => "TENSION",
            Self::Shortage => "SHORTAGE",
            Self::AnyChange => "ANY_CHANGE",
            Self::Prediction => "PREDICTION",
        }
    }

    /// Parse a stored alert type. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(Self::Available),
            "TENSION" => Some(Self::Tension),
            "SHORTAGE" => Some(Self::Shortage),
            "ANY_CHANGE" => Some(Self::AnyChange),
            "PREDICTION" => Some(Self::Prediction),
            _ => None,
        }
    }

    /// Whether an alert of this type fires for a change to `new_status`.
    pub fn matches(&self, new_status: MedicationStatus) -> bool {
        match self {
            Self::AnyChange => true,
            Self::Available => new_status == MedicationStatus::Available,
            Self::Tension => new_status == MedicationStatus::Tension,
            Self::Shortage => new_status == MedicationStatus::Shortage,
            Self::Prediction => false,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a stored alert type string matches a status change.
///
/// Unknown stored values never match.
pub fn alert_type_matches(stored: &str, new_status: MedicationStatus) -> bool {
    AlertType::from_str(stored).is_some_and(|t| t.matches(new_status))
}

/// Whether an alert notified at `last_notified` is still inside the
/// throttle window at `now`. A zero window disables throttling.
pub fn is_throttled(last_notified: Option<Timestamp>, now: Timestamp, min_interval: Duration) -> bool {
    if min_interval <= Duration::zero() {
        return false;
    }
    last_notified.is_some_and(|at| now - at < min_interval)
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Rendered title and body of a status notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationTemplate {
    pub title: String,
    pub body: String,
}

/// Render the status-specific notification text for a product.
pub fn status_template(status: MedicationStatus, product_name: &str) -> NotificationTemplate {
    let (title, body) = match status {
        MedicationStatus::Available => (
            "Médicament disponible",
            format!("{product_name} est de nouveau disponible."),
        ),
        MedicationStatus::Tension => (
            "Tension d'approvisionnement",
            format!("{product_name} est en tension d'approvisionnement."),
        ),
        MedicationStatus::Shortage => (
            "Rupture de stock",
            format!("{product_name} est en rupture de stock."),
        ),
        MedicationStatus::Unknown => (
            "Statut mis à jour",
            format!("Le statut de {product_name} a changé."),
        ),
    };
    NotificationTemplate {
        title: title.to_string(),
        body,
    }
}

/// Structured data attached to push and in-app notifications.
pub fn notification_data(
    product_id: DbId,
    status: MedicationStatus,
    product_name: &str,
) -> serde_json::Value {
    serde_json::json!({
        "type": NOTIFICATION_TYPE,
        "productId": product_id,
        "status": status.as_str(),
        "productName": product_name,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn shortage_change_matches_shortage_and_any_change_only() {
        let matched: Vec<AlertType> = [
            AlertType::Available,
            AlertType::Tension,
            AlertType::Shortage,
            AlertType::AnyChange,
            AlertType::Prediction,
        ]
        .into_iter()
        .filter(|t| t.matches(MedicationStatus::Shortage))
        .collect();
        assert_eq!(matched, vec![AlertType::Shortage, AlertType::AnyChange]);
    }

    #[test]
    fn available_change_matches_available_alerts() {
        assert!(AlertType::Available.matches(MedicationStatus::Available));
        assert!(!AlertType::Tension.matches(MedicationStatus::Available));
    }

    #[test]
    fn unknown_stored_type_never_matches() {
        assert!(!alert_type_matches("SOMETIMES", MedicationStatus::Shortage));
        assert!(alert_type_matches("ANY_CHANGE", MedicationStatus::Tension));
    }

    #[test]
    fn throttle_window() {
        let now = Utc::now();
        let window = Duration::hours(1);
        assert!(is_throttled(Some(now - Duration::minutes(10)), now, window));
        assert!(!is_throttled(Some(now - Duration::hours(2)), now, window));
        assert!(!is_throttled(None, now, window));
        assert!(!is_throttled(Some(now), now, Duration::zero()));
    }

    #[test]
    fn templates_mention_product_name() {
        let t = status_template(MedicationStatus::Shortage, "DOLIPRANE 1000mg");
        assert_eq!(t.title, "Rupture de stock");
        assert!(t.body.contains("DOLIPRANE 1000mg"));

        let t = status_template(MedicationStatus::Available, "X");
        assert!(t.body.contains("disponible"));
    }

    #[test]
    fn notification_data_has_required_keys() {
        let data = notification_data(42, MedicationStatus::Tension, "X");
        assert_eq!(data["type"], "MEDICATION_STATUS");
        assert_eq!(data["productId"], 42);
        assert_eq!(data["status"], "TENSION");
        assert_eq!(data["productName"], "X");
    }
}
