//! Medication availability status and the shortage-text classification rule.
//!
//! Pure functions and constants with no I/O. The status strings are the
//! values stored in `products.status` and `status_history.status`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// MedicationStatus
// ---------------------------------------------------------------------------

/// Canonical availability of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicationStatus {
    Available,
    Tension,
    Shortage,
    Unknown,
}

impl MedicationStatus {
    /// Return the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Tension => "TENSION",
            Self::Shortage => "SHORTAGE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a stored status string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(Self::Available),
            "TENSION" => Some(Self::Tension),
            "SHORTAGE" => Some(Self::Shortage),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// All valid status values.
    pub const ALL: &'static [&'static str] = &["AVAILABLE", "TENSION", "SHORTAGE", "UNKNOWN"];

    /// Fan-out priority: lower ranks are notified first.
    ///
    /// Shortages take precedence over tensions, which take precedence over
    /// returns to availability.
    pub fn fanout_rank(&self) -> u8 {
        match self {
            Self::Shortage => 0,
            Self::Tension => 1,
            Self::Available => 2,
            Self::Unknown => 3,
        }
    }
}

impl std::fmt::Display for MedicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Substring marking a national stock-out in the shortage status text.
const RUPTURE_KEYWORD: &str = "rupture";

/// Substring marking local supply tension in the shortage status text.
const TENSION_KEYWORD: &str = "tension";

/// Policy applied when turning shortage-file text into a status.
///
/// `unrecognized` is the status assigned to shortage entries whose text
/// matches neither keyword. The regulator does not document this case, so it
/// is configurable; the default is [`MedicationStatus::Tension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationPolicy {
    pub unrecognized: MedicationStatus,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            unrecognized: MedicationStatus::Tension,
        }
    }
}

impl ClassificationPolicy {
    /// Build a policy from a configured fallback status name.
    ///
    /// Only `TENSION` and `SHORTAGE` are accepted: an entry in the shortage
    /// file always signals some supply problem.
    pub fn with_fallback(name: &str) -> Result<Self, CoreError> {
        match MedicationStatus::from_str(&name.trim().to_uppercase()) {
            Some(status @ (MedicationStatus::Tension | MedicationStatus::Shortage)) => {
                Ok(Self {
                    unrecognized: status,
                })
            }
            _ => Err(CoreError::Validation(format!(
                "Unrecognized-shortage fallback must be TENSION or SHORTAGE, got '{name}'"
            ))),
        }
    }

    /// Classify a shortage-file status text.
    ///
    /// "rupture" wins over "tension" when both appear.
    pub fn classify(&self, status_text: &str) -> MedicationStatus {
        let lowered = status_text.to_lowercase();
        if lowered.contains(RUPTURE_KEYWORD) {
            MedicationStatus::Shortage
        } else if lowered.contains(TENSION_KEYWORD) {
            MedicationStatus::Tension
        } else {
            self.unrecognized
        }
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse a date as written in the registry files.
///
/// The regulator writes `DD/MM/YYYY`; ISO `YYYY-MM-DD` is accepted too.
/// Returns `None` for empty or unparsable input.
pub fn parse_registry_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_from_str_agree_for_all_values() {
        for name in MedicationStatus::ALL {
            let status = MedicationStatus::from_str(name).unwrap();
            assert_eq!(status.as_str(), *name);
        }
        assert_eq!(MedicationStatus::from_str("available"), None);
    }

    #[test]
    fn rupture_text_is_shortage_case_insensitive() {
        let policy = ClassificationPolicy::default();
        for text in ["rupture de stock", "Rupture de stock", "RUPTURE", "remise en rupture"] {
            assert_eq!(policy.classify(text), MedicationStatus::Shortage, "{text}");
        }
    }

    #[test]
    fn tension_text_is_tension() {
        let policy = ClassificationPolicy::default();
        for text in ["Tension d'approvisionnement", "TENSION", "forte tension"] {
            assert_eq!(policy.classify(text), MedicationStatus::Tension, "{text}");
        }
    }

    #[test]
    fn rupture_wins_over_tension() {
        let policy = ClassificationPolicy::default();
        assert_eq!(
            policy.classify("tension puis rupture"),
            MedicationStatus::Shortage
        );
    }

    #[test]
    fn unrecognized_text_defaults_to_tension() {
        let policy = ClassificationPolicy::default();
        assert_eq!(policy.classify("Arrêt de commercialisation"), MedicationStatus::Tension);
        assert_eq!(policy.classify("remise à disposition"), MedicationStatus::Tension);
    }

    #[test]
    fn fallback_is_configurable() {
        let policy = ClassificationPolicy::with_fallback("shortage").unwrap();
        assert_eq!(policy.classify("inconnu"), MedicationStatus::Shortage);
        assert_eq!(policy.classify("tension"), MedicationStatus::Tension);
    }

    #[test]
    fn fallback_rejects_available() {
        assert!(ClassificationPolicy::with_fallback("AVAILABLE").is_err());
        assert!(ClassificationPolicy::with_fallback("whatever").is_err());
    }

    #[test]
    fn fanout_rank_orders_shortage_first() {
        assert!(MedicationStatus::Shortage.fanout_rank() < MedicationStatus::Tension.fanout_rank());
        assert!(MedicationStatus::Tension.fanout_rank() < MedicationStatus::Available.fanout_rank());
    }

    #[test]
    fn parses_french_and_iso_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(parse_registry_date("31/01/2024"), Some(expected));
        assert_eq!(parse_registry_date(" 2024-01-31 "), Some(expected));
        assert_eq!(parse_registry_date(""), None);
        assert_eq!(parse_registry_date("soon"), None);
    }

    #[test]
    fn serde_uses_screaming_case() {
        let json = serde_json::to_string(&MedicationStatus::Shortage).unwrap();
        assert_eq!(json, "\"SHORTAGE\"");
    }
}
