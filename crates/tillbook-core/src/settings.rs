//! # Settings Store
//!
//! Store configuration and typed system settings.
//!
//! ## Store configuration
//! One `StoreConfig` row is active at a time. It is loaded once per unit of
//! work and threaded through explicitly (the numbering service and currency
//! formatting take it as a parameter) rather than looked up by flag inside
//! domain operations.
//!
//! ## System settings
//! A generic typed key/value table. Each row declares a value kind
//! {string, boolean, integer, float, json, array} and readers receive the
//! value coerced to that kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::money::Money;

// =============================================================================
// Store Configuration
// =============================================================================

/// The active store's configuration row.
///
/// `business_hours` and `receipt_settings` are free-form JSON blobs stored
/// verbatim; `logo_path` is a path string from the file-storage collaborator,
/// never interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StoreConfig {
    pub id: String,
    pub name: String,
    pub business_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub business_registration_number: Option<String>,
    pub logo_path: Option<String>,
    /// JSON blob, raw text.
    pub business_hours: Option<String>,
    /// ISO 4217 code, e.g. "USD".
    pub currency: String,
    pub currency_symbol: String,
    /// JSON blob, raw text.
    pub receipt_settings: Option<String>,
    pub receipt_footer: Option<String>,
    /// Template consumed by the numbering service.
    pub receipt_number_format: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoreConfig {
    /// Parsed business hours, if present and valid JSON.
    pub fn business_hours_json(&self) -> Option<Value> {
        self.business_hours
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Parsed receipt settings, if present and valid JSON.
    pub fn receipt_settings_json(&self) -> Option<Value> {
        self.receipt_settings
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Currency symbol followed by the amount with thousands separators and
    /// exactly two fractional digits: `$1,234.50`.
    pub fn format_currency(&self, amount: Money) -> String {
        format!("{}{}", self.currency_symbol, amount.format_grouped())
    }
}

// =============================================================================
// System Settings
// =============================================================================

/// Declared value kind of a system setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    String,
    Boolean,
    Integer,
    Float,
    Json,
    Array,
}

impl SettingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKind::String => "string",
            SettingKind::Boolean => "boolean",
            SettingKind::Integer => "integer",
            SettingKind::Float => "float",
            SettingKind::Json => "json",
            SettingKind::Array => "array",
        }
    }

    /// Unknown kind names fall back to `String`.
    pub fn parse(s: &str) -> Self {
        match s {
            "boolean" => SettingKind::Boolean,
            "integer" => SettingKind::Integer,
            "float" => SettingKind::Float,
            "json" => SettingKind::Json,
            "array" => SettingKind::Array,
            _ => SettingKind::String,
        }
    }
}

impl Default for SettingKind {
    fn default() -> Self {
        SettingKind::String
    }
}

/// A setting value coerced to its declared kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Json(Value),
}

impl SettingValue {
    /// Coerces a raw stored string to the declared kind.
    ///
    /// Coercion is lenient in the way loosely-typed config stores usually
    /// are: booleans treat "" and "0" as false and anything else as true;
    /// numbers take the longest numeric prefix and fall back to zero;
    /// invalid JSON becomes `null`.
    pub fn coerce(raw: &str, kind: SettingKind) -> SettingValue {
        match kind {
            SettingKind::String => SettingValue::String(raw.to_string()),
            SettingKind::Boolean => {
                SettingValue::Boolean(!raw.is_empty() && raw != "0" && raw != "false")
            }
            SettingKind::Integer => SettingValue::Integer(leading_i64(raw)),
            SettingKind::Float => SettingValue::Float(leading_f64(raw)),
            SettingKind::Json | SettingKind::Array => {
                SettingValue::Json(serde_json::from_str(raw).unwrap_or(Value::Null))
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            SettingValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Longest numeric prefix as i64, zero when there is none.
fn leading_i64(raw: &str) -> i64 {
    let raw = raw.trim();
    let end = raw
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    raw[..end].parse().unwrap_or(0)
}

/// Longest numeric prefix as f64, zero when there is none.
fn leading_f64(raw: &str) -> f64 {
    let raw = raw.trim();
    let mut seen_dot = false;
    let end = raw
        .char_indices()
        .take_while(|(i, c)| {
            if c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')) {
                true
            } else if *c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                false
            }
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    raw[..end].parse().unwrap_or(0.0)
}

/// One row of the typed key/value settings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SystemSetting {
    pub id: String,
    pub key: String,
    pub value: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "type"))]
    #[serde(rename = "type")]
    pub kind: SettingKind,
    pub description: Option<String>,
    /// Whether the setting may be exposed outside the admin surface.
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SystemSetting {
    /// The stored value coerced to the declared kind. A missing value
    /// yields `None`.
    pub fn typed_value(&self) -> Option<SettingValue> {
        self.value
            .as_deref()
            .map(|raw| SettingValue::coerce(raw, self.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> StoreConfig {
        let now = Utc::now();
        StoreConfig {
            id: "s1".to_string(),
            name: "Main Street".to_string(),
            business_name: Some("Main Street Trading LLC".to_string()),
            address: None,
            phone: None,
            email: None,
            business_registration_number: None,
            logo_path: None,
            business_hours: Some(r#"{"mon":"9-5"}"#.to_string()),
            currency: "USD".to_string(),
            currency_symbol: "$".to_string(),
            receipt_settings: None,
            receipt_footer: Some("Thank you!".to_string()),
            receipt_number_format: "POS-{YYYY}-{MM}-{DD}-{0000}".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_format_currency() {
        let s = store();
        assert_eq!(s.format_currency(Money::from_cents(123450)), "$1,234.50");
        assert_eq!(s.format_currency(Money::from_cents(99)), "$0.99");
    }

    #[test]
    fn test_business_hours_json() {
        let s = store();
        assert_eq!(s.business_hours_json(), Some(json!({"mon": "9-5"})));
        assert_eq!(s.receipt_settings_json(), None);
    }

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in [
            SettingKind::String,
            SettingKind::Boolean,
            SettingKind::Integer,
            SettingKind::Float,
            SettingKind::Json,
            SettingKind::Array,
        ] {
            assert_eq!(SettingKind::parse(kind.as_str()), kind);
        }
        assert_eq!(SettingKind::parse("mystery"), SettingKind::String);
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(
            SettingValue::coerce("1", SettingKind::Boolean),
            SettingValue::Boolean(true)
        );
        assert_eq!(
            SettingValue::coerce("0", SettingKind::Boolean),
            SettingValue::Boolean(false)
        );
        assert_eq!(
            SettingValue::coerce("", SettingKind::Boolean),
            SettingValue::Boolean(false)
        );
        assert_eq!(
            SettingValue::coerce("yes", SettingKind::Boolean),
            SettingValue::Boolean(true)
        );
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(
            SettingValue::coerce("42", SettingKind::Integer),
            SettingValue::Integer(42)
        );
        assert_eq!(
            SettingValue::coerce("12abc", SettingKind::Integer),
            SettingValue::Integer(12)
        );
        assert_eq!(
            SettingValue::coerce("abc", SettingKind::Integer),
            SettingValue::Integer(0)
        );
        assert_eq!(
            SettingValue::coerce("-7", SettingKind::Integer),
            SettingValue::Integer(-7)
        );
        assert_eq!(
            SettingValue::coerce("3.5x", SettingKind::Float),
            SettingValue::Float(3.5)
        );
    }

    #[test]
    fn test_coerce_json() {
        assert_eq!(
            SettingValue::coerce(r#"{"a":1}"#, SettingKind::Json),
            SettingValue::Json(json!({"a": 1}))
        );
        assert_eq!(
            SettingValue::coerce("[1,2,3]", SettingKind::Array),
            SettingValue::Json(json!([1, 2, 3]))
        );
        assert_eq!(
            SettingValue::coerce("not json", SettingKind::Json),
            SettingValue::Json(Value::Null)
        );
    }
}
