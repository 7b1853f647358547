//! Shipping address entity and request payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use drukmart_core::{AddressId, Email, UserId};

use crate::error::ValidationErrors;

/// A user's shipping address.
///
/// The owning `user_id` is never serialized in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingAddress {
    pub id: AddressId,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    /// Dzongkhag or state/province.
    pub state: String,
    pub postal_code: Option<String>,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing a shipping address.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressPayload {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressPayload {
    /// Validate the payload, collecting every field error.
    ///
    /// # Errors
    ///
    /// Returns the full set of field-level errors if any check fails.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_required(&mut errors, "full_name", &self.full_name, 255);
        check_required(&mut errors, "phone", &self.phone, 20);
        check_required(&mut errors, "address_line1", &self.address_line1, 255);
        check_required(&mut errors, "city", &self.city, 100);
        check_required(&mut errors, "state", &self.state, 100);
        check_required(&mut errors, "country", &self.country, 100);
        check_optional_length(&mut errors, "address_line2", self.address_line2.as_deref(), 255);
        check_optional_length(&mut errors, "postal_code", self.postal_code.as_deref(), 20);

        if self.email.is_empty() {
            errors.add("email", "the email field is required");
        } else if let Err(e) = Email::parse(&self.email) {
            errors.add("email", e.to_string());
        }

        errors.into_result()
    }
}

fn check_required(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(field, format!("the {field} field is required"));
    } else if value.len() > max {
        errors.add(field, format!("the {field} field must not exceed {max} characters"));
    }
}

fn check_optional_length(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) {
    if let Some(value) = value
        && value.len() > max
    {
        errors.add(field, format!("the {field} field must not exceed {max} characters"));
    }
}
