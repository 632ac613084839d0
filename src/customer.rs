//! Contact details collected once per browser before checkout.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{ContactSnapshot, OrderCustomer},
    storage::{CUSTOMER_INFO_KEY, KeyValueStore, StorageError},
};

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Raw input from the contact form.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CustomerForm {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Validated, normalized contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CustomerField {
    Name,
    Email,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: CustomerField,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.fields))]
pub struct CustomerInfoError {
    pub fields: Vec<FieldError>,
}

impl CustomerInfoError {
    pub fn has(&self, field: CustomerField) -> bool {
        self.fields.iter().any(|error| error.field == field)
    }
}

impl From<CustomerInfoError> for AppError {
    fn from(err: CustomerInfoError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

fn describe(fields: &[FieldError]) -> String {
    let messages: Vec<&str> = fields.iter().map(|error| error.message).collect();
    messages.join("; ")
}

impl CustomerForm {
    pub fn validate(&self) -> Result<CustomerInfo, CustomerInfoError> {
        let mut fields = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            fields.push(FieldError {
                field: CustomerField::Name,
                message: "name is required",
            });
        }

        let email = self.email.trim();
        if email.is_empty() {
            fields.push(FieldError {
                field: CustomerField::Email,
                message: "email is required",
            });
        } else if !EMAIL_SHAPE.is_match(email) {
            fields.push(FieldError {
                field: CustomerField::Email,
                message: "email is invalid",
            });
        }

        let phone: String = self.phone.chars().filter(|c| !c.is_whitespace()).collect();
        if phone.is_empty() {
            fields.push(FieldError {
                field: CustomerField::Phone,
                message: "phone is required",
            });
        } else if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
            fields.push(FieldError {
                field: CustomerField::Phone,
                message: "phone must have 10 digits",
            });
        }

        if !fields.is_empty() {
            return Err(CustomerInfoError { fields });
        }

        Ok(CustomerInfo {
            name: name.to_string(),
            email: email.to_lowercase(),
            phone,
        })
    }
}

impl From<&CustomerInfo> for ContactSnapshot {
    fn from(info: &CustomerInfo) -> Self {
        ContactSnapshot {
            name: Some(info.name.clone()),
            email: Some(info.email.clone()),
            phone: Some(info.phone.clone()),
        }
    }
}

impl From<&CustomerInfo> for OrderCustomer {
    fn from(info: &CustomerInfo) -> Self {
        OrderCustomer {
            name: Some(info.name.clone()),
            email: Some(info.email.clone()),
            phone: Some(info.phone.clone()),
            ..OrderCustomer::default()
        }
    }
}

/// Reads and writes the stored identity in local storage.
pub struct CustomerProfile<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> CustomerProfile<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// The stored identity, if any. An unreadable entry counts as absent.
    pub fn load(&self) -> Option<CustomerInfo> {
        let raw = self.store.get(CUSTOMER_INFO_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(info) => Some(info),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable customer info");
                None
            }
        }
    }

    pub fn save(&self, info: &CustomerInfo) -> Result<(), StorageError> {
        let raw = serde_json::to_string(info).map_err(StorageError::Corrupt)?;
        self.store.set(CUSTOMER_INFO_KEY, &raw)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(CUSTOMER_INFO_KEY)
    }
}
