use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::quote::FlapCount;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Card,
    Transfer,
}

impl std::str::FromStr for PaymentType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "transfer" => Ok(Self::Transfer),
            other => Err(invalid("paymentType", format!("`{other}` is not cash|card|transfer"))),
        }
    }
}

/// Priced configuration handed from the configurator to checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedOrder {
    pub product_id: ProductId,
    pub width: u32,
    pub height: u32,
    pub flap_count: FlapCount,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub is_custom_order: bool,
    pub requires_manual_quote: bool,
}

impl StagedOrder {
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity.max(0))
    }

    pub fn size_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn into_submission(
        self,
        product_type: impl Into<String>,
        contact: CustomerContact,
    ) -> Result<OrderSubmission, DomainError> {
        let submission = OrderSubmission {
            fio: contact.fio,
            phone: contact.phone,
            location: contact.location,
            product_type: product_type.into(),
            size: self.size_label(),
            quantity: self.quantity,
            total_price: self.total_price(),
            email: contact.email,
            payment_type: contact.payment_type,
        };
        submission.validate()?;
        Ok(submission)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub fio: String,
    pub phone: String,
    pub location: String,
    pub email: Option<String>,
    pub payment_type: Option<PaymentType>,
}

/// Body of `POST /orders`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub fio: String,
    pub phone: String,
    pub location: String,
    pub product_type: String,
    pub size: String,
    pub quantity: i32,
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<PaymentType>,
}

impl OrderSubmission {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("fio", &self.fio)?;
        require_text("location", &self.location)?;
        require_text("productType", &self.product_type)?;
        require_text("size", &self.size)?;

        if !phone_pattern().is_match(self.phone.trim()) {
            return Err(invalid("phone", "expected +998 followed by 9 digits"));
        }
        if self.quantity <= 0 {
            return Err(invalid("quantity", "must be a positive integer"));
        }
        if self.total_price <= Decimal::ZERO {
            return Err(invalid("totalPrice", "must be positive"));
        }
        if let Some(email) = &self.email {
            if !email_pattern().is_match(email.trim()) {
                return Err(invalid("email", "not a valid e-mail address"));
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub success: bool,
    pub order_id: String,
    #[serde(default)]
    pub order: serde_json::Value,
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "is required"));
    }
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> DomainError {
    DomainError::InvalidOrder { field: field.to_owned(), message: message.into() }
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+998\d{9}$").expect("phone regex is valid"))
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"))
}
