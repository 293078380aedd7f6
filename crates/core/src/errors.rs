use thiserror::Error;

use crate::domain::product::{Dimensions, ProductId};
use crate::domain::quote::{FlapCount, FlapSet};
use crate::flows::states::{ConfiguratorMode, SessionEventKind};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown product `{0}`")]
    UnknownProduct(ProductId),
    #[error("product `{product_id}` has no size option at index {index}")]
    UnknownSize { product_id: ProductId, index: usize },
    #[error("flap count {0} is not supported (expected 1, 2 or 3)")]
    UnsupportedFlapCount(u8),
    #[error("product `{product_id}` does not allow {flap_count} flap(s) here; allowed: {allowed}")]
    IllegalFlapCount { product_id: ProductId, flap_count: FlapCount, allowed: FlapSet },
    #[error("dimensions {requested} are out of range (each side must be 1..={max_side} cm)")]
    DimensionsOutOfRange { requested: Dimensions, max_side: u32 },
    #[error("dimensions {requested} are below the minimum size {minimum}")]
    BelowMinimumSize { requested: Dimensions, minimum: Dimensions },
    #[error("product `{product_id}` cannot be built as {dimensions} with {flap_count} flap(s)")]
    GeometricallyInfeasible { product_id: ProductId, dimensions: Dimensions, flap_count: FlapCount },
    #[error("price for product `{product_id}` is not computable: {reason}")]
    PriceNotComputable { product_id: ProductId, reason: String },
    #[error("event {event:?} is not valid in {mode:?} mode")]
    InvalidSessionTransition { mode: ConfiguratorMode, event: SessionEventKind },
    #[error("no current quote: calculate the price before staging an order")]
    QuoteMissing,
    #[error("invalid order field `{field}`: {message}")]
    InvalidOrder { field: String, message: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Non-computable prices go to a manager instead of blocking the customer.
    pub fn requires_manual_quote(&self) -> bool {
        matches!(self, Self::GeometricallyInfeasible { .. } | Self::PriceNotComputable { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("catalog failure: {0}")]
    Catalog(String),
    #[error("currency rate failure: {0}")]
    Currency(String),
    #[error("order submission failed: {0}")]
    OrderSubmission(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The configuration could not be processed. Adjust the inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Catalog(message)
            | ApplicationError::Currency(message)
            | ApplicationError::OrderSubmission(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::product::{Dimensions, ProductId};
    use crate::domain::quote::FlapCount;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::BelowMinimumSize {
            requested: Dimensions::new(10, 10),
            minimum: Dimensions::new(25, 25),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The configuration could not be processed. Adjust the inputs and try again."
        );
    }

    #[test]
    fn order_submission_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::OrderSubmission("HTTP 503".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("bad rate url".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn infeasible_geometry_routes_to_manual_quote() {
        let error = DomainError::GeometricallyInfeasible {
            product_id: ProductId("c".to_owned()),
            dimensions: Dimensions::new(300, 100),
            flap_count: FlapCount::Two,
        };
        assert!(error.requires_manual_quote());
        assert!(!DomainError::QuoteMissing.requires_manual_quote());
    }
}
