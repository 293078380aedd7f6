use std::time::Duration;

use hatchquote_core::config::OrdersConfig;
use hatchquote_core::domain::order::{OrderReceipt, OrderSubmission};
use hatchquote_core::errors::ApplicationError;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

pub struct HttpOrderClient {
    client: Client,
    endpoint: String,
    api_token: Option<SecretString>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpOrderClient {
    pub fn new(client: Client, endpoint: impl Into<String>, api_token: Option<SecretString>) -> Self {
        Self { client, endpoint: endpoint.into(), api_token }
    }

    pub fn from_config(config: &OrdersConfig) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Self::new(client, config.endpoint.clone(), config.api_token.clone()))
    }

    /// Validates locally, then posts. Nothing is retried; the caller keeps the
    /// staged order and may submit again.
    pub async fn submit(&self, order: &OrderSubmission) -> Result<OrderReceipt, ApplicationError> {
        order.validate()?;

        let mut request = self.client.post(&self.endpoint).json(order);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            warn!(event_name = "orders.submit_failed", error = %error, "order request failed");
            ApplicationError::OrderSubmission(error.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| ApplicationError::OrderSubmission(error.to_string()))?;

        let receipt = parse_order_response(status, &body);
        match &receipt {
            Ok(receipt) => info!(
                event_name = "orders.submitted",
                order_id = %receipt.order_id,
                product_type = %order.product_type,
                quantity = order.quantity,
                "order accepted"
            ),
            Err(error) => warn!(
                event_name = "orders.rejected",
                status,
                error = %error,
                "order rejected by server"
            ),
        }
        receipt
    }
}

/// `{success, orderId, order}` on 2xx; `{error}` or an opaque body otherwise.
pub fn parse_order_response(status: u16, body: &str) -> Result<OrderReceipt, ApplicationError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|parsed| parsed.error)
            .unwrap_or_else(|_| format!("server returned status {status}"));
        return Err(ApplicationError::OrderSubmission(message));
    }

    let receipt: OrderReceipt = serde_json::from_str(body).map_err(|error| {
        ApplicationError::OrderSubmission(format!("unreadable order response: {error}"))
    })?;
    if !receipt.success {
        return Err(ApplicationError::OrderSubmission(
            "server did not confirm the order".to_owned(),
        ));
    }
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use hatchquote_core::errors::ApplicationError;

    use super::parse_order_response;

    #[test]
    fn success_body_yields_receipt() {
        let receipt = parse_order_response(
            201,
            r#"{"success": true, "orderId": "ORD-1042", "order": {"status": "new"}}"#,
        )
        .expect("accepted");
        assert_eq!(receipt.order_id, "ORD-1042");
        assert_eq!(receipt.order["status"], "new");
    }

    #[test]
    fn client_error_message_is_surfaced() {
        let error = parse_order_response(422, r#"{"error": "phone is invalid"}"#)
            .expect_err("rejected");
        assert_eq!(error, ApplicationError::OrderSubmission("phone is invalid".to_owned()));
    }

    #[test]
    fn opaque_failure_reports_status() {
        let error = parse_order_response(502, "Bad Gateway").expect_err("rejected");
        assert!(error.to_string().contains("502"));
    }

    #[test]
    fn unconfirmed_success_is_an_error() {
        let error = parse_order_response(200, r#"{"success": false, "orderId": ""}"#)
            .expect_err("not confirmed");
        assert!(matches!(error, ApplicationError::OrderSubmission(_)));
    }
}
