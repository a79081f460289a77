//! Typed wrappers over the payment REST endpoints.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{ApiEnvelope, BillingCycle, CreatePaymentRequest, PaymentRequest, StatusResult};
use crate::storage::{keys, StorageAdapter};

/// Client for the payment endpoints of the backend.
///
/// Every call reads the bearer token from storage; the token's lifecycle
/// (sign-in, refresh) belongs to the embedding application.
#[derive(Clone)]
pub struct PaymentsApi {
    http: Client,
    base_url: String,
    storage: Arc<dyn StorageAdapter>,
}

impl PaymentsApi {
    pub fn new(config: &ClientConfig, storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            http: Client::new(),
            base_url: config.api_base_url.clone(),
            storage,
        }
    }

    /// Create a payment request for a membership plan.
    ///
    /// Returns the transfer metadata (amount, bank account, QR payload,
    /// expiry) the user needs to complete the bank transfer.
    pub async fn create_payment_request(
        &self,
        plan_id: &str,
        billing_cycle: BillingCycle,
    ) -> Result<PaymentRequest> {
        let body = CreatePaymentRequest {
            plan_id: plan_id.to_string(),
            billing_cycle,
        };
        let envelope = self.post_envelope("/payments/requests", &body).await?;
        envelope.into_result()
    }

    /// Read the current status of a previously created payment.
    pub async fn fetch_status(&self, transaction_ref: &str) -> Result<StatusResult> {
        let envelope = self
            .get_envelope(&format!("/payments/status/{transaction_ref}"))
            .await?;
        envelope.into_result()
    }

    /// Mark a pending payment as settled. Administrative action.
    pub async fn confirm_payment(&self, transaction_ref: &str) -> Result<()> {
        let envelope: ApiEnvelope<serde_json::Value> = self
            .post_envelope(&format!("/payments/{transaction_ref}/confirm"), &())
            .await?;
        envelope.ensure_success()
    }

    fn bearer_token(&self) -> Result<String> {
        self.storage
            .get(keys::TOKEN)
            .ok_or(ClientError::Unauthenticated)
    }

    async fn get_envelope<T: DeserializeOwned>(&self, path: &str) -> Result<ApiEnvelope<T>> {
        let token = self.bearer_token()?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn post_envelope<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiEnvelope<T>> {
        let token = self.bearer_token()?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<ApiEnvelope<T>> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthenticated);
        }

        if !status.is_success() {
            // Error responses still carry the envelope when the backend
            // produced them itself; proxies may return anything.
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&text)
                .map(|envelope| envelope.error_text())
                .unwrap_or_else(|_| format!("request failed with status {}", status));
            return Err(ClientError::Application(message));
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for PaymentsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsApi")
            .field("base_url", &self.base_url)
            .finish()
    }
}
