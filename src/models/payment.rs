use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{msg, ClientError};

/// Response envelope used by every REST endpoint of the backend.
///
/// `errorMessages` is only populated when `isSuccess` is false.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub is_success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error_messages: Vec<String>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the carried result, turning an application-level failure
    /// into an [`ClientError::Application`] with the server's message or
    /// a generic fallback.
    pub fn into_result(self) -> crate::error::Result<T> {
        if !self.is_success {
            return Err(ClientError::Application(self.error_text()));
        }
        self.result
            .ok_or_else(|| ClientError::Application(msg::GENERIC_PAYMENT_FAILURE.to_string()))
    }

    /// Like [`into_result`](Self::into_result) for endpoints whose success
    /// response carries no payload.
    pub fn ensure_success(self) -> crate::error::Result<()> {
        if self.is_success {
            Ok(())
        } else {
            Err(ClientError::Application(self.error_text()))
        }
    }

    pub fn error_text(&self) -> String {
        if self.error_messages.is_empty() {
            msg::GENERIC_PAYMENT_FAILURE.to_string()
        } else {
            self.error_messages.join("; ")
        }
    }
}

/// Raw status strings the payment service is allowed to return.
///
/// Anything else fails to parse and is surfaced as an unknown-status
/// failure, never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Serialize, Deserialize)]
pub enum PaymentStatus {
    Completed,
    Failed,
    Pending,
}

/// Payload of `GET /payments/status/{transaction_ref}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    /// Raw server status; mapped to [`PaymentStatus`] by the poller.
    pub status: String,
    /// Present once the payment completed.
    pub subscription: Option<Subscription>,
    /// Server-provided detail for declined payments.
    pub message: Option<String>,
}

/// An activated membership subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
    pub starts_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

/// Body of `POST /payments/requests`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
}

/// Transfer metadata returned when a payment request is created.
///
/// The payer transfers `amount` to the given account with `description`
/// as the memo, or scans `qr_payload`; the backend matches the incoming
/// bank transfer against `transaction_ref`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub transaction_ref: String,
    /// Amount due in VND (no minor units).
    pub amount: i64,
    pub bank_bin: String,
    pub account_number: String,
    pub account_name: String,
    /// Transfer memo the payer must include verbatim.
    pub description: String,
    /// EMVCo QR string encoding the transfer.
    pub qr_payload: String,
    /// Unix timestamp after which the backend stops matching transfers.
    pub expires_at: i64,
}
