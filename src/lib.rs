//! # Telecare client SDK
//!
//! Client SDK for the Telecare clinic platform. The backend (appointment
//! booking, membership subscriptions, bank-transfer payments, chat/video
//! signaling relay) is external; this crate implements the client side:
//!
//! - [`StatusPoller`]: a bounded polling state machine that watches a
//!   payment until it completes, fails, or the attempt budget runs out.
//! - [`SignalingSession`]: a per-appointment session over the signaling
//!   relay for chat messages and opaque video-negotiation payloads.
//! - [`PaymentsApi`]: typed wrappers over the payment REST endpoints.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use telecare::{
//!     BillingCycle, ClientConfig, MemoryStorage, PaymentsApi, PollEvent,
//!     PollerConfig, StatusPoller, StorageAdapter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env();
//!     let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorage::new());
//!     storage.set(telecare::storage::keys::TOKEN, "bearer-token-from-sign-in");
//!
//!     let api = PaymentsApi::new(&config, storage);
//!     let request = api.create_payment_request("family", BillingCycle::Monthly).await?;
//!     println!("transfer {} VND, memo {}", request.amount, request.description);
//!
//!     let mut handle = StatusPoller::spawn(
//!         api,
//!         request.transaction_ref,
//!         PollerConfig::default(),
//!         |event| {
//!             if let PollEvent::State(state) = event {
//!                 println!("payment state: {:?}", state);
//!             }
//!         },
//!     );
//!     handle.wait().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod payments;
pub mod signaling;
pub mod storage;

pub use config::ClientConfig;
pub use error::{msg, ClientError, Result};
pub use models::{
    ApiEnvelope, BillingCycle, ChatMessage, CreatePaymentRequest, PaymentRequest, PaymentStatus,
    StatusResult, Subscription, VideoSignal,
};
pub use payments::{
    PaymentsApi, PollEvent, PollState, PollerConfig, PollerHandle, StatusPoller,
};
pub use signaling::{ClientFrame, EventSubscription, ServerFrame, SignalingSession};
pub use storage::{FileStorage, MemoryStorage, StorageAdapter};
