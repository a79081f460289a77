//! Bounded polling state machine for payment confirmation.
//!
//! One spawned task owns the whole loop: it issues status queries in
//! strict sequence (the next query starts only after the previous
//! outcome has been processed), and the same timer that schedules the
//! next query drives the cosmetic countdown display. Terminal states
//! are absorbing; cancellation silences the callback immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{msg, ClientError};
use crate::models::{PaymentStatus, Subscription};

use super::api::PaymentsApi;

/// Tuning knobs for the polling state machine.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Duration of one countdown tick. The query interval is
    /// `tick * countdown_from`.
    pub tick: Duration,
    /// Countdown start value; also the number of ticks between queries.
    pub countdown_from: u8,
    /// Attempt budget before the poller forces a timeout failure.
    pub max_attempts: u32,
    /// Whether transport failures consume the attempt budget. When
    /// false, only recognized server responses count, and the poller
    /// keeps retrying through outages until cancelled.
    pub count_network_errors: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            countdown_from: 5,
            max_attempts: 24,
            count_network_errors: true,
        }
    }
}

/// Client-observed polling state. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Checking,
    Pending,
    Completed(Subscription),
    Failed(String),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Completed(_) | PollState::Failed(_))
    }
}

/// Events delivered to the poller callback.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// Emitted once per state transition, in order. A renewed `Pending`
    /// re-notifies because it resets the visible countdown.
    State(PollState),
    /// Cosmetic seconds-until-next-check tick. Never drives the query
    /// schedule.
    Countdown(u8),
}

pub struct StatusPoller;

impl StatusPoller {
    /// Start polling `transaction_ref`, delivering [`PollEvent`]s to
    /// `on_event` until a terminal state or cancellation.
    ///
    /// The first query is issued immediately. The returned handle owns
    /// the task; dropping it cancels polling.
    pub fn spawn<F>(
        api: PaymentsApi,
        transaction_ref: impl Into<String>,
        config: PollerConfig,
        on_event: F,
    ) -> PollerHandle
    where
        F: FnMut(PollEvent) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let transaction_ref = transaction_ref.into();

        let flag = cancelled.clone();
        let task = tokio::spawn(async move {
            run_poll_loop(api, transaction_ref, config, flag, on_event).await;
        });

        PollerHandle { task, cancelled }
    }
}

/// Handle to a running poller. Cancels on drop.
pub struct PollerHandle {
    task: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl PollerHandle {
    /// Stop polling. No event is delivered after this returns; calling
    /// it again has no further effect.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the poll loop reaches a terminal state or is cancelled.
    pub async fn wait(&mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_poll_loop<F>(
    api: PaymentsApi,
    transaction_ref: String,
    config: PollerConfig,
    cancelled: Arc<AtomicBool>,
    mut on_event: F,
) where
    F: FnMut(PollEvent) + Send,
{
    let gate = cancelled.clone();
    let mut emit = move |event: PollEvent| {
        if !gate.load(Ordering::SeqCst) {
            on_event(event);
        }
    };

    emit(PollEvent::State(PollState::Checking));

    let mut attempts: u32 = 0;
    loop {
        let outcome = api.fetch_status(&transaction_ref).await;
        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        match outcome {
            Err(err @ ClientError::Network(_)) => {
                tracing::debug!(
                    "status query for {} failed in transit: {}",
                    transaction_ref,
                    err
                );
                if config.count_network_errors {
                    attempts += 1;
                    if attempts >= config.max_attempts {
                        emit(PollEvent::State(PollState::Failed(err.failure_reason())));
                        return;
                    }
                }
            }
            Err(err) => {
                // Application failure, missing token, undecodable body:
                // all terminal, distinguished only by the reason text.
                emit(PollEvent::State(PollState::Failed(err.failure_reason())));
                return;
            }
            Ok(result) => {
                attempts += 1;
                match result.status.parse::<PaymentStatus>() {
                    Ok(PaymentStatus::Completed) => {
                        tracing::info!("payment {} completed", transaction_ref);
                        match result.subscription {
                            Some(subscription) => {
                                emit(PollEvent::State(PollState::Completed(subscription)));
                            }
                            None => {
                                // Completed without a payload is a backend
                                // contract violation; fail rather than hand
                                // the caller nothing.
                                emit(PollEvent::State(PollState::Failed(
                                    msg::GENERIC_PAYMENT_FAILURE.to_string(),
                                )));
                            }
                        }
                        return;
                    }
                    Ok(PaymentStatus::Failed) => {
                        let reason = result
                            .message
                            .unwrap_or_else(|| msg::GENERIC_PAYMENT_FAILURE.to_string());
                        emit(PollEvent::State(PollState::Failed(reason)));
                        return;
                    }
                    Ok(PaymentStatus::Pending) => {
                        emit(PollEvent::State(PollState::Pending));
                        if attempts >= config.max_attempts {
                            tracing::info!(
                                "payment {} still pending after {} attempts, giving up",
                                transaction_ref,
                                attempts
                            );
                            emit(PollEvent::State(PollState::Failed(
                                ClientError::Timeout.failure_reason(),
                            )));
                            return;
                        }
                    }
                    Err(_) => {
                        tracing::warn!(
                            "payment {} returned unrecognized status {:?}",
                            transaction_ref,
                            result.status
                        );
                        emit(PollEvent::State(PollState::Failed(
                            ClientError::UnknownStatus(result.status).failure_reason(),
                        )));
                        return;
                    }
                }
            }
        }

        // One timer drives both the next-query schedule and the display
        // countdown: countdown_from ticks, then the next query.
        if config.countdown_from == 0 {
            tokio::time::sleep(config.tick).await;
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            continue;
        }
        emit(PollEvent::Countdown(config.countdown_from));
        for remaining in (0..config.countdown_from).rev() {
            tokio::time::sleep(config.tick).await;
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            emit(PollEvent::Countdown(remaining));
        }
    }
}
