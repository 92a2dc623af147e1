//! Shipment notifications to the external shipping partner.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use reqwest::StatusCode;
use serde::Serialize;

use super::TaskError;

/// Body posted to the shipping partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentNotice {
    pub order_id: OrderId,
    pub title: String,
    pub body: &'static str,
}

impl ShipmentNotice {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            title: format!("order-{order_id}"),
            body: "shipped",
        }
    }

    /// Stable per order and status change, so the receiver can drop
    /// redelivered notices.
    pub fn idempotency_key(&self) -> String {
        format!("order-{}-shipped", self.order_id)
    }
}

/// Sends shipment notifications.
#[async_trait]
pub trait ShipmentNotifier: Send + Sync {
    async fn notify(&self, order_id: OrderId) -> Result<(), TaskError>;
}

/// Posts notices as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct HttpShipmentNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpShipmentNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Timeouts, 429 and 5xx responses are worth retrying, other statuses are not.
fn classify_status(status: StatusCode) -> Result<(), TaskError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(TaskError::Transient(format!("shipping partner responded {status}")))
    } else {
        Err(TaskError::Permanent(format!("shipping partner rejected notice: {status}")))
    }
}

fn classify_error(err: reqwest::Error) -> TaskError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        TaskError::Transient(err.to_string())
    } else if let Some(status) = err.status() {
        classify_status(status)
            .err()
            .unwrap_or_else(|| TaskError::Permanent(err.to_string()))
    } else {
        TaskError::Permanent(err.to_string())
    }
}

#[async_trait]
impl ShipmentNotifier for HttpShipmentNotifier {
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    async fn notify(&self, order_id: OrderId) -> Result<(), TaskError> {
        let notice = ShipmentNotice::new(order_id);
        let response = self
            .client
            .post(&self.url)
            .header("Idempotency-Key", notice.idempotency_key())
            .json(&notice)
            .send()
            .await
            .map_err(classify_error)?;

        classify_status(response.status())?;
        tracing::info!(status = %response.status(), "shipment notification sent");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryShipmentState {
    delivered: Vec<ShipmentNotice>,
    attempts: u32,
    script: VecDeque<TaskError>,
}

/// In-memory notifier for testing.
///
/// Scripted errors are returned in order before any call succeeds.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShipmentNotifier {
    state: Arc<Mutex<InMemoryShipmentState>>,
}

impl InMemoryShipmentNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error for an upcoming call.
    pub fn push_failure(&self, error: TaskError) {
        self.lock().script.push_back(error);
    }

    /// Notices that were accepted.
    pub fn delivered(&self) -> Vec<ShipmentNotice> {
        self.lock().delivered.clone()
    }

    /// Every call, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryShipmentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ShipmentNotifier for InMemoryShipmentNotifier {
    async fn notify(&self, order_id: OrderId) -> Result<(), TaskError> {
        let mut state = self.lock();
        state.attempts += 1;
        if let Some(error) = state.script.pop_front() {
            return Err(error);
        }
        state.delivered.push(ShipmentNotice::new(order_id));
        Ok(())
    }
}
