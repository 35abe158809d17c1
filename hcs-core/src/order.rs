//! Billing/Order Waiter for prepaid resources
//!
//! Phase 1 waits for an order ID to appear (500 ms ticks through the
//! [`StatePoller`]); phase 2 hands the order to the billing collaborator and
//! waits for it to complete within whatever is left of the deadline.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use tokio::time::Instant;

use crate::error::{LifecycleError, LifecycleResult};
use crate::poller::{Observation, PollOutcome, PollSpec, StatePoller, StateRefresh};

/// Interval for the order-appearance phase
pub const ORDER_POLL_INTERVAL: Duration = Duration::from_millis(500);

const ORDER_ABSENT: &str = "ORDER_ABSENT";
const ORDER_PRESENT: &str = "ORDER_PRESENT";

/// Billing status of a prepaid order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingStatus {
    Pending,
    Completed,
}

/// Order created for a prepaid resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_id: String,
    pub billing_status: BillingStatus,
}

/// Billing collaborator
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// Wait until the order is complete
    async fn wait_order_complete(&self, order_id: &str, timeout: Duration) -> LifecycleResult<()>;

    /// Resolve the ID of the main resource an order produced
    async fn order_resource_id(&self, order_id: &str, timeout: Duration) -> LifecycleResult<String>;

    /// Unsubscribe prepaid resources (the prepaid counterpart of delete)
    async fn unsubscribe(&self, resource_ids: &[String]) -> LifecycleResult<()>;
}

/// Source of the order ID during phase 1
#[async_trait]
pub trait OrderLookup: Send {
    async fn lookup(&mut self) -> LifecycleResult<Option<String>>;
}

struct OrderIdRefresh<'r, L: ?Sized> {
    lookup: &'r mut L,
    found: Option<String>,
}

#[async_trait]
impl<L> StateRefresh for OrderIdRefresh<'_, L>
where
    L: OrderLookup + ?Sized,
{
    async fn refresh(&mut self) -> LifecycleResult<Observation> {
        match self.lookup.lookup().await? {
            Some(order_id) if !order_id.is_empty() => {
                self.found = Some(order_id);
                Ok(Observation::status(ORDER_PRESENT))
            }
            _ => Ok(Observation::status(ORDER_ABSENT)),
        }
    }
}

/// Two-phase waiter for one prepaid resource
pub struct OrderWaiter<'a> {
    billing: &'a dyn BillingClient,
    label: &'a str,
    interval: Duration,
}

impl<'a> OrderWaiter<'a> {
    pub fn new(billing: &'a dyn BillingClient, label: &'a str) -> Self {
        Self {
            billing,
            label,
            interval: ORDER_POLL_INTERVAL,
        }
    }

    pub fn billing(&self) -> &'a dyn BillingClient {
        self.billing
    }

    /// Phase 1: wait for an order ID
    pub async fn wait_for_order_id<L>(&self, lookup: &mut L, deadline: Instant) -> LifecycleResult<OrderRecord>
    where
        L: OrderLookup + ?Sized,
    {
        let spec = PollSpec::new(&[ORDER_ABSENT], &[ORDER_PRESENT])
            .with_interval(self.interval)
            .with_timeout(deadline.saturating_duration_since(Instant::now()));

        let mut refresh = OrderIdRefresh {
            lookup,
            found: None,
        };
        let report = StatePoller::new(&spec, self.label)
            .run(&mut refresh, Some(deadline))
            .await?;

        match (report.outcome, refresh.found) {
            (PollOutcome::Succeeded(_), Some(order_id)) => {
                info!("{}: order {} placed", self.label, order_id);
                Ok(OrderRecord {
                    order_id,
                    billing_status: BillingStatus::Pending,
                })
            }
            _ => Err(LifecycleError::OrderNeverAppeared {
                resource: self.label.to_string(),
                elapsed: report.elapsed,
            }),
        }
    }

    /// Phase 2: wait for the order to complete
    pub async fn wait_for_completion(&self, record: &mut OrderRecord, deadline: Instant) -> LifecycleResult<()> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.billing
            .wait_order_complete(&record.order_id, remaining)
            .await?;
        record.billing_status = BillingStatus::Completed;
        info!("{}: order {} completed", self.label, record.order_id);
        Ok(())
    }

    /// Both phases in sequence
    pub async fn wait<L>(&self, lookup: &mut L, deadline: Instant) -> LifecycleResult<OrderRecord>
    where
        L: OrderLookup + ?Sized,
    {
        let mut record = self.wait_for_order_id(lookup, deadline).await?;
        self.wait_for_completion(&mut record, deadline).await?;
        Ok(record)
    }
}
