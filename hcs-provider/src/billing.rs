//! BSS billing client
//!
//! Waits for prepaid orders, resolves the resources they produced and
//! unsubscribes prepaid resources through the BSS v2 API.

use std::time::Duration;

use async_trait::async_trait;
use hcs_core::error::{LifecycleError, LifecycleResult};
use hcs_core::flatten::extract_string;
use hcs_core::invoker::{Invoker, OperationRequest};
use hcs_core::order::BillingClient;
use hcs_core::poller::{DEFAULT_POLL_INTERVAL, Observation, PollOutcome, PollSpec, StatePoller, StateRefresh};
use log::{debug, info};
use serde_json::json;

/// Order status codes: 1 pending approval, 2 processing, 3 cancelled
/// (pending refund), 4 cancelled, 5 completed, 6 pending payment
const ORDER_PENDING: &[&str] = &["1", "2", "3", "6"];
const ORDER_COMPLETED: &[&str] = &["5"];
const ORDER_CANCELLED: &[&str] = &["4"];

const RESOURCE_PENDING: &str = "PENDING";
const RESOURCE_READY: &str = "READY";

/// Main resource first; orders with a single resource may not flag it
const MAIN_RESOURCE_PATH: &str = "data[?is_main_resource==`true`].resource_id|[0]";
const FIRST_RESOURCE_PATH: &str = "data[0].resource_id";

/// [`BillingClient`] backed by the BSS service
pub struct BssBillingClient<I> {
    invoker: I,
    interval: Duration,
}

impl<I: Invoker> BssBillingClient<I> {
    pub fn new(invoker: I) -> Self {
        Self {
            invoker,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Interval between order status checks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

struct OrderStatusRefresh<'a> {
    invoker: &'a dyn Invoker,
    order_id: &'a str,
}

#[async_trait]
impl StateRefresh for OrderStatusRefresh<'_> {
    async fn refresh(&mut self) -> LifecycleResult<Observation> {
        let request = OperationRequest::get(format!(
            "v2/orders/customer-orders/details/{}",
            self.order_id
        ));
        let response = self.invoker.invoke(request).await?;
        let status = extract_string(&response.body, "order_info.status")?;
        Ok(Observation::Found {
            status,
            document: response.body,
        })
    }
}

struct OrderResourceRefresh<'a> {
    invoker: &'a dyn Invoker,
    order_id: &'a str,
    resource_id: Option<String>,
}

#[async_trait]
impl StateRefresh for OrderResourceRefresh<'_> {
    async fn refresh(&mut self) -> LifecycleResult<Observation> {
        let request = OperationRequest::get("v2/orders/suscriptions/resources")
            .with_query("order_id", self.order_id);
        let response = self.invoker.invoke(request).await?;

        let resource_id = match extract_string(&response.body, MAIN_RESOURCE_PATH)? {
            Some(id) => Some(id),
            None => extract_string(&response.body, FIRST_RESOURCE_PATH)?,
        };
        let status = match resource_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                self.resource_id = Some(id);
                RESOURCE_READY
            }
            None => RESOURCE_PENDING,
        };
        Ok(Observation::status(status))
    }
}

#[async_trait]
impl<I: Invoker> BillingClient for BssBillingClient<I> {
    async fn wait_order_complete(&self, order_id: &str, timeout: Duration) -> LifecycleResult<()> {
        let spec = PollSpec::new(ORDER_PENDING, ORDER_COMPLETED)
            .with_failures(ORDER_CANCELLED)
            .with_interval(self.interval)
            .with_timeout(timeout);
        let label = format!("order {}", order_id);
        let mut refresh = OrderStatusRefresh {
            invoker: &self.invoker,
            order_id,
        };

        let report = StatePoller::new(&spec, &label).run(&mut refresh, None).await?;
        if let PollOutcome::Failed(status) = &report.outcome {
            return Err(LifecycleError::billing(format!(
                "order {} ended with status {}",
                order_id, status
            )));
        }
        report.into_result(&label)?;
        info!("Order {} completed", order_id);
        Ok(())
    }

    async fn order_resource_id(&self, order_id: &str, timeout: Duration) -> LifecycleResult<String> {
        let spec = PollSpec::new(&[RESOURCE_PENDING], &[RESOURCE_READY])
            .with_interval(self.interval)
            .with_timeout(timeout);
        let label = format!("resources of order {}", order_id);
        let mut refresh = OrderResourceRefresh {
            invoker: &self.invoker,
            order_id,
            resource_id: None,
        };

        StatePoller::new(&spec, &label)
            .run(&mut refresh, None)
            .await?
            .into_result(&label)?;
        let resource_id = refresh.resource_id.ok_or_else(|| LifecycleError::MissingIdentifier {
            path: FIRST_RESOURCE_PATH.to_string(),
            context: "order resources".to_string(),
        })?;
        debug!("Order {} produced resource {}", order_id, resource_id);
        Ok(resource_id)
    }

    async fn unsubscribe(&self, resource_ids: &[String]) -> LifecycleResult<()> {
        let request = OperationRequest::post("v2/orders/subscriptions/resources/unsubscribe").with_body(json!({
            "resource_ids": resource_ids,
            "unsubscribe_type": 1,
        }));
        self.invoker.invoke(request).await?;
        info!("Unsubscribed {}", resource_ids.join(", "));
        Ok(())
    }
}
