//! The order service: placement, lifecycle transitions and payment
//! bookkeeping against the persisted store.

use std::sync::Arc;

use common::OrderId;
use tracing::{info, warn};

use crate::error::DomainError;
use crate::notify::{dispatch_status_notification, Notifier};
use crate::store::{OrderStore, StoreError, Version};

use super::{
    allocate_display_id, Order, OrderError, PlaceOrder, RecordAuthorization, UpdateStatus,
};

/// How many times placement retries the allocate-and-insert pair when the
/// display-id unique constraint fires.
const PLACEMENT_ATTEMPTS: usize = 3;

/// Application service for the order lifecycle.
///
/// The store is the single source of truth; every mutation loads the current
/// record, applies the state machine, and writes back under the record's
/// version.
pub struct OrderService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

impl<S, N> Clone for OrderService<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<S, N> OrderService<S, N>
where
    S: OrderStore,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    /// Places a new order: validates the command, allocates a display id and
    /// inserts the record.
    ///
    /// Allocation and insert are retried as a unit when the display-id unique
    /// constraint fires, so a racing placement that grabs the same candidate
    /// costs one retry, not a failure.
    #[tracing::instrument(skip(self, cmd), fields(location_id = %cmd.location_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        let location_id = cmd.location_id;
        let (items, contact) = cmd.into_items().map_err(DomainError::from)?;

        for attempt in 1..=PLACEMENT_ATTEMPTS {
            let display_id = allocate_display_id(self.store.as_ref()).await?;
            let mut order = Order::place(
                OrderId::new(),
                location_id,
                display_id,
                items.clone(),
                contact.clone(),
            );

            match self.store.insert_order(&order).await {
                Ok(()) => {
                    order.version = Version::first();
                    info!(
                        order_id = %order.id,
                        display_id = %order.display_id,
                        total = %order.total_amount,
                        "order placed"
                    );
                    metrics::counter!("orders_placed_total").increment(1);
                    return Ok(order);
                }
                Err(StoreError::DuplicateDisplayId(taken)) => {
                    warn!(%taken, attempt, "display id collided at insert, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        metrics::counter!("orders_display_id_exhausted_total").increment(1);
        Err(OrderError::DisplayIdExhausted.into())
    }

    /// Loads an order by id.
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.store.get_order(id).await?)
    }

    /// Lists orders for one merchant location.
    pub async fn orders_for_location(
        &self,
        location_id: common::LocationId,
    ) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.orders_for_location(location_id).await?)
    }

    /// Moves an order to a new lifecycle status and notifies the customer
    /// when the new status calls for it.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, status = %cmd.status))]
    pub async fn update_status(&self, cmd: UpdateStatus) -> Result<Order, DomainError> {
        let mut order = self.load(cmd.order_id).await?;
        let expected = order.version;

        order.transition_status(cmd.status)?;
        order.version = self.store.update_order(&order, expected).await?;

        metrics::counter!("order_status_transitions_total", "status" => cmd.status.as_str())
            .increment(1);
        self.notify_if_needed(&order);
        Ok(order)
    }

    /// Records a processor authorization hold on an order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn record_authorization(
        &self,
        cmd: RecordAuthorization,
    ) -> Result<Order, DomainError> {
        let mut order = self.load(cmd.order_id).await?;
        let expected = order.version;

        order.record_authorization(cmd.payment_intent)?;
        order.version = self.store.update_order(&order, expected).await?;

        info!(order_id = %order.id, "payment authorization recorded");
        Ok(order)
    }

    /// Marks an order's payment as failed after a processor-reported hard
    /// failure.
    #[tracing::instrument(skip(self))]
    pub async fn mark_payment_failed(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let mut order = self.load(order_id).await?;
        let expected = order.version;

        order.mark_payment_failed()?;
        order.version = self.store.update_order(&order, expected).await?;

        metrics::counter!("order_payment_failures_total").increment(1);
        Ok(order)
    }

    async fn load(&self, id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "order",
                id: id.to_string(),
            })
    }

    /// Dispatches status notifications on a detached task when the status
    /// calls for them. Best-effort; never delays or fails the transition.
    fn notify_if_needed(&self, order: &Order) {
        dispatch_status_notification(Arc::clone(&self.notifier), order);
    }
}
