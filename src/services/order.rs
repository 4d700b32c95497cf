use std::sync::Arc;

use chrono::prelude::*;
use futures::prelude::*;

use super::types::*;
use crate::clients::mail::MailClient;
use crate::errors::{Error, RepoError};
use crate::models::*;
use crate::types::DbPool;

pub trait OrderService: Send + Sync {
    /// Look an order up, optionally scoped to its owner.
    fn get_order(&self, id: OrderIdentifier, customer: Option<CustomerId>) -> ServiceFuture<Option<Order>>;
    fn get_orders_for_customer(&self, customer: CustomerId) -> ServiceFuture<Vec<Order>>;
    /// Status history of an order, newest first. Empty for unknown orders.
    fn get_order_events(&self, id: OrderIdentifier, customer: Option<CustomerId>) -> ServiceFuture<Vec<OrderEvent>>;
    /// Admin status update; records an event alongside.
    fn set_order_state(
        &self,
        id: OrderIdentifier,
        state: OrderState,
        source: EventSource,
        comment: Option<String>,
        fst_status: Option<FstStatus>,
    ) -> ServiceFuture<Option<Order>>;
    /// Back-office listing using the terms provided.
    fn search(&self, terms: OrderSearchTerms) -> ServiceFuture<Vec<Order>>;
    /// Public 4-step tracking view.
    fn track_order(&self, id: OrderIdentifier) -> ServiceFuture<OrderTracking>;
    /// Re-send the confirmation email through the mail provider cascade.
    fn resend_confirmation(&self, id: OrderIdentifier) -> ServiceFuture<()>;
}

pub struct OrderServiceImpl {
    pub db_pool: DbPool,
    pub order_repo_factory: OrderRepoFactory,
    pub order_event_repo_factory: OrderEventRepoFactory,
    pub mail_client: Option<Arc<dyn MailClient>>,
}

impl OrderService for OrderServiceImpl {
    fn get_order(&self, id: OrderIdentifier, customer: Option<CustomerId>) -> ServiceFuture<Option<Order>> {
        let db_pool = self.db_pool.clone();
        let order_repo_factory = self.order_repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let repo = (order_repo_factory)();
            let mut orders = repo
                .select(&tx, OrderFilter::from(id).with_customer(customer))
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(orders.pop())
        }
        .boxed()
    }

    fn get_orders_for_customer(&self, customer: CustomerId) -> ServiceFuture<Vec<Order>> {
        debug!("Getting orders for customer {}", customer);

        let db_pool = self.db_pool.clone();
        let order_repo_factory = self.order_repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let repo = (order_repo_factory)();
            let orders = repo
                .select(
                    &tx,
                    OrderFilter {
                        customer: Some(customer),
                        ..Default::default()
                    }
                    .with_ordering(true),
                )
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(orders)
        }
        .boxed()
    }

    fn get_order_events(&self, id: OrderIdentifier, customer: Option<CustomerId>) -> ServiceFuture<Vec<OrderEvent>> {
        let db_pool = self.db_pool.clone();
        let order_repo_factory = self.order_repo_factory.clone();
        let order_event_repo_factory = self.order_event_repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let order_repo = (order_repo_factory)();
            let event_repo = (order_event_repo_factory)();

            let order = order_repo
                .select(&tx, OrderFilter::from(id).with_customer(customer))
                .await?
                .pop();
            let events = match order {
                None => vec![],
                Some(order) => {
                    event_repo
                        .select(&tx, OrderEventFilter::from(order.id).with_ordering(true))
                        .await?
                }
            };
            tx.commit().await.map_err(RepoError::from)?;

            Ok(events)
        }
        .boxed()
    }

    fn set_order_state(
        &self,
        id: OrderIdentifier,
        state: OrderState,
        source: EventSource,
        comment: Option<String>,
        fst_status: Option<FstStatus>,
    ) -> ServiceFuture<Option<Order>> {
        debug!("Setting order {:?} state to {}", id, state);

        let db_pool = self.db_pool.clone();
        let order_repo_factory = self.order_repo_factory.clone();
        let order_event_repo_factory = self.order_event_repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let order_repo = (order_repo_factory)();
            let event_repo = (order_event_repo_factory)();

            let updated = order_repo
                .update(
                    &tx,
                    OrderUpdater {
                        mask: id.into(),
                        data: OrderUpdateData {
                            state: Some(state),
                            fst_status,
                            ..Default::default()
                        },
                    },
                )
                .await?
                .pop();

            if let Some(ref order) = updated {
                event_repo
                    .insert_exactly_one(
                        &tx,
                        OrderEventInserter {
                            parent: order.id,
                            source,
                            committed_at: Utc::now(),
                            state,
                            comment,
                        },
                    )
                    .await?;
                info!("Order {} moved to state {} by {}", order.slug, state, source);
            }
            tx.commit().await.map_err(RepoError::from)?;

            Ok(updated)
        }
        .boxed()
    }

    fn search(&self, terms: OrderSearchTerms) -> ServiceFuture<Vec<Order>> {
        let db_pool = self.db_pool.clone();
        let order_repo_factory = self.order_repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let repo = (order_repo_factory)();
            let orders = repo
                .select(&tx, OrderFilter::from_search_terms(terms))
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(orders)
        }
        .boxed()
    }

    fn track_order(&self, id: OrderIdentifier) -> ServiceFuture<OrderTracking> {
        let fut = self.get_order(id, None);
        async move {
            let order = fut.await?.ok_or(Error::NotFound)?;
            // States outside the 4 steps read as not found, never as an error
            let step = TrackingStep::from_state(order.state).ok_or(Error::NotFound)?;

            Ok(OrderTracking {
                order_id: order.id,
                slug: order.slug,
                state: order.state,
                step,
                position: step.position(),
            })
        }
        .boxed()
    }

    fn resend_confirmation(&self, id: OrderIdentifier) -> ServiceFuture<()> {
        let mail_client = self.mail_client.clone();
        let fut = self.get_order(id, None);
        async move {
            let mail_client = mail_client.ok_or(Error::NotConfigured("mail"))?;
            let order = fut.await?.ok_or(Error::NotFound)?;
            info!("Re-sending confirmation email for order {}", order.slug);
            mail_client.send_order_confirmation(order).await
        }
        .boxed()
    }
}
