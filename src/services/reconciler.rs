use std::sync::Arc;

use chrono::prelude::*;
use futures::future;
use futures::prelude::*;

use super::types::*;
use crate::clients::payment::*;
use crate::errors::{Error, RepoError};
use crate::models::*;
use crate::types::DbPool;

/// Merges a completed payment-provider session into the order store. Both
/// the webhook and the success-page confirmation land here, keyed by the
/// provider session id.
pub trait ReconcilerService: Send + Sync {
    /// Webhook entry point. Non-completion events are acknowledged and
    /// ignored.
    fn apply_event(&self, event: PaymentEvent) -> ServiceFuture<Option<Order>>;
    /// Success-page entry point. The session is re-fetched from the
    /// provider; the client's claim of payment is never trusted.
    fn confirm_session(&self, customer: CustomerId, session_id: ProviderSessionId) -> ServiceFuture<Order>;
}

#[derive(Clone)]
pub struct ReconcilerServiceImpl {
    pub db_pool: DbPool,
    pub cart_repo_factory: CartItemRepoFactory,
    pub order_repo_factory: OrderRepoFactory,
    pub order_event_repo_factory: OrderEventRepoFactory,
    pub payment_client: Option<Arc<dyn PaymentClient>>,
}

pub fn from_minor_units(amount: i64) -> ProductPrice {
    ProductPrice(amount as f64 / 100.0)
}

fn metadata_order_id(session: &CheckoutSession) -> OrderId {
    session
        .metadata
        .get("order_id")
        .and_then(|v| v.parse().ok())
        .map(OrderId)
        .unwrap_or_else(OrderId::new)
}

fn metadata_customer(session: &CheckoutSession) -> CustomerId {
    session
        .metadata
        .get("customer_id")
        .and_then(|v| v.parse().ok())
        .map(CustomerId)
        .unwrap_or(CustomerId(-1))
}

impl ReconcilerServiceImpl {
    fn apply_session(&self, source: EventSource, session: CheckoutSession) -> ServiceFuture<Order> {
        let db_pool = self.db_pool.clone();
        let cart_repo_factory = self.cart_repo_factory.clone();
        let order_repo_factory = self.order_repo_factory.clone();
        let order_event_repo_factory = self.order_event_repo_factory.clone();

        async move {
            if session.payment_status != SessionPaymentStatus::Paid {
                return Err(Error::Validate(format!("session {} is not paid", session.id)).into());
            }

            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let cart_repo = (cart_repo_factory)();
            let order_repo = (order_repo_factory)();
            let event_repo = (order_event_repo_factory)();

            let existing = order_repo
                .select(&tx, OrderFilter::from(session.id.clone()))
                .await?
                .pop();

            let (order, transitioned) = match existing {
                Some(order) if order.payment_status == PaymentStatus::Paid => {
                    debug!(
                        "Order {} already reconciled for session {}, nothing to do",
                        order.slug, session.id
                    );
                    (order, false)
                }
                Some(order) => {
                    let updated = order_repo
                        .update(
                            &tx,
                            OrderUpdater {
                                mask: OrderIdentifier::Id(order.id).into(),
                                data: OrderUpdateData {
                                    state: Some(OrderState::Paid),
                                    payment_status: Some(PaymentStatus::Paid),
                                    address: ShippingAddress::from_metadata(&session.metadata),
                                    ..Default::default()
                                },
                            },
                        )
                        .await?
                        .pop()
                        .ok_or(Error::NotFound)?;
                    (updated, true)
                }
                None => {
                    // The pending order went missing; rebuild it from session
                    // data. The unique key on provider_session arbitrates
                    // racing webhook and confirmation writers.
                    let customer = metadata_customer(&session);
                    warn!(
                        "No order for provider session {}, creating one for customer {}",
                        session.id, customer
                    );
                    let inserter = OrderInserter {
                        strategy: OrderMergeStrategy::ProviderSessionUpsert,
                        id: metadata_order_id(&session),
                        customer,
                        state: OrderState::Paid,
                        payment_status: PaymentStatus::Paid,
                        payment_method: PaymentMethod::Card,
                        fst_status: None,
                        total: from_minor_units(session.amount_total),
                        products: vec![],
                        address: ShippingAddress::from_metadata(&session.metadata).unwrap_or_default(),
                        provider_session: Some(session.id.clone()),
                    };
                    match order_repo.insert_exactly_one(&tx, inserter).await {
                        Ok(inserted) => (inserted, true),
                        Err(RepoError::NotFound) => {
                            // Lost the race: a concurrent writer already
                            // reconciled this session.
                            let order = order_repo
                                .select(&tx, OrderFilter::from(session.id.clone()))
                                .await?
                                .pop()
                                .ok_or(Error::NotFound)?;
                            (order, false)
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            };

            if transitioned {
                event_repo
                    .insert_exactly_one(
                        &tx,
                        OrderEventInserter {
                            parent: order.id,
                            source,
                            committed_at: Utc::now(),
                            state: OrderState::Paid,
                            comment: Some(format!("session {}", session.id)),
                        },
                    )
                    .await?;
                if order.customer != CustomerId(-1) {
                    cart_repo
                        .delete(
                            &tx,
                            CartItemFilter {
                                customer: Some(order.customer),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
                info!(
                    "Order {} reconciled as paid from session {} ({})",
                    order.slug, session.id, source
                );
            }

            tx.commit().await.map_err(RepoError::from)?;
            Ok(order)
        }
        .boxed()
    }
}

impl ReconcilerService for ReconcilerServiceImpl {
    fn apply_event(&self, event: PaymentEvent) -> ServiceFuture<Option<Order>> {
        if event.event_type != CHECKOUT_SESSION_COMPLETED {
            debug!("Ignoring payment event {} of type {}", event.id, event.event_type);
            return future::ready(Ok(None)).boxed();
        }

        let fut = self.apply_session(EventSource::GatewayWebhook, event.data.object);
        async move { fut.await.map(Some) }.boxed()
    }

    fn confirm_session(&self, customer: CustomerId, session_id: ProviderSessionId) -> ServiceFuture<Order> {
        debug!(
            "Customer {} confirming checkout session {}",
            customer, session_id
        );

        let payment_client = self.payment_client.clone();
        let self_clone = self.clone();
        async move {
            let payment_client = payment_client.ok_or(Error::NotConfigured("payment"))?;
            let session = payment_client.fetch_session(session_id).await?;

            // The session must belong to the caller when it says who it
            // belongs to.
            let meta_customer = metadata_customer(&session);
            if meta_customer != CustomerId(-1) && meta_customer != customer {
                return Err(Error::Forbidden.into());
            }

            self_clone
                .apply_session(EventSource::Confirmation, session)
                .await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn session(metadata: HashMap<String, String>) -> CheckoutSession {
        CheckoutSession {
            id: ProviderSessionId("cs_123".to_string()),
            url: None,
            payment_status: SessionPaymentStatus::Paid,
            amount_total: 6980,
            currency: "eur".to_string(),
            metadata,
        }
    }

    #[test]
    fn minor_units_convert_back_to_euros() {
        assert!((from_minor_units(6980).0 - 69.8).abs() < 1e-9);
    }

    #[test]
    fn customer_comes_from_metadata_or_is_unattributed() {
        let mut metadata = HashMap::new();
        metadata.insert("customer_id".to_string(), "42".to_string());
        assert_eq!(metadata_customer(&session(metadata)), CustomerId(42));

        assert_eq!(metadata_customer(&session(HashMap::new())), CustomerId(-1));

        let mut bad = HashMap::new();
        bad.insert("customer_id".to_string(), "quarante-deux".to_string());
        assert_eq!(metadata_customer(&session(bad)), CustomerId(-1));
    }

    #[test]
    fn order_id_comes_from_metadata_when_parsable() {
        let id = OrderId::new();
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), id.to_string());
        assert_eq!(metadata_order_id(&session(metadata)), id);

        // Unparsable ids fall back to a fresh one instead of failing the event
        let mut bad = HashMap::new();
        bad.insert("order_id".to_string(), "pas-un-uuid".to_string());
        assert_ne!(metadata_order_id(&session(bad)), OrderId::default());
    }
}
