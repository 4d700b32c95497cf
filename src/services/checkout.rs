use std::collections::HashMap;
use std::sync::Arc;

use chrono::prelude::*;
use futures::prelude::*;
use validator::Validate;

use super::types::*;
use crate::clients::payment::*;
use crate::errors::{Error, RepoError};
use crate::models::*;
use crate::types::DbPool;

const CURRENCY: &str = "eur";

/// Builds a hosted-checkout session out of the customer's cart.
pub trait CheckoutService: Send + Sync {
    fn create_session(&self, customer: CustomerId, payload: CheckoutPayload) -> ServiceFuture<CheckoutRedirect>;
}

#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct CheckoutPayload {
    #[validate]
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutRedirect {
    pub order_id: OrderId,
    pub slug: OrderSlug,
    pub url: String,
}

pub struct CheckoutServiceImpl {
    pub db_pool: DbPool,
    pub cart_repo_factory: CartItemRepoFactory,
    pub order_repo_factory: OrderRepoFactory,
    pub order_event_repo_factory: OrderEventRepoFactory,
    pub payment_client: Option<Arc<dyn PaymentClient>>,
    pub site_url: String,
}

pub fn to_minor_units(price: ProductPrice) -> i64 {
    (price.0 * 100.0).round() as i64
}

/// Metadata bag attached to the provider session. The reconciler reads it
/// back when a webhook arrives for a session whose order went missing.
pub fn session_metadata(
    order_id: OrderId,
    customer: CustomerId,
    shipping: &ShippingAddress,
) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("order_id".to_string(), order_id.to_string());
    metadata.insert("customer_id".to_string(), customer.to_string());
    shipping.write_into_metadata(&mut metadata);
    metadata
}

fn line_items(products: &[OrderProduct]) -> Vec<CheckoutLineItem> {
    products
        .iter()
        .map(|product| CheckoutLineItem {
            name: product.name.clone(),
            amount: to_minor_units(product.price),
            currency: CURRENCY.to_string(),
            quantity: product.quantity,
            image: if product.image.is_empty() {
                None
            } else {
                Some(product.image.clone())
            },
        })
        .collect()
}

fn order_total(products: &[OrderProduct]) -> ProductPrice {
    ProductPrice(
        products
            .iter()
            .map(|product| product.price.0 * f64::from(product.quantity))
            .sum(),
    )
}

impl CheckoutService for CheckoutServiceImpl {
    fn create_session(&self, customer: CustomerId, payload: CheckoutPayload) -> ServiceFuture<CheckoutRedirect> {
        debug!("Creating checkout session for customer {}", customer);

        let db_pool = self.db_pool.clone();
        let cart_repo_factory = self.cart_repo_factory.clone();
        let order_repo_factory = self.order_repo_factory.clone();
        let order_event_repo_factory = self.order_event_repo_factory.clone();
        let payment_client = self.payment_client.clone();
        let site_url = self.site_url.clone();

        async move {
            payload
                .validate()
                .map_err(|e| Error::Validate(e.to_string()))?;
            let CheckoutPayload {
                shipping,
                payment_method,
            } = payload;

            if payment_method == PaymentMethod::Card && payment_client.is_none() {
                return Err(Error::NotConfigured("payment").into());
            }

            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let cart_repo = (cart_repo_factory)();
            let order_repo = (order_repo_factory)();
            let event_repo = (order_event_repo_factory)();

            let cart_items = cart_repo
                .select(
                    &tx,
                    CartItemFilter {
                        customer: Some(customer),
                        ..Default::default()
                    },
                )
                .await?;
            if cart_items.is_empty() {
                return Err(Error::Validate("le panier est vide".to_string()).into());
            }

            let products: Vec<OrderProduct> = cart_items.into_iter().map(From::from).collect();
            let total = order_total(&products);
            let order_id = OrderId::new();

            let metadata = session_metadata(order_id, customer, &shipping);
            if payment_method == PaymentMethod::Card {
                validate_metadata(&metadata)?;
            }

            let fst_status = match payment_method {
                PaymentMethod::Card => None,
                PaymentMethod::BankTransfer => Some(FstStatus::AwaitingTransfer),
            };

            let order = order_repo
                .insert_exactly_one(
                    &tx,
                    OrderInserter {
                        strategy: OrderMergeStrategy::Standalone,
                        id: order_id,
                        customer,
                        state: OrderState::PendingPayment,
                        payment_status: PaymentStatus::Pending,
                        payment_method,
                        fst_status,
                        total,
                        products: products.clone(),
                        address: shipping,
                        provider_session: None,
                    },
                )
                .await?;
            event_repo
                .insert_exactly_one(
                    &tx,
                    OrderEventInserter {
                        parent: order.id,
                        source: EventSource::Checkout,
                        committed_at: Utc::now(),
                        state: OrderState::PendingPayment,
                        comment: None,
                    },
                )
                .await?;

            if payment_method == PaymentMethod::BankTransfer {
                // FST order placed; the cart is done with.
                cart_repo
                    .delete(
                        &tx,
                        CartItemFilter {
                            customer: Some(customer),
                            ..Default::default()
                        },
                    )
                    .await?;
                tx.commit().await.map_err(RepoError::from)?;

                info!("Created FST order {} for customer {}", order.slug, customer);
                return Ok(CheckoutRedirect {
                    order_id: order.id,
                    slug: order.slug,
                    url: format!("{}/commande/{}/virement", site_url, order.slug),
                });
            }

            // The pending order is committed before leaving the process.
            tx.commit().await.map_err(RepoError::from)?;

            let payment_client = payment_client.ok_or(Error::NotConfigured("payment"))?;
            let session = payment_client
                .create_session(CheckoutSessionRequest {
                    line_items: line_items(&products),
                    success_url: format!("{}/commande/succes?session={{CHECKOUT_SESSION_ID}}", site_url),
                    cancel_url: format!("{}/panier", site_url),
                    customer_email: order.address.email.clone(),
                    metadata,
                })
                .await?;
            let url = session.url.clone().ok_or_else(|| {
                failure::Error::from(Error::Gateway)
                    .context(format!("Provider returned no checkout URL for session {}", session.id))
            })?;

            // Attach the session id so the reconciler can find the order back
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let order_repo = (order_repo_factory)();
            order_repo
                .update(
                    &tx,
                    OrderUpdater {
                        mask: OrderIdentifier::Id(order.id).into(),
                        data: OrderUpdateData {
                            provider_session: Some(session.id.clone()),
                            ..Default::default()
                        },
                    },
                )
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            info!(
                "Created checkout session {} for order {} (customer {})",
                session.id, order.slug, customer
            );
            Ok(CheckoutRedirect {
                order_id: order.id,
                slug: order.slug,
                url,
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: f64, quantity: i32) -> OrderProduct {
        OrderProduct {
            id: ProductId(1),
            name: "Boule à neige".to_string(),
            price: ProductPrice(price),
            quantity,
            image: String::new(),
        }
    }

    #[test]
    fn minor_units_round_instead_of_truncating() {
        assert_eq!(to_minor_units(ProductPrice(34.9)), 3490);
        assert_eq!(to_minor_units(ProductPrice(0.1)), 10);
        assert_eq!(to_minor_units(ProductPrice(19.995)), 2000);
    }

    #[test]
    fn total_multiplies_price_by_quantity() {
        let products = vec![product(34.9, 2), product(5.0, 1)];
        assert!((order_total(&products).0 - 74.8).abs() < 1e-9);
    }

    #[test]
    fn metadata_carries_order_customer_and_shipping() {
        let shipping = ShippingAddress {
            name: "Marie Dupont".to_string(),
            email: "marie@example.com".to_string(),
            phone: None,
            address: "12 rue des Lilas".to_string(),
            city: "Lyon".to_string(),
            postal_code: "69003".to_string(),
            country: "France".to_string(),
        };
        let order_id = OrderId::new();

        let metadata = session_metadata(order_id, CustomerId(42), &shipping);

        assert_eq!(metadata.get("order_id"), Some(&order_id.to_string()));
        assert_eq!(metadata.get("customer_id").map(String::as_str), Some("42"));
        assert_eq!(
            metadata.get("shipping_city").map(String::as_str),
            Some("Lyon")
        );
        assert!(validate_metadata(&metadata).is_ok());
    }

    #[test]
    fn empty_images_are_dropped_from_line_items() {
        let items = line_items(&[product(34.9, 2)]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, 3490);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].image, None);
    }
}
