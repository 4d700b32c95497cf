use std::sync::Arc;

use futures::future::BoxFuture;
use futures::prelude::*;
use hyper::Method;

use crate::config;
use crate::errors::Error;
use crate::http::client::HttpClient;
use crate::models::Order;

pub type MailFuture<T> = BoxFuture<'static, Result<T, failure::Error>>;

pub trait MailClient: Send + Sync {
    fn send_order_confirmation(&self, order: Order) -> MailFuture<()>;
}

/// Sends through the configured providers in order, falling back to the next
/// one when a provider refuses the message.
#[derive(Clone)]
pub struct HttpMailClient {
    http: Arc<HttpClient>,
    from: String,
    providers: Vec<config::MailProvider>,
}

impl HttpMailClient {
    pub fn new(http: Arc<HttpClient>, config: &config::Mail) -> Self {
        Self {
            http,
            from: config.from.clone(),
            providers: config.providers.clone(),
        }
    }
}

impl MailClient for HttpMailClient {
    fn send_order_confirmation(&self, order: Order) -> MailFuture<()> {
        let self_clone = self.clone();
        async move {
            let payload = serde_json::to_string(&serde_json::json!({
                "from": self_clone.from,
                "to": order.address.email,
                "subject": format!("Confirmation de votre commande #{}", order.slug),
                "html": confirmation_html(&order),
            }))?;

            for provider in &self_clone.providers {
                let headers = vec![
                    ("Authorization", format!("Bearer {}", provider.api_key)),
                    ("Content-Type", "application/json".to_string()),
                ];
                match self_clone
                    .http
                    .request_ack(Method::POST, provider.url.clone(), Some(payload.clone()), Some(headers))
                    .await
                {
                    Ok(()) => {
                        info!(
                            "Confirmation email for order {} sent via {}",
                            order.slug, provider.url
                        );
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(
                            "Mail provider {} refused confirmation for order {}: {}",
                            provider.url, order.slug, e
                        );
                    }
                }
            }

            Err(format_err!(
                "All {} mail providers failed for order {}",
                self_clone.providers.len(),
                order.slug
            )
            .context(Error::Gateway)
            .into())
        }
        .boxed()
    }
}

fn confirmation_html(order: &Order) -> String {
    let mut lines = String::new();
    for product in &order.products {
        lines.push_str(&format!(
            "<li>{} × {} — {:.2} €</li>",
            product.quantity, product.name, product.price.0
        ));
    }

    format!(
        "<h1>Merci pour votre commande !</h1>\
         <p>Votre commande n°{} a bien été confirmée.</p>\
         <ul>{}</ul>\
         <p>Total : {:.2} €</p>\
         <p>Vous pouvez suivre votre commande à tout moment depuis la page de suivi.</p>",
        order.slug, lines, order.total.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::Utc;

    #[test]
    fn confirmation_lists_every_product_and_the_total() {
        let order = Order {
            id: OrderId::new(),
            slug: OrderSlug(1042),
            customer: CustomerId(7),
            state: OrderState::Paid,
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Card,
            fst_status: None,
            total: ProductPrice(69.8),
            items: 2,
            products: vec![
                OrderProduct {
                    id: ProductId(1),
                    name: "Boule à neige".to_string(),
                    price: ProductPrice(34.9),
                    quantity: 2,
                    image: String::new(),
                },
            ],
            address: ShippingAddress::default(),
            provider_session: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let html = confirmation_html(&order);
        assert!(html.contains("commande n°1042"));
        assert!(html.contains("2 × Boule à neige"));
        assert!(html.contains("Total : 69.80 €"));
    }
}
