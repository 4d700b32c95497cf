use crate::models::*;
use crate::router::RouteParser;

#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Healthcheck,
    CartProducts,
    CartProduct { product_id: ProductId },
    CartIncrementProduct { product_id: ProductId },
    CartProductQuantity { product_id: ProductId },
    CartClear,
    CheckoutSession,
    CheckoutConfirm,
    PaymentWebhook,
    Orders,
    Order { order_id: OrderIdentifier },
    OrderEvents { order_id: OrderIdentifier },
    OrderTracking { order_id: OrderIdentifier },
    AdminLogin,
    AdminLogout,
    AdminOrders,
    AdminOrderStatus { order_id: OrderIdentifier },
    AdminOrderResendConfirmation { order_id: OrderIdentifier },
}

impl Route {
    /// Routes that require a valid back-office session.
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Route::AdminOrders
                | Route::AdminOrderStatus { .. }
                | Route::AdminOrderResendConfirmation { .. }
        )
    }
}

fn parse_id(params: &[String]) -> Option<OrderIdentifier> {
    params
        .get(0)
        .and_then(|string_id| string_id.parse().ok())
        .map(|id| OrderIdentifier::Id(OrderId(id)))
}

fn parse_slug(params: &[String]) -> Option<OrderIdentifier> {
    params
        .get(0)
        .and_then(|string_id| string_id.parse().ok())
        .map(|slug| OrderIdentifier::Slug(OrderSlug(slug)))
}

pub fn make_router() -> RouteParser<Route> {
    let mut route_parser: RouteParser<Route> = Default::default();

    route_parser.add_route(r"^/healthcheck$", || Route::Healthcheck);

    route_parser.add_route(r"^/cart/products$", || Route::CartProducts);
    route_parser.add_route_with_params(r"^/cart/products/(\d+)$", |params| {
        params
            .get(0)
            .and_then(|string_id| string_id.parse().ok())
            .map(|product_id| Route::CartProduct {
                product_id: ProductId(product_id),
            })
    });
    route_parser.add_route_with_params(r"^/cart/products/(\d+)/increment$", |params| {
        params
            .get(0)
            .and_then(|string_id| string_id.parse().ok())
            .map(|product_id| Route::CartIncrementProduct {
                product_id: ProductId(product_id),
            })
    });
    route_parser.add_route_with_params(r"^/cart/products/(\d+)/quantity$", |params| {
        params
            .get(0)
            .and_then(|string_id| string_id.parse().ok())
            .map(|product_id| Route::CartProductQuantity {
                product_id: ProductId(product_id),
            })
    });
    route_parser.add_route(r"^/cart/clear$", || Route::CartClear);

    route_parser.add_route(r"^/checkout/sessions$", || Route::CheckoutSession);
    route_parser.add_route(r"^/checkout/sessions/confirm$", || Route::CheckoutConfirm);
    route_parser.add_route(r"^/webhooks/payment$", || Route::PaymentWebhook);

    route_parser.add_route(r"^/orders$", || Route::Orders);
    route_parser.add_route_with_params(r"^/orders/by-id/([a-zA-Z0-9-]+)$", |params| {
        parse_id(&params).map(|order_id| Route::Order { order_id })
    });
    route_parser.add_route_with_params(r"^/orders/by-slug/(\d+)$", |params| {
        parse_slug(&params).map(|order_id| Route::Order { order_id })
    });
    route_parser.add_route_with_params(r"^/orders/by-id/([a-zA-Z0-9-]+)/events$", |params| {
        parse_id(&params).map(|order_id| Route::OrderEvents { order_id })
    });
    route_parser.add_route_with_params(r"^/orders/by-slug/(\d+)/events$", |params| {
        parse_slug(&params).map(|order_id| Route::OrderEvents { order_id })
    });
    route_parser.add_route_with_params(r"^/orders/by-id/([a-zA-Z0-9-]+)/tracking$", |params| {
        parse_id(&params).map(|order_id| Route::OrderTracking { order_id })
    });
    route_parser.add_route_with_params(r"^/orders/by-slug/(\d+)/tracking$", |params| {
        parse_slug(&params).map(|order_id| Route::OrderTracking { order_id })
    });

    route_parser.add_route(r"^/admin/login$", || Route::AdminLogin);
    route_parser.add_route(r"^/admin/logout$", || Route::AdminLogout);
    route_parser.add_route(r"^/admin/orders$", || Route::AdminOrders);
    route_parser.add_route_with_params(r"^/admin/orders/by-id/([a-zA-Z0-9-]+)/status$", |params| {
        parse_id(&params).map(|order_id| Route::AdminOrderStatus { order_id })
    });
    route_parser.add_route_with_params(r"^/admin/orders/by-slug/(\d+)/status$", |params| {
        parse_slug(&params).map(|order_id| Route::AdminOrderStatus { order_id })
    });
    route_parser.add_route_with_params(
        r"^/admin/orders/by-id/([a-zA-Z0-9-]+)/resend-confirmation$",
        |params| parse_id(&params).map(|order_id| Route::AdminOrderResendConfirmation { order_id }),
    );
    route_parser.add_route_with_params(
        r"^/admin/orders/by-slug/(\d+)/resend-confirmation$",
        |params| parse_slug(&params).map(|order_id| Route::AdminOrderResendConfirmation { order_id }),
    );

    route_parser
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn cart_routes_parse_product_ids() {
        let router = make_router();
        assert_eq!(
            router.test("/cart/products/5555/increment"),
            Some(Route::CartIncrementProduct {
                product_id: ProductId(5555)
            })
        );
        assert_eq!(
            router.test("/cart/products/5555/quantity"),
            Some(Route::CartProductQuantity {
                product_id: ProductId(5555)
            })
        );
        assert_eq!(router.test("/cart/products/abc"), None);
    }

    #[test]
    fn order_routes_accept_ids_and_slugs() {
        let router = make_router();
        let uuid = Uuid::new_v4();

        assert_eq!(
            router.test(&format!("/orders/by-id/{}", uuid)),
            Some(Route::Order {
                order_id: OrderIdentifier::Id(OrderId(uuid))
            })
        );
        assert_eq!(
            router.test("/orders/by-slug/1042/tracking"),
            Some(Route::OrderTracking {
                order_id: OrderIdentifier::Slug(OrderSlug(1042))
            })
        );
        assert_eq!(router.test("/orders/by-id/not-a-uuid"), None);
    }

    #[test]
    fn admin_routes_are_flagged() {
        let router = make_router();
        assert!(router.test("/admin/orders").unwrap().is_admin());
        assert!(router
            .test("/admin/orders/by-slug/1042/status")
            .unwrap()
            .is_admin());
        assert!(!router.test("/admin/login").unwrap().is_admin());
        assert!(!router.test("/healthcheck").unwrap().is_admin());
    }

    #[test]
    fn webhook_route_parses() {
        assert_eq!(
            make_router().test("/webhooks/payment"),
            Some(Route::PaymentWebhook)
        );
    }
}
