use std::sync::Arc;

use futures::future;
use futures::prelude::*;
use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::{Body, HeaderMap, Method, Request};
use serde::Serialize;

use crate::clients::mail::{HttpMailClient, MailClient};
use crate::clients::payment::signature::{self, SIGNATURE_HEADER};
use crate::clients::payment::{HttpPaymentClient, PaymentClient, PaymentEvent};
use crate::config::{Config, Payment};
use crate::errors::{ControllerError, Error};
use crate::http::client::HttpClient;
use crate::http::controller::Controller;
use crate::http::request_util::{parse_body, parse_query, read_body, serialize_future, ControllerFuture};
use crate::models::*;
use crate::repos;
use crate::router::RouteParser;
use crate::services::*;
use crate::types::DbPool;

pub mod routing;
use self::routing::*;

pub const ADMIN_SESSION_COOKIE: &str = "flocon_admin_session";

#[derive(Debug, Fail)]
pub enum AuthorizationError {
    #[fail(display = "Missing authorization header")]
    Missing,
    #[fail(display = "Cannot parse customer id from authorization header: {}", raw)]
    Parse { raw: String },
}

pub struct ServiceFactory {
    pub system_factory: Arc<dyn Fn() -> Box<dyn SystemService> + Send + Sync>,
    pub cart_factory: Arc<dyn Fn() -> Box<dyn CartService> + Send + Sync>,
    pub checkout_factory: Arc<dyn Fn() -> Box<dyn CheckoutService> + Send + Sync>,
    pub reconciler_factory: Arc<dyn Fn() -> Box<dyn ReconcilerService> + Send + Sync>,
    pub order_factory: Arc<dyn Fn() -> Box<dyn OrderService> + Send + Sync>,
    pub admin_factory: Arc<dyn Fn() -> Box<dyn AdminService> + Send + Sync>,
}

pub struct ControllerImpl {
    route_parser: Arc<RouteParser<Route>>,
    service_factory: Arc<ServiceFactory>,
    payment_config: Option<Payment>,
}

impl ControllerImpl {
    pub fn new(db_pool: DbPool, config: Config) -> Self {
        let http_client = Arc::new(HttpClient::new(&config.client));
        let payment_client: Option<Arc<dyn PaymentClient>> = config
            .payment
            .as_ref()
            .map(|payment| Arc::new(HttpPaymentClient::new(http_client.clone(), payment)) as Arc<dyn PaymentClient>);
        let mail_client: Option<Arc<dyn MailClient>> = config
            .mail
            .as_ref()
            .map(|mail| Arc::new(HttpMailClient::new(http_client.clone(), mail)) as Arc<dyn MailClient>);

        let cart_repo_factory: CartItemRepoFactory = Arc::new(|| Box::new(repos::cart_item::make_repo()));
        let order_repo_factory: OrderRepoFactory = Arc::new(|| Box::new(repos::order::make_repo()));
        let order_event_repo_factory: OrderEventRepoFactory =
            Arc::new(|| Box::new(repos::order_event::make_repo()));
        let admin_repo_factory: AdminRepoFactory = Arc::new(|| Box::new(repos::admin::make_admin_repo()));
        let session_repo_factory: AdminSessionRepoFactory =
            Arc::new(|| Box::new(repos::admin::make_session_repo()));

        let service_factory = ServiceFactory {
            system_factory: Arc::new(|| Box::new(SystemServiceImpl::default()) as Box<dyn SystemService>),
            cart_factory: Arc::new({
                let db_pool = db_pool.clone();
                move || Box::new(CartServiceImpl::new(db_pool.clone())) as Box<dyn CartService>
            }),
            checkout_factory: Arc::new({
                let db_pool = db_pool.clone();
                let cart_repo_factory = cart_repo_factory.clone();
                let order_repo_factory = order_repo_factory.clone();
                let order_event_repo_factory = order_event_repo_factory.clone();
                let payment_client = payment_client.clone();
                let site_url = config.site_url.clone();
                move || {
                    Box::new(CheckoutServiceImpl {
                        db_pool: db_pool.clone(),
                        cart_repo_factory: cart_repo_factory.clone(),
                        order_repo_factory: order_repo_factory.clone(),
                        order_event_repo_factory: order_event_repo_factory.clone(),
                        payment_client: payment_client.clone(),
                        site_url: site_url.clone(),
                    }) as Box<dyn CheckoutService>
                }
            }),
            reconciler_factory: Arc::new({
                let db_pool = db_pool.clone();
                let cart_repo_factory = cart_repo_factory.clone();
                let order_repo_factory = order_repo_factory.clone();
                let order_event_repo_factory = order_event_repo_factory.clone();
                let payment_client = payment_client.clone();
                move || {
                    Box::new(ReconcilerServiceImpl {
                        db_pool: db_pool.clone(),
                        cart_repo_factory: cart_repo_factory.clone(),
                        order_repo_factory: order_repo_factory.clone(),
                        order_event_repo_factory: order_event_repo_factory.clone(),
                        payment_client: payment_client.clone(),
                    }) as Box<dyn ReconcilerService>
                }
            }),
            order_factory: Arc::new({
                let db_pool = db_pool.clone();
                let order_repo_factory = order_repo_factory.clone();
                let order_event_repo_factory = order_event_repo_factory.clone();
                let mail_client = mail_client.clone();
                move || {
                    Box::new(OrderServiceImpl {
                        db_pool: db_pool.clone(),
                        order_repo_factory: order_repo_factory.clone(),
                        order_event_repo_factory: order_event_repo_factory.clone(),
                        mail_client: mail_client.clone(),
                    }) as Box<dyn OrderService>
                }
            }),
            admin_factory: Arc::new({
                let db_pool = db_pool.clone();
                let admin_repo_factory = admin_repo_factory.clone();
                let session_repo_factory = session_repo_factory.clone();
                move || {
                    Box::new(AdminServiceImpl {
                        db_pool: db_pool.clone(),
                        admin_repo_factory: admin_repo_factory.clone(),
                        session_repo_factory: session_repo_factory.clone(),
                    }) as Box<dyn AdminService>
                }
            }),
        };

        ControllerImpl {
            route_parser: Arc::new(routing::make_router()),
            service_factory: Arc::new(service_factory),
            payment_config: config.payment,
        }
    }
}

pub fn extract_customer_id(headers: &HeaderMap) -> Result<CustomerId, ControllerError> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ControllerError::BadRequest(AuthorizationError::Missing.into()))?;
    let customer = raw.parse().map(CustomerId).map_err(|_| {
        ControllerError::BadRequest(
            AuthorizationError::Parse {
                raw: raw.to_string(),
            }
            .into(),
        )
    })?;
    debug!("Extracted customer id: {}", customer);
    Ok(customer)
}

pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').map(str::trim).find_map(|cookie| {
                cookie
                    .strip_prefix(ADMIN_SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
                    .map(|token| token.to_string())
            })
        })
}

fn answer<T: Serialize>(value: &T) -> Result<String, ControllerError> {
    serde_json::to_string(value).map_err(|e| ControllerError::InternalServerError(e.into()))
}

fn search_terms_from_query(query: &str) -> Result<OrderSearchTerms, failure::Error> {
    let params = parse_query(query);

    let state = match params.get("state") {
        Some(raw) => Some(
            OrderState::from_db(raw).map_err(|_| Error::Validate(format!("unknown state {}", raw)))?,
        ),
        None => None,
    };
    let customer = match params.get("customer") {
        Some(raw) => Some(
            raw.parse()
                .map(CustomerId)
                .map_err(|_| Error::Validate(format!("bad customer id {}", raw)))?,
        ),
        None => None,
    };
    let created_from = match params.get("from") {
        Some(raw) => Some(parse_date(raw)?),
        None => None,
    };
    let created_to = match params.get("to") {
        Some(raw) => Some(parse_date(raw)?),
        None => None,
    };

    Ok(OrderSearchTerms {
        state,
        customer,
        created_from,
        created_to,
    })
}

fn parse_date(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, failure::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|date| date.with_timezone(&chrono::Utc))
        .map_err(|_| Error::Validate(format!("bad date {}", raw)).into())
}

impl Controller for ControllerImpl {
    fn call(&self, request: Request<Body>) -> ControllerFuture {
        let (parts, payload) = request.into_parts();
        let method = parts.method.clone();
        let headers = parts.headers;
        let query = parts.uri.query().unwrap_or_default().to_string();

        let service_factory = self.service_factory.clone();
        let route = self.route_parser.test(parts.uri.path());

        match route {
            // GET /healthcheck
            Some(Route::Healthcheck) if method == Method::GET => {
                serialize_future((service_factory.system_factory)().healthcheck())
            }

            // Public tracking page
            Some(Route::OrderTracking { order_id }) if method == Method::GET => {
                debug!("Received request to track order {:?}", order_id);
                serialize_future((service_factory.order_factory)().track_order(order_id))
            }

            // Payment provider webhook: raw body, signature checked before
            // anything else is looked at
            Some(Route::PaymentWebhook) if method == Method::POST => {
                let payment_config = self.payment_config.clone();
                Box::pin(async move {
                    let payment = payment_config.ok_or_else(|| {
                        ControllerError::ServiceUnavailable(Error::NotConfigured("payment").into())
                    })?;
                    let signature_header = headers
                        .get(SIGNATURE_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .map(ToString::to_string)
                        .ok_or_else(|| {
                            ControllerError::Unauthorized(format_err!("Missing webhook signature header"))
                        })?;
                    let body = read_body(payload).await?;
                    signature::verify(&body, &signature_header, &payment.webhook_secret)
                        .map_err(|e| ControllerError::Unauthorized(e.into()))?;
                    let event: PaymentEvent = serde_json::from_slice(&body)
                        .map_err(|e| ControllerError::UnprocessableEntity(e.into()))?;
                    debug!(
                        "Received verified payment webhook event {} ({})",
                        event.id, event.event_type
                    );
                    let order = (service_factory.reconciler_factory)()
                        .apply_event(event)
                        .await
                        .map_err(ControllerError::from)?;
                    answer(&order)
                })
            }

            Some(Route::AdminLogin) if method == Method::POST => Box::pin(async move {
                let login = parse_body::<AdminLoginPayload>(payload).await?;
                debug!("Received admin login request for {}", login.email);
                let session = (service_factory.admin_factory)()
                    .login(login)
                    .await
                    .map_err(ControllerError::from)?;
                answer(&session)
            }),

            Some(Route::AdminLogout) if method == Method::POST => Box::pin(async move {
                let token = extract_session_token(&headers)
                    .ok_or_else(|| ControllerError::Unauthorized(Error::Unauthorized.into()))?;
                (service_factory.admin_factory)()
                    .logout(token)
                    .await
                    .map_err(ControllerError::from)?;
                answer(&())
            }),

            // Back-office routes behind the session cookie
            Some(route) if route.is_admin() => Box::pin(async move {
                let token = extract_session_token(&headers)
                    .ok_or_else(|| ControllerError::Unauthorized(Error::Unauthorized.into()))?;
                let admin = (service_factory.admin_factory)()
                    .authenticate(token)
                    .await
                    .map_err(ControllerError::from)?;

                match route {
                    Route::AdminOrders if method == Method::GET => {
                        let terms = search_terms_from_query(&query).map_err(ControllerError::from)?;
                        debug!("Admin {} searching orders", admin.id);
                        let orders = (service_factory.order_factory)()
                            .search(terms)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&orders)
                    }
                    Route::AdminOrderStatus { order_id } if method == Method::PUT => {
                        let update = parse_body::<AdminOrderStatusPayload>(payload).await?;
                        debug!(
                            "Admin {} setting order {:?} state to {}",
                            admin.id, order_id, update.state
                        );
                        let order = (service_factory.order_factory)()
                            .set_order_state(
                                order_id,
                                update.state,
                                EventSource::Admin(admin.id),
                                update.comment,
                                update.fst_status,
                            )
                            .await
                            .map_err(ControllerError::from)?;
                        match order {
                            Some(order) => answer(&order),
                            None => Err(ControllerError::NotFound),
                        }
                    }
                    Route::AdminOrderResendConfirmation { order_id } if method == Method::POST => {
                        debug!("Admin {} re-sending confirmation for {:?}", admin.id, order_id);
                        (service_factory.order_factory)()
                            .resend_confirmation(order_id)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&())
                    }
                    _ => Err(ControllerError::NotFound),
                }
            }),

            // Customer routes behind the gateway-asserted id
            Some(route) => Box::pin(async move {
                let customer = extract_customer_id(&headers)?;

                match route {
                    Route::CartProducts if method == Method::GET => {
                        debug!("Received request to get cart for customer {}", customer);
                        let cart = (service_factory.cart_factory)()
                            .get_cart(customer)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&cart)
                    }
                    Route::CartIncrementProduct { product_id } if method == Method::POST => {
                        let product = parse_body::<CartProductPayload>(payload).await?;
                        debug!(
                            "Received request to add product {} to customer {}'s cart",
                            product_id, customer
                        );
                        let cart = (service_factory.cart_factory)()
                            .increment_item(customer, product_id, product)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&cart)
                    }
                    Route::CartProductQuantity { product_id } if method == Method::PUT => {
                        let params = parse_body::<SetterPayload<i32>>(payload).await?;
                        debug!(
                            "Received request to set product {} in customer {}'s cart to quantity {}",
                            product_id, customer, params.value
                        );
                        let item = (service_factory.cart_factory)()
                            .set_quantity(customer, product_id, params.value)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&item)
                    }
                    Route::CartProduct { product_id } if method == Method::DELETE => {
                        debug!(
                            "Received request to delete product {} from customer {}'s cart",
                            product_id, customer
                        );
                        let item = (service_factory.cart_factory)()
                            .delete_item(customer, product_id)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&item)
                    }
                    Route::CartClear if method == Method::POST => {
                        debug!("Received request to clear cart for customer {}", customer);
                        let cart = (service_factory.cart_factory)()
                            .clear_cart(customer)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&cart)
                    }
                    Route::CheckoutSession if method == Method::POST => {
                        let checkout = parse_body::<CheckoutPayload>(payload).await?;
                        debug!("Received checkout request from customer {}", customer);
                        let redirect = (service_factory.checkout_factory)()
                            .create_session(customer, checkout)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&redirect)
                    }
                    Route::CheckoutConfirm if method == Method::POST => {
                        let confirm = parse_body::<CheckoutConfirmPayload>(payload).await?;
                        debug!(
                            "Received confirmation of session {} from customer {}",
                            confirm.session_id, customer
                        );
                        let order = (service_factory.reconciler_factory)()
                            .confirm_session(customer, confirm.session_id)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&order)
                    }
                    Route::Orders if method == Method::GET => {
                        debug!("Received request to get orders for customer {}", customer);
                        let orders = (service_factory.order_factory)()
                            .get_orders_for_customer(customer)
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&orders)
                    }
                    Route::Order { order_id } if method == Method::GET => {
                        let order = (service_factory.order_factory)()
                            .get_order(order_id, Some(customer))
                            .await
                            .map_err(ControllerError::from)?;
                        match order {
                            Some(order) => answer(&order),
                            None => Err(ControllerError::NotFound),
                        }
                    }
                    Route::OrderEvents { order_id } if method == Method::GET => {
                        let events = (service_factory.order_factory)()
                            .get_order_events(order_id, Some(customer))
                            .await
                            .map_err(ControllerError::from)?;
                        answer(&events)
                    }
                    // Fallback
                    _ => Err(ControllerError::NotFound),
                }
            }),

            None => Box::pin(future::ready(Err(ControllerError::NotFound))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::executor::block_on;
    use maplit::hashmap;
    use std::sync::Mutex;

    struct StubCheckoutService;

    impl CheckoutService for StubCheckoutService {
        fn create_session(&self, _customer: CustomerId, _payload: CheckoutPayload) -> ServiceFuture<CheckoutRedirect> {
            future::ready(Err(Error::Validate("le panier est vide".to_string()).into())).boxed()
        }
    }

    #[derive(Clone, Default)]
    struct SpyReconcilerService {
        pub events: Arc<Mutex<Vec<PaymentEvent>>>,
    }

    impl ReconcilerService for SpyReconcilerService {
        fn apply_event(&self, event: PaymentEvent) -> ServiceFuture<Option<Order>> {
            self.events.lock().unwrap().push(event);
            future::ready(Ok(None)).boxed()
        }

        fn confirm_session(&self, _customer: CustomerId, _session_id: ProviderSessionId) -> ServiceFuture<Order> {
            future::ready(Err(Error::NotFound.into())).boxed()
        }
    }

    struct NullOrderService;

    impl OrderService for NullOrderService {
        fn get_order(&self, _id: OrderIdentifier, _customer: Option<CustomerId>) -> ServiceFuture<Option<Order>> {
            future::ready(Ok(None)).boxed()
        }

        fn get_orders_for_customer(&self, _customer: CustomerId) -> ServiceFuture<Vec<Order>> {
            future::ready(Ok(vec![])).boxed()
        }

        fn get_order_events(
            &self,
            _id: OrderIdentifier,
            _customer: Option<CustomerId>,
        ) -> ServiceFuture<Vec<OrderEvent>> {
            future::ready(Ok(vec![])).boxed()
        }

        fn set_order_state(
            &self,
            _id: OrderIdentifier,
            _state: OrderState,
            _source: EventSource,
            _comment: Option<String>,
            _fst_status: Option<FstStatus>,
        ) -> ServiceFuture<Option<Order>> {
            future::ready(Ok(None)).boxed()
        }

        fn search(&self, _terms: OrderSearchTerms) -> ServiceFuture<Vec<Order>> {
            future::ready(Ok(vec![])).boxed()
        }

        fn track_order(&self, _id: OrderIdentifier) -> ServiceFuture<OrderTracking> {
            future::ready(Err(Error::NotFound.into())).boxed()
        }

        fn resend_confirmation(&self, _id: OrderIdentifier) -> ServiceFuture<()> {
            future::ready(Err(Error::NotFound.into())).boxed()
        }
    }

    struct NullAdminService;

    impl AdminService for NullAdminService {
        fn login(&self, _payload: AdminLoginPayload) -> ServiceFuture<AdminSession> {
            future::ready(Err(Error::Unauthorized.into())).boxed()
        }

        fn authenticate(&self, _token: String) -> ServiceFuture<Admin> {
            future::ready(Err(Error::Unauthorized.into())).boxed()
        }

        fn logout(&self, _token: String) -> ServiceFuture<()> {
            future::ready(Ok(())).boxed()
        }
    }

    const TEST_WEBHOOK_SECRET: &str = "whsec_test123";

    fn test_payment_config() -> Payment {
        Payment {
            base_url: "https://api.payment.example.com".to_string(),
            secret_key: "sk_test_xxx".to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
        }
    }

    fn make_test_controller(
        cart_storage: CartServiceMemoryStorage,
        reconciler: SpyReconcilerService,
        payment_config: Option<Payment>,
    ) -> ControllerImpl {
        let cart_factory = Arc::new(move || {
            Box::new(CartServiceMemory {
                inner: cart_storage.clone(),
            }) as Box<dyn CartService>
        });
        ControllerImpl {
            route_parser: Arc::new(routing::make_router()),
            service_factory: Arc::new(ServiceFactory {
                system_factory: Arc::new(|| Box::new(SystemServiceImpl::default()) as Box<dyn SystemService>),
                cart_factory,
                checkout_factory: Arc::new(|| Box::new(StubCheckoutService) as Box<dyn CheckoutService>),
                reconciler_factory: Arc::new(move || Box::new(reconciler.clone()) as Box<dyn ReconcilerService>),
                order_factory: Arc::new(|| Box::new(NullOrderService) as Box<dyn OrderService>),
                admin_factory: Arc::new(|| Box::new(NullAdminService) as Box<dyn AdminService>),
            }),
            payment_config,
        }
    }

    fn run_controller_op(data: CartServiceMemoryStorage, req: Request<Body>) -> Result<String, ControllerError> {
        let controller = make_test_controller(data, SpyReconcilerService::default(), None);
        block_on(controller.call(req))
    }

    fn authed_request(method: Method, uri: &str, user_id: i32, body: Option<String>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, user_id.to_string())
            .body(match body {
                Some(body) => Body::from(body),
                None => Body::empty(),
            })
            .unwrap()
    }

    fn info(quantity: i32) -> CartItemInfo {
        CartItemInfo {
            quantity,
            price: ProductPrice(34.9),
            name: "flocon".to_string(),
            image: "img".to_string(),
            description: None,
        }
    }

    #[test]
    fn test_missing_auth_header() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/cart/products")
            .body(Body::empty())
            .unwrap();

        match run_controller_op(Default::default(), req) {
            Ok(v) => panic!("Expected error, received {}", v),
            Err(ControllerError::BadRequest(e)) => match e.downcast::<AuthorizationError>().unwrap() {
                AuthorizationError::Missing => {}
                other => panic!("Invalid error: {}", other),
            },
            Err(e) => panic!("Invalid error: {}", e),
        }
    }

    #[test]
    fn test_invalid_auth_header() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/cart/products")
            .header(AUTHORIZATION, "12345abc")
            .body(Body::empty())
            .unwrap();

        match run_controller_op(Default::default(), req) {
            Ok(v) => panic!("Expected error, received {}", v),
            Err(ControllerError::BadRequest(e)) => match e.downcast::<AuthorizationError>().unwrap() {
                AuthorizationError::Parse { .. } => {}
                other => panic!("Invalid error: {}", other),
            },
            Err(e) => panic!("Invalid error: {}", e),
        }
    }

    #[test]
    fn test_get_cart() {
        let user_id = 12345;
        let cart = hashmap! { ProductId(555) => info(2) };
        let data = Arc::new(Mutex::new(hashmap! { CustomerId(user_id) => cart.clone() }));

        let req = authed_request(Method::GET, "/cart/products", user_id, None);
        let resp = run_controller_op(data, req).unwrap();

        assert_eq!(serde_json::from_str::<Cart>(&resp).unwrap(), cart);
    }

    #[test]
    fn test_set_cart_nopayload() {
        let req = authed_request(Method::PUT, "/cart/products/555/quantity", 12345, None);

        match run_controller_op(Default::default(), req) {
            Ok(v) => panic!("Expected error, received {}", v),
            Err(ControllerError::UnprocessableEntity(e)) => {
                e.downcast::<serde_json::Error>().unwrap();
            }
            Err(e) => panic!("Invalid error: {}", e),
        }
    }

    #[test]
    fn test_set_cart() {
        let user_id = 12345;
        let product_id = ProductId(555);
        let quantity = 9000;
        let data = Arc::new(Mutex::new(
            hashmap! { CustomerId(user_id) => hashmap! { product_id => info(2) } },
        ));
        let payload = serde_json::to_string(&SetterPayload { value: quantity }).unwrap();

        let req = authed_request(Method::PUT, "/cart/products/555/quantity", user_id, Some(payload));
        let resp = run_controller_op(Arc::clone(&data), req).unwrap();

        let expected_cart = hashmap! { product_id => info(quantity) };
        assert_eq!(
            *data.lock().unwrap(),
            hashmap! { CustomerId(user_id) => expected_cart }
        );
        let item = serde_json::from_str::<Option<CartItem>>(&resp).unwrap().unwrap();
        assert_eq!(item.quantity, quantity);
    }

    #[test]
    fn test_increment_product() {
        let user_id = 12345;
        let payload = serde_json::to_string(&CartProductPayload {
            name: "flocon".to_string(),
            price: ProductPrice(34.9),
            image: "img".to_string(),
            description: None,
        })
        .unwrap();
        let data: CartServiceMemoryStorage = Default::default();

        let req = authed_request(
            Method::POST,
            "/cart/products/555/increment",
            user_id,
            Some(payload),
        );
        let resp = run_controller_op(Arc::clone(&data), req).unwrap();

        let cart = serde_json::from_str::<Cart>(&resp).unwrap();
        assert_eq!(cart.get(&ProductId(555)).unwrap().quantity, 1);
    }

    #[test]
    fn test_delete_item() {
        let user_id = 12345;
        let keep = ProductId(444);
        let remove = ProductId(555);
        let data = Arc::new(Mutex::new(hashmap! {
            CustomerId(user_id) => hashmap! { keep => info(1), remove => info(2) },
        }));

        let req = authed_request(Method::DELETE, "/cart/products/555", user_id, None);
        let resp = run_controller_op(Arc::clone(&data), req).unwrap();

        assert_eq!(
            *data.lock().unwrap(),
            hashmap! { CustomerId(user_id) => hashmap! { keep => info(1) } }
        );
        let removed = serde_json::from_str::<Option<CartItem>>(&resp).unwrap().unwrap();
        assert_eq!(removed.product_id, remove);
    }

    #[test]
    fn test_clear_cart() {
        let user_id = 12345;
        let data = Arc::new(Mutex::new(hashmap! {
            CustomerId(user_id) => hashmap! { ProductId(444) => info(1), ProductId(555) => info(2) },
        }));

        let req = authed_request(Method::POST, "/cart/clear", user_id, None);
        let resp = run_controller_op(Arc::clone(&data), req).unwrap();

        assert_eq!(
            *data.lock().unwrap(),
            hashmap! { CustomerId(user_id) => hashmap! {} }
        );
        assert_eq!(serde_json::from_str::<Cart>(&resp).unwrap(), hashmap! {});
    }

    #[test]
    fn test_checkout_with_empty_cart_is_bad_request() {
        let payload = serde_json::to_string(&CheckoutPayload {
            shipping: ShippingAddress {
                name: "Marie Dupont".to_string(),
                email: "marie@example.com".to_string(),
                phone: None,
                address: "12 rue des Lilas".to_string(),
                city: "Lyon".to_string(),
                postal_code: "69003".to_string(),
                country: "France".to_string(),
            },
            payment_method: PaymentMethod::Card,
        })
        .unwrap();

        let req = authed_request(Method::POST, "/checkout/sessions", 12345, Some(payload));

        match run_controller_op(Default::default(), req) {
            Ok(v) => panic!("Expected error, received {}", v),
            Err(e) => assert_eq!(e.code(), hyper::StatusCode::BAD_REQUEST),
        }
    }

    #[test]
    fn test_tracking_unknown_order_is_not_found() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/orders/by-slug/9999/tracking")
            .body(Body::empty())
            .unwrap();

        match run_controller_op(Default::default(), req) {
            Ok(v) => panic!("Expected error, received {}", v),
            Err(e) => assert_eq!(e.code(), hyper::StatusCode::NOT_FOUND),
        }
    }

    #[test]
    fn test_admin_route_without_cookie_is_unauthorized() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/admin/orders")
            .body(Body::empty())
            .unwrap();

        match run_controller_op(Default::default(), req) {
            Ok(v) => panic!("Expected error, received {}", v),
            Err(e) => assert_eq!(e.code(), hyper::StatusCode::UNAUTHORIZED),
        }
    }

    fn webhook_body() -> String {
        serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_123",
                "url": null,
                "payment_status": "paid",
                "amount_total": 6980,
                "currency": "eur",
                "metadata": {}
            }}
        })
        .to_string()
    }

    #[test]
    fn test_webhook_without_payment_config_is_unavailable() {
        let controller = make_test_controller(Default::default(), SpyReconcilerService::default(), None);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/payment")
            .body(Body::from(webhook_body()))
            .unwrap();

        match block_on(controller.call(req)) {
            Ok(v) => panic!("Expected error, received {}", v),
            Err(e) => assert_eq!(e.code(), hyper::StatusCode::SERVICE_UNAVAILABLE),
        }
    }

    #[test]
    fn test_webhook_with_bad_signature_is_rejected() {
        let reconciler = SpyReconcilerService::default();
        let controller = make_test_controller(
            Default::default(),
            reconciler.clone(),
            Some(test_payment_config()),
        );
        let body = webhook_body();
        let header = signature::sign(body.as_bytes(), "wrong_secret", Utc::now().timestamp());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/payment")
            .header(SIGNATURE_HEADER, header)
            .body(Body::from(body))
            .unwrap();

        match block_on(controller.call(req)) {
            Ok(v) => panic!("Expected error, received {}", v),
            Err(e) => assert_eq!(e.code(), hyper::StatusCode::UNAUTHORIZED),
        }
        assert!(reconciler.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_webhook_with_valid_signature_reaches_the_reconciler() {
        let reconciler = SpyReconcilerService::default();
        let controller = make_test_controller(
            Default::default(),
            reconciler.clone(),
            Some(test_payment_config()),
        );
        let body = webhook_body();
        let header = signature::sign(body.as_bytes(), TEST_WEBHOOK_SECRET, Utc::now().timestamp());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/payment")
            .header(SIGNATURE_HEADER, header)
            .body(Body::from(body))
            .unwrap();

        block_on(controller.call(req)).unwrap();

        let events = reconciler.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.object.id, ProviderSessionId("cs_123".to_string()));
    }
}
