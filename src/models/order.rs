use std::collections::HashMap;
use std::fmt;

use chrono::prelude::*;
use failure::Fail;
use serde_json::Value;
use tokio_postgres::Row;
use uuid::Uuid;
use validator::Validate;

use super::cart_item::CartItem;
use super::common::*;
use crate::errors::Error;
use crate::util::*;

const ID_COLUMN: &str = "id";
const SLUG_COLUMN: &str = "slug";
const CUSTOMER_COLUMN: &str = "customer";
const STATE_COLUMN: &str = "state";
const PAYMENT_STATUS_COLUMN: &str = "payment_status";
const PAYMENT_METHOD_COLUMN: &str = "payment_method";
const FST_STATUS_COLUMN: &str = "fst_status";
const TOTAL_COLUMN: &str = "total";
const ITEMS_COLUMN: &str = "items";
const PRODUCTS_COLUMN: &str = "products";
const PROVIDER_SESSION_COLUMN: &str = "provider_session";
const CREATED_AT_COLUMN: &str = "created_at";
const UPDATED_AT_COLUMN: &str = "updated_at";

const RECEIVER_NAME_COLUMN: &str = "receiver_name";
const RECEIVER_EMAIL_COLUMN: &str = "receiver_email";
const RECEIVER_PHONE_COLUMN: &str = "receiver_phone";
const ADDRESS_COLUMN: &str = "address";
const CITY_COLUMN: &str = "city";
const POSTAL_CODE_COLUMN: &str = "postal_code";
const COUNTRY_COLUMN: &str = "country";

/// Order lifecycle, labelled the way the storefront displays it. The French
/// labels are both the wire format and the storage format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OrderState {
    /// State set on order creation, before payment completes.
    #[serde(rename = "En attente")]
    PendingPayment,
    /// Set by the reconciler once the payment provider confirms.
    #[serde(rename = "Payé")]
    Paid,
    /// Order is being prepared by the shop.
    #[serde(rename = "En préparation")]
    InPreparation,
    /// Parcel handed to the carrier.
    #[serde(rename = "Expédié")]
    Shipped,
    #[serde(rename = "Livré")]
    Delivered,
    #[serde(rename = "Annulé")]
    Cancelled,
}

impl OrderState {
    pub fn label(&self) -> &'static str {
        use self::OrderState::*;

        match self {
            PendingPayment => "En attente",
            Paid => "Payé",
            InPreparation => "En préparation",
            Shipped => "Expédié",
            Delivered => "Livré",
            Cancelled => "Annulé",
        }
    }

    pub fn into_db(self) -> String {
        self.label().to_string()
    }

    pub fn from_db(state: &str) -> Result<Self, failure::Error> {
        use self::OrderState::*;

        match state {
            "En attente" => Ok(PendingPayment),
            "Payé" => Ok(Paid),
            "En préparation" => Ok(InPreparation),
            "Expédié" => Ok(Shipped),
            "Livré" => Ok(Delivered),
            "Annulé" => Ok(Cancelled),
            other => Err(Error::Parse
                .context(format!("Unknown order state {}", other))
                .into()),
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn into_db(self) -> String {
        use self::PaymentStatus::*;

        match self {
            Pending => "pending",
            Paid => "paid",
            Failed => "failed",
        }
        .to_string()
    }

    pub fn from_db(status: &str) -> Result<Self, failure::Error> {
        use self::PaymentStatus::*;

        match status {
            "pending" => Ok(Pending),
            "paid" => Ok(Paid),
            "failed" => Ok(Failed),
            other => Err(Error::Parse
                .context(format!("Unknown payment status {}", other))
                .into()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Hosted checkout page of the payment provider.
    #[serde(rename = "carte")]
    Card,
    /// FST, the in-house bank transfer flow.
    #[serde(rename = "virement")]
    BankTransfer,
}

impl PaymentMethod {
    pub fn into_db(self) -> String {
        use self::PaymentMethod::*;

        match self {
            Card => "carte",
            BankTransfer => "virement",
        }
        .to_string()
    }

    pub fn from_db(method: &str) -> Result<Self, failure::Error> {
        use self::PaymentMethod::*;

        match method {
            "carte" => Ok(Card),
            "virement" => Ok(BankTransfer),
            other => Err(Error::Parse
                .context(format!("Unknown payment method {}", other))
                .into()),
        }
    }
}

/// Progress of the FST bank transfer. NULL for card orders.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FstStatus {
    #[serde(rename = "en_attente_virement")]
    AwaitingTransfer,
    #[serde(rename = "virement_recu")]
    Received,
}

impl FstStatus {
    pub fn into_db(self) -> String {
        use self::FstStatus::*;

        match self {
            AwaitingTransfer => "en_attente_virement",
            Received => "virement_recu",
        }
        .to_string()
    }

    pub fn from_db(status: &str) -> Result<Self, failure::Error> {
        use self::FstStatus::*;

        match status {
            "en_attente_virement" => Ok(AwaitingTransfer),
            "virement_recu" => Ok(Received),
            other => Err(Error::Parse
                .context(format!("Unknown FST status {}", other))
                .into()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Validate, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 1, max = 200))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
}

impl ShippingAddress {
    pub fn write_into_inserter(self, b: InsertBuilder) -> InsertBuilder {
        b.with_arg(RECEIVER_NAME_COLUMN, self.name)
            .with_arg(RECEIVER_EMAIL_COLUMN, self.email)
            .with_arg(RECEIVER_PHONE_COLUMN, self.phone)
            .with_arg(ADDRESS_COLUMN, self.address)
            .with_arg(CITY_COLUMN, self.city)
            .with_arg(POSTAL_CODE_COLUMN, self.postal_code)
            .with_arg(COUNTRY_COLUMN, self.country)
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            name: row.get(RECEIVER_NAME_COLUMN),
            email: row.get(RECEIVER_EMAIL_COLUMN),
            phone: row.get(RECEIVER_PHONE_COLUMN),
            address: row.get(ADDRESS_COLUMN),
            city: row.get(CITY_COLUMN),
            postal_code: row.get(POSTAL_CODE_COLUMN),
            country: row.get(COUNTRY_COLUMN),
        }
    }

    /// Flattens the address into the checkout session metadata bag.
    pub fn write_into_metadata(&self, metadata: &mut HashMap<String, String>) {
        metadata.insert("shipping_name".to_string(), self.name.clone());
        metadata.insert("shipping_email".to_string(), self.email.clone());
        if let Some(ref phone) = self.phone {
            metadata.insert("shipping_phone".to_string(), phone.clone());
        }
        metadata.insert("shipping_address".to_string(), self.address.clone());
        metadata.insert("shipping_city".to_string(), self.city.clone());
        metadata.insert("shipping_postal_code".to_string(), self.postal_code.clone());
        metadata.insert("shipping_country".to_string(), self.country.clone());
    }

    /// Rebuilds an address from session metadata. None when the bag carries
    /// no shipping keys at all.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Option<Self> {
        if !metadata.keys().any(|k| k.starts_with("shipping_")) {
            return None;
        }

        let field = |key: &str| metadata.get(key).cloned().unwrap_or_default();

        Some(Self {
            name: field("shipping_name"),
            email: field("shipping_email"),
            phone: metadata.get("shipping_phone").cloned(),
            address: field("shipping_address"),
            city: field("shipping_city"),
            postal_code: field("shipping_postal_code"),
            country: field("shipping_country"),
        })
    }
}

/// Snapshot of a product line at checkout time, denormalized into the order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderProduct {
    pub id: ProductId,
    pub name: String,
    pub price: ProductPrice,
    pub quantity: i32,
    pub image: String,
}

impl From<CartItem> for OrderProduct {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.product_id,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
            image: item.image,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        OrderId(Uuid::new_v4())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OrderSlug(pub i32);

impl fmt::Display for OrderSlug {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub slug: OrderSlug,
    pub customer: CustomerId,
    pub state: OrderState,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub fst_status: Option<FstStatus>,
    pub total: ProductPrice,
    pub items: i32,
    pub products: Vec<OrderProduct>,
    pub address: ShippingAddress,
    pub provider_session: Option<ProviderSessionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Row> for Order {
    fn from(row: Row) -> Self {
        let state: String = row.get(STATE_COLUMN);
        let payment_status: String = row.get(PAYMENT_STATUS_COLUMN);
        let payment_method: String = row.get(PAYMENT_METHOD_COLUMN);
        let fst_status: Option<String> = row.get(FST_STATUS_COLUMN);
        let products: Value = row.get(PRODUCTS_COLUMN);
        Self {
            id: OrderId(row.get(ID_COLUMN)),
            slug: OrderSlug(row.get(SLUG_COLUMN)),
            customer: CustomerId(row.get(CUSTOMER_COLUMN)),
            state: OrderState::from_db(&state).unwrap(),
            payment_status: PaymentStatus::from_db(&payment_status).unwrap(),
            payment_method: PaymentMethod::from_db(&payment_method).unwrap(),
            fst_status: fst_status.map(|s| FstStatus::from_db(&s).unwrap()),
            total: ProductPrice(row.get(TOTAL_COLUMN)),
            items: row.get(ITEMS_COLUMN),
            products: serde_json::from_value(products).unwrap(),
            address: ShippingAddress::from_row(&row),
            provider_session: row
                .get::<_, Option<String>>(PROVIDER_SESSION_COLUMN)
                .map(ProviderSessionId),
            created_at: row.get(CREATED_AT_COLUMN),
            updated_at: row.get(UPDATED_AT_COLUMN),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum OrderIdentifier {
    Id(OrderId),
    Slug(OrderSlug),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrderMergeStrategy {
    /// Plain insert, conflicts bubble up.
    Standalone,
    /// Upsert keyed by the provider session id. Arbitrates the race between
    /// the webhook and the success-page confirmation.
    ProviderSessionUpsert,
}

pub struct OrderInserter {
    pub strategy: OrderMergeStrategy,
    pub id: OrderId,
    pub customer: CustomerId,
    pub state: OrderState,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub fst_status: Option<FstStatus>,
    pub total: ProductPrice,
    pub products: Vec<OrderProduct>,
    pub address: ShippingAddress,
    pub provider_session: Option<ProviderSessionId>,
}

impl Inserter for OrderInserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        let items = self.products.len() as i32;
        let products = serde_json::to_value(&self.products).unwrap();
        let mut b = InsertBuilder::new(table)
            .with_arg(ID_COLUMN, self.id.0)
            .with_arg(CUSTOMER_COLUMN, self.customer.0)
            .with_arg(STATE_COLUMN, self.state.into_db())
            .with_arg(PAYMENT_STATUS_COLUMN, self.payment_status.into_db())
            .with_arg(PAYMENT_METHOD_COLUMN, self.payment_method.into_db())
            .with_arg(FST_STATUS_COLUMN, self.fst_status.map(FstStatus::into_db))
            .with_arg(TOTAL_COLUMN, self.total.0)
            .with_arg(ITEMS_COLUMN, items)
            .with_arg(PRODUCTS_COLUMN, products)
            .with_arg(
                PROVIDER_SESSION_COLUMN,
                self.provider_session.map(|session| session.0),
            );

        b = self.address.write_into_inserter(b);

        match self.strategy {
            OrderMergeStrategy::Standalone => b,
            // The WHERE guard makes the second writer of a race come back
            // empty-handed instead of re-transitioning a paid order.
            OrderMergeStrategy::ProviderSessionUpsert => b.with_extra(format!(
                "ON CONFLICT (provider_session) DO UPDATE SET \
                 state = excluded.state, payment_status = excluded.payment_status, \
                 updated_at = now() WHERE {table}.payment_status <> 'paid'",
                table = table
            )),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderSearchTerms {
    pub state: Option<OrderState>,
    pub customer: Option<CustomerId>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub do_order: bool,
    pub id: Option<OrderId>,
    pub slug: Option<OrderSlug>,
    pub customer: Option<CustomerId>,
    pub state: Option<OrderState>,
    pub payment_status: Option<PaymentStatus>,
    pub provider_session: Option<ProviderSessionId>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn with_ordering(mut self, flag: bool) -> Self {
        self.do_order = flag;
        self
    }

    pub fn with_customer(mut self, customer: Option<CustomerId>) -> Self {
        self.customer = customer;
        self
    }

    pub fn from_search_terms(terms: OrderSearchTerms) -> Self {
        Self {
            state: terms.state,
            customer: terms.customer,
            created_from: terms.created_from,
            created_to: terms.created_to,
            ..Default::default()
        }
        .with_ordering(true)
    }
}

impl From<OrderIdentifier> for OrderFilter {
    fn from(v: OrderIdentifier) -> Self {
        use self::OrderIdentifier::*;

        match v {
            Id(id) => Self {
                id: Some(id),
                ..Default::default()
            },
            Slug(slug) => Self {
                slug: Some(slug),
                ..Default::default()
            },
        }
    }
}

impl From<ProviderSessionId> for OrderFilter {
    fn from(v: ProviderSessionId) -> Self {
        Self {
            provider_session: Some(v),
            ..Default::default()
        }
    }
}

impl Filter for OrderFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(id) = self.id {
            b = b.with_filter(ID_COLUMN, id.0);
        }

        if let Some(slug) = self.slug {
            b = b.with_filter(SLUG_COLUMN, slug.0);
        }

        if let Some(customer) = self.customer {
            b = b.with_filter(CUSTOMER_COLUMN, customer.0);
        }

        if let Some(state) = self.state {
            b = b.with_filter(STATE_COLUMN, state.into_db());
        }

        if let Some(payment_status) = self.payment_status {
            b = b.with_filter(PAYMENT_STATUS_COLUMN, payment_status.into_db());
        }

        if let Some(session) = self.provider_session {
            b = b.with_filter(PROVIDER_SESSION_COLUMN, session.0);
        }

        if let Some(from) = self.created_from {
            b = b.with_filter_cmp(CREATED_AT_COLUMN, ">=", from);
        }

        if let Some(to) = self.created_to {
            b = b.with_filter_cmp(CREATED_AT_COLUMN, "<=", to);
        }

        if self.do_order {
            b = b.with_extra("ORDER BY created_at DESC");
        }

        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderUpdateData {
    pub state: Option<OrderState>,
    pub payment_status: Option<PaymentStatus>,
    pub fst_status: Option<FstStatus>,
    pub address: Option<ShippingAddress>,
    pub provider_session: Option<ProviderSessionId>,
}

pub struct OrderUpdater {
    pub mask: OrderFilter,
    pub data: OrderUpdateData,
}

impl Updater for OrderUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let OrderUpdater { mask, data } = self;

        let mut b = UpdateBuilder::from(mask.into_filtered_operation_builder(table));

        if let Some(state) = data.state {
            b = b.with_value(STATE_COLUMN, state.into_db());
        }

        if let Some(payment_status) = data.payment_status {
            b = b.with_value(PAYMENT_STATUS_COLUMN, payment_status.into_db());
        }

        if let Some(fst_status) = data.fst_status {
            b = b.with_value(FST_STATUS_COLUMN, fst_status.into_db());
        }

        if let Some(address) = data.address {
            b = b
                .with_value(RECEIVER_NAME_COLUMN, address.name)
                .with_value(RECEIVER_EMAIL_COLUMN, address.email)
                .with_value(RECEIVER_PHONE_COLUMN, address.phone)
                .with_value(ADDRESS_COLUMN, address.address)
                .with_value(CITY_COLUMN, address.city)
                .with_value(POSTAL_CODE_COLUMN, address.postal_code)
                .with_value(COUNTRY_COLUMN, address.country);
        }

        if let Some(session) = data.provider_session {
            b = b.with_value(PROVIDER_SESSION_COLUMN, session.0);
        }

        b.with_value(UPDATED_AT_COLUMN, Utc::now())
    }
}

/// The 4 fixed steps of the public tracking page.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStep {
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
}

impl TrackingStep {
    /// States outside the linear progression have no step: the tracking
    /// page reports them as not found instead of inventing a position.
    pub fn from_state(state: OrderState) -> Option<Self> {
        use self::OrderState::*;

        match state {
            Paid => Some(TrackingStep::Confirmed),
            InPreparation => Some(TrackingStep::Preparing),
            Shipped => Some(TrackingStep::Shipped),
            Delivered => Some(TrackingStep::Delivered),
            PendingPayment | Cancelled => None,
        }
    }

    pub fn position(&self) -> u8 {
        use self::TrackingStep::*;

        match self {
            Confirmed => 1,
            Preparing => 2,
            Shipped => 3,
            Delivered => 4,
        }
    }
}

/// Body of the admin status-update route.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminOrderStatusPayload {
    pub state: OrderState,
    pub comment: Option<String>,
    pub fst_status: Option<FstStatus>,
}

/// Body of the success-page confirmation route.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutConfirmPayload {
    pub session_id: ProviderSessionId,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderTracking {
    pub order_id: OrderId,
    pub slug: OrderSlug,
    pub state: OrderState,
    pub step: TrackingStep,
    pub position: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_state_round_trips_through_db_labels() {
        for state in [
            OrderState::PendingPayment,
            OrderState::Paid,
            OrderState::InPreparation,
            OrderState::Shipped,
            OrderState::Delivered,
            OrderState::Cancelled,
        ] {
            assert_eq!(OrderState::from_db(&state.into_db()).unwrap(), state);
        }
    }

    #[test]
    fn order_state_serializes_to_french_labels() {
        assert_eq!(
            serde_json::to_string(&OrderState::PendingPayment).unwrap(),
            "\"En attente\""
        );
        assert_eq!(serde_json::to_string(&OrderState::Paid).unwrap(), "\"Payé\"");
    }

    #[test]
    fn unknown_order_state_is_a_parse_error() {
        assert!(OrderState::from_db("Perdu").is_err());
    }

    #[test]
    fn tracking_covers_exactly_the_four_steps() {
        assert_eq!(
            TrackingStep::from_state(OrderState::Paid),
            Some(TrackingStep::Confirmed)
        );
        assert_eq!(
            TrackingStep::from_state(OrderState::InPreparation),
            Some(TrackingStep::Preparing)
        );
        assert_eq!(
            TrackingStep::from_state(OrderState::Shipped),
            Some(TrackingStep::Shipped)
        );
        assert_eq!(
            TrackingStep::from_state(OrderState::Delivered),
            Some(TrackingStep::Delivered)
        );
        assert_eq!(TrackingStep::from_state(OrderState::PendingPayment), None);
        assert_eq!(TrackingStep::from_state(OrderState::Cancelled), None);
    }

    #[test]
    fn shipping_address_round_trips_through_metadata() {
        let address = ShippingAddress {
            name: "Marie Dupont".to_string(),
            email: "marie@example.com".to_string(),
            phone: Some("+33612345678".to_string()),
            address: "12 rue des Lilas".to_string(),
            city: "Lyon".to_string(),
            postal_code: "69003".to_string(),
            country: "France".to_string(),
        };

        let mut metadata = HashMap::new();
        address.write_into_metadata(&mut metadata);

        assert_eq!(ShippingAddress::from_metadata(&metadata), Some(address));
    }

    #[test]
    fn metadata_without_shipping_keys_yields_no_address() {
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), "abc".to_string());
        assert_eq!(ShippingAddress::from_metadata(&metadata), None);
    }
}
