use derive_more::{Display, From, FromStr, Into};

#[derive(Clone, Copy, Debug, Default, Display, From, FromStr, Into, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ProductPrice(pub f64);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, PartialEq, Serialize, Deserialize)]
pub struct CustomerId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, PartialEq, Serialize, Deserialize)]
pub struct ProductId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, PartialEq, Serialize, Deserialize)]
pub struct AdminId(pub i32);

/// Checkout session id assigned by the payment provider. The stable
/// idempotency key of an order.
#[derive(Clone, Debug, Default, Display, Eq, From, FromStr, Hash, Into, PartialEq, Serialize, Deserialize)]
pub struct ProviderSessionId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetterPayload<T> {
    pub value: T,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueContainer<T> {
    pub value: T,
}

impl<T> From<T> for ValueContainer<T> {
    fn from(value: T) -> Self {
        Self { value }
    }
}
