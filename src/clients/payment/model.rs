use std::collections::HashMap;

use crate::errors::Error;
use crate::models::ProviderSessionId;

/// Provider-side limits on the session metadata bag. Oversized entries are a
/// validation error, never silently dropped.
pub const METADATA_MAX_KEYS: usize = 50;
pub const METADATA_KEY_MAX_LEN: usize = 40;
pub const METADATA_VALUE_MAX_LEN: usize = 500;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Unit amount in minor units (centimes).
    pub amount: i64,
    pub currency: String,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
}

/// Checkout session as the provider reports it, both in API answers and
/// inside webhook events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: ProviderSessionId,
    /// Hosted checkout page. Absent once the session completed.
    pub url: Option<String>,
    pub payment_status: SessionPaymentStatus,
    /// Total in minor units.
    pub amount_total: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentEventData {
    pub object: CheckoutSession,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentEventData,
}

pub fn validate_metadata(metadata: &HashMap<String, String>) -> Result<(), failure::Error> {
    if metadata.len() > METADATA_MAX_KEYS {
        return Err(Error::Validate(format!(
            "metadata holds {} keys, provider limit is {}",
            metadata.len(),
            METADATA_MAX_KEYS
        ))
        .into());
    }

    for (key, value) in metadata {
        if key.len() > METADATA_KEY_MAX_LEN {
            return Err(Error::Validate(format!(
                "metadata key {} exceeds {} characters",
                key, METADATA_KEY_MAX_LEN
            ))
            .into());
        }
        if value.len() > METADATA_VALUE_MAX_LEN {
            return Err(Error::Validate(format!(
                "metadata value for {} exceeds {} characters",
                key, METADATA_VALUE_MAX_LEN
            ))
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn small_metadata_passes() {
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), "abc".to_string());
        assert!(validate_metadata(&metadata).is_ok());
    }

    #[test]
    fn oversized_value_is_a_validation_error() {
        let mut metadata = HashMap::new();
        metadata.insert("shipping_address".to_string(), "x".repeat(METADATA_VALUE_MAX_LEN + 1));

        let err = validate_metadata(&metadata).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::Validate(_)) => {}
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn oversized_key_is_a_validation_error() {
        let mut metadata = HashMap::new();
        metadata.insert("k".repeat(METADATA_KEY_MAX_LEN + 1), "v".to_string());
        assert!(validate_metadata(&metadata).is_err());
    }

    #[test]
    fn too_many_keys_is_a_validation_error() {
        let mut metadata = HashMap::new();
        for i in 0..=METADATA_MAX_KEYS {
            metadata.insert(format!("key_{}", i), "v".to_string());
        }
        assert!(validate_metadata(&metadata).is_err());
    }

    #[test]
    fn completed_event_deserializes() {
        let event: PaymentEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_456",
                "url": null,
                "payment_status": "paid",
                "amount_total": 6980,
                "currency": "eur",
                "metadata": { "order_id": "abc" }
            }}
        }))
        .unwrap();

        assert_eq!(event.event_type, CHECKOUT_SESSION_COMPLETED);
        assert_eq!(event.data.object.payment_status, SessionPaymentStatus::Paid);
        assert_eq!(event.data.object.amount_total, 6980);
    }
}
