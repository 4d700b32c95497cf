use std::fmt;
use std::str::FromStr;

use chrono::prelude::*;
use failure::Fail;
use serde::ser::Serializer;
use serde::Serialize;
use tokio_postgres::Row;
use uuid::Uuid;

use super::common::*;
use super::order::{OrderId, OrderState};
use crate::errors::Error;
use crate::util::*;

const ID_COLUMN: &str = "id";
const PARENT_COLUMN: &str = "parent";
const SOURCE_COLUMN: &str = "source";
const COMMITTED_AT_COLUMN: &str = "committed_at";
const STATE_COLUMN: &str = "state";
const COMMENT_COLUMN: &str = "comment";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OrderEventId(pub Uuid);

/// Who committed a state transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventSource {
    /// Order creation at checkout.
    Checkout,
    /// Payment provider webhook.
    GatewayWebhook,
    /// Success-page confirmation from the storefront.
    Confirmation,
    Admin(AdminId),
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::EventSource::*;

        match self {
            Checkout => write!(f, "checkout"),
            GatewayWebhook => write!(f, "webhook"),
            Confirmation => write!(f, "confirmation"),
            Admin(id) => write!(f, "admin:{}", id),
        }
    }
}

impl FromStr for EventSource {
    type Err = failure::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use self::EventSource::*;

        match s {
            "checkout" => Ok(Checkout),
            "webhook" => Ok(GatewayWebhook),
            "confirmation" => Ok(Confirmation),
            other => match other.strip_prefix("admin:") {
                Some(id) => id
                    .parse()
                    .map(|id| Admin(AdminId(id)))
                    .map_err(|_| Error::Parse.context(format!("Bad event source {}", other)).into()),
                None => Err(Error::Parse
                    .context(format!("Unknown event source {}", other))
                    .into()),
            },
        }
    }
}

impl Serialize for EventSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One entry of the append-only status history of an order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderEvent {
    pub id: OrderEventId,
    pub parent: OrderId,
    pub source: EventSource,
    pub committed_at: DateTime<Utc>,
    pub state: OrderState,
    pub comment: Option<String>,
}

impl From<Row> for OrderEvent {
    fn from(row: Row) -> Self {
        let source: String = row.get(SOURCE_COLUMN);
        let state: String = row.get(STATE_COLUMN);
        Self {
            id: OrderEventId(row.get(ID_COLUMN)),
            parent: OrderId(row.get(PARENT_COLUMN)),
            source: source.parse().unwrap(),
            committed_at: row.get(COMMITTED_AT_COLUMN),
            state: OrderState::from_db(&state).unwrap(),
            comment: row.get(COMMENT_COLUMN),
        }
    }
}

pub struct OrderEventInserter {
    pub parent: OrderId,
    pub source: EventSource,
    pub committed_at: DateTime<Utc>,
    pub state: OrderState,
    pub comment: Option<String>,
}

impl Inserter for OrderEventInserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(PARENT_COLUMN, self.parent.0)
            .with_arg(SOURCE_COLUMN, self.source.to_string())
            .with_arg(COMMITTED_AT_COLUMN, self.committed_at)
            .with_arg(STATE_COLUMN, self.state.into_db())
            .with_arg(COMMENT_COLUMN, self.comment)
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderEventFilter {
    pub do_order: bool,
    pub parent: Option<ValueContainer<OrderId>>,
}

impl OrderEventFilter {
    pub fn with_ordering(mut self, flag: bool) -> Self {
        self.do_order = flag;
        self
    }
}

impl From<OrderId> for OrderEventFilter {
    fn from(v: OrderId) -> Self {
        Self {
            parent: Some(v.into()),
            ..Default::default()
        }
    }
}

impl Filter for OrderEventFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.parent {
            b = b.with_filter(PARENT_COLUMN, v.value.0);
        }

        if self.do_order {
            b = b.with_extra("ORDER BY committed_at DESC");
        }

        b
    }
}

pub struct DummyOrderEventUpdater {}

impl Updater for DummyOrderEventUpdater {
    fn into_update_builder(self, _table: &'static str) -> UpdateBuilder {
        unreachable!()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_source_round_trips() {
        for source in [
            EventSource::Checkout,
            EventSource::GatewayWebhook,
            EventSource::Confirmation,
            EventSource::Admin(AdminId(3)),
        ] {
            assert_eq!(source.to_string().parse::<EventSource>().unwrap(), source);
        }
    }

    #[test]
    fn bad_event_sources_are_rejected() {
        assert!("robot".parse::<EventSource>().is_err());
        assert!("admin:abc".parse::<EventSource>().is_err());
    }
}
