use super::repo::*;
use crate::models::*;

const TABLE: &str = "order_events";

pub trait OrderEventRepo: DbRepo<OrderEvent, OrderEventInserter, OrderEventFilter, DummyOrderEventUpdater> {}

pub type OrderEventRepoImpl = DbRepoImpl<OrderEvent, OrderEventInserter, OrderEventFilter, DummyOrderEventUpdater>;
impl OrderEventRepo for OrderEventRepoImpl {}

pub fn make_repo() -> OrderEventRepoImpl {
    OrderEventRepoImpl::new(TABLE)
}
