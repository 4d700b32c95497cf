use super::repo::*;
use crate::models::*;

const TABLE: &str = "orders";

pub trait OrderRepo: DbRepo<Order, OrderInserter, OrderFilter, OrderUpdater> {}

pub type OrderRepoImpl = DbRepoImpl<Order, OrderInserter, OrderFilter, OrderUpdater>;
impl OrderRepo for OrderRepoImpl {}

pub fn make_repo() -> OrderRepoImpl {
    OrderRepoImpl::new(TABLE)
}
