use super::repo::*;
use crate::models::*;

const TABLE: &str = "cart_items";

pub trait CartItemRepo: DbRepo<CartItem, CartItemInserter, CartItemFilter, CartItemUpdater> {}

pub type CartItemRepoImpl = DbRepoImpl<CartItem, CartItemInserter, CartItemFilter, CartItemUpdater>;
impl CartItemRepo for CartItemRepoImpl {}

pub fn make_repo() -> CartItemRepoImpl {
    CartItemRepoImpl::new(TABLE)
}
