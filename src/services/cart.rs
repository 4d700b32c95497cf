use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future;
use futures::prelude::*;
use validator::Validate;

use super::types::*;
use crate::errors::{Error, RepoError};
use crate::models::*;
use crate::repos;
use crate::types::DbPool;

/// Service that provides operations for interacting with customer carts
pub trait CartService: Send + Sync {
    /// Get customer's cart contents
    fn get_cart(&self, customer: CustomerId) -> ServiceFuture<Cart>;
    /// Add a product to the cart: inserts the line with quantity 1 or
    /// increments the stored quantity
    fn increment_item(
        &self,
        customer: CustomerId,
        product_id: ProductId,
        payload: CartProductPayload,
    ) -> ServiceFuture<Cart>;
    /// Set item to desired quantity; the line is removed when the quantity
    /// drops to zero or below
    fn set_quantity(
        &self,
        customer: CustomerId,
        product_id: ProductId,
        quantity: i32,
    ) -> ServiceFuture<Option<CartItem>>;
    /// Delete item from customer's cart
    fn delete_item(&self, customer: CustomerId, product_id: ProductId) -> ServiceFuture<Option<CartItem>>;
    /// Clear customer's cart
    fn clear_cart(&self, customer: CustomerId) -> ServiceFuture<Cart>;
}

fn collect_cart(items: Vec<CartItem>) -> Cart {
    let mut cart = Cart::default();
    for item in items {
        let (product_id, info) = item.into();
        cart.insert(product_id, info);
    }
    cart
}

/// Default implementation of customer cart service
pub struct CartServiceImpl {
    db_pool: DbPool,
    repo_factory: CartItemRepoFactory,
}

impl CartServiceImpl {
    /// Create new cart service with provided DB connection pool
    pub fn new(db_pool: DbPool) -> Self {
        Self {
            db_pool,
            repo_factory: Arc::new(|| Box::new(repos::cart_item::make_repo())),
        }
    }
}

impl CartService for CartServiceImpl {
    fn get_cart(&self, customer: CustomerId) -> ServiceFuture<Cart> {
        debug!("Getting cart for customer {}", customer);

        let db_pool = self.db_pool.clone();
        let repo_factory = self.repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let repo = (repo_factory)();
            let items = repo
                .select(
                    &tx,
                    CartItemFilter {
                        customer: Some(customer),
                        ..Default::default()
                    },
                )
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(collect_cart(items))
        }
        .boxed()
    }

    fn increment_item(
        &self,
        customer: CustomerId,
        product_id: ProductId,
        payload: CartProductPayload,
    ) -> ServiceFuture<Cart> {
        debug!(
            "Adding 1 item {} into cart for customer {}",
            product_id, customer
        );

        let db_pool = self.db_pool.clone();
        let repo_factory = self.repo_factory.clone();
        async move {
            payload
                .validate()
                .map_err(|e| Error::Validate(e.to_string()))?;

            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let repo = (repo_factory)();
            repo.insert(
                &tx,
                CartItemInserter {
                    strategy: CartItemMergeStrategy::Incrementer,
                    customer,
                    data: CartItem {
                        product_id,
                        quantity: 1,
                        price: payload.price,
                        name: payload.name,
                        image: payload.image,
                        description: payload.description,
                    },
                },
            )
            .await?;
            let items = repo
                .select(
                    &tx,
                    CartItemFilter {
                        customer: Some(customer),
                        ..Default::default()
                    },
                )
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(collect_cart(items))
        }
        .boxed()
    }

    fn set_quantity(
        &self,
        customer: CustomerId,
        product_id: ProductId,
        quantity: i32,
    ) -> ServiceFuture<Option<CartItem>> {
        debug!(
            "Setting quantity for item {} for customer {} to {}",
            product_id, customer, quantity
        );

        let db_pool = self.db_pool.clone();
        let repo_factory = self.repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let repo = (repo_factory)();
            let filter = CartItemFilter {
                customer: Some(customer),
                product_id: Some(product_id),
            };
            let mut items = if quantity <= 0 {
                repo.delete(&tx, filter).await?
            } else {
                repo.update(
                    &tx,
                    CartItemUpdater {
                        filter,
                        data: CartItemUpdateData {
                            quantity: Some(quantity),
                        },
                    },
                )
                .await?
            };
            tx.commit().await.map_err(RepoError::from)?;

            Ok(items.pop())
        }
        .boxed()
    }

    fn delete_item(&self, customer: CustomerId, product_id: ProductId) -> ServiceFuture<Option<CartItem>> {
        debug!("Deleting item {} for customer {}", product_id, customer);

        let db_pool = self.db_pool.clone();
        let repo_factory = self.repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let repo = (repo_factory)();
            let mut items = repo
                .delete(
                    &tx,
                    CartItemFilter {
                        customer: Some(customer),
                        product_id: Some(product_id),
                    },
                )
                .await?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(items.pop())
        }
        .boxed()
    }

    fn clear_cart(&self, customer: CustomerId) -> ServiceFuture<Cart> {
        debug!("Clearing cart for customer {}", customer);

        let db_pool = self.db_pool.clone();
        let repo_factory = self.repo_factory.clone();
        async move {
            let mut conn = db_pool.get().await.map_err(pool_error)?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let repo = (repo_factory)();
            repo.delete(
                &tx,
                CartItemFilter {
                    customer: Some(customer),
                    ..Default::default()
                },
            )
            .await?;
            tx.commit().await.map_err(RepoError::from)?;

            Ok(Cart::default())
        }
        .boxed()
    }
}

pub type CartServiceMemoryStorage = Arc<Mutex<HashMap<CustomerId, Cart>>>;

/// In-memory implementation of cart service, used by controller tests
pub struct CartServiceMemory {
    pub inner: CartServiceMemoryStorage,
}

impl CartService for CartServiceMemory {
    fn get_cart(&self, customer: CustomerId) -> ServiceFuture<Cart> {
        let mut inner = self.inner.lock().unwrap();
        let cart = inner.entry(customer).or_insert_with(Cart::default);

        future::ready(Ok(cart.clone())).boxed()
    }

    fn increment_item(
        &self,
        customer: CustomerId,
        product_id: ProductId,
        payload: CartProductPayload,
    ) -> ServiceFuture<Cart> {
        let mut inner = self.inner.lock().unwrap();
        let cart = inner.entry(customer).or_insert_with(Cart::default);

        match cart.get_mut(&product_id) {
            Some(info) => {
                info.quantity += 1;
                info.price = payload.price;
                info.name = payload.name;
                info.image = payload.image;
                info.description = payload.description;
            }
            None => {
                cart.insert(
                    product_id,
                    CartItemInfo {
                        quantity: 1,
                        price: payload.price,
                        name: payload.name,
                        image: payload.image,
                        description: payload.description,
                    },
                );
            }
        }

        future::ready(Ok(cart.clone())).boxed()
    }

    fn set_quantity(
        &self,
        customer: CustomerId,
        product_id: ProductId,
        quantity: i32,
    ) -> ServiceFuture<Option<CartItem>> {
        let mut inner = self.inner.lock().unwrap();
        let cart = inner.entry(customer).or_insert_with(Cart::default);

        if quantity <= 0 {
            return future::ready(Ok(cart
                .remove(&product_id)
                .map(|info| CartItem::from((product_id, info)))))
            .boxed();
        }

        future::ready(Ok(cart.get_mut(&product_id).map(|info| {
            info.quantity = quantity;
            CartItem::from((product_id, info.clone()))
        })))
        .boxed()
    }

    fn delete_item(&self, customer: CustomerId, product_id: ProductId) -> ServiceFuture<Option<CartItem>> {
        let mut inner = self.inner.lock().unwrap();
        let cart = inner.entry(customer).or_insert_with(Cart::default);

        future::ready(Ok(cart
            .remove(&product_id)
            .map(|info| CartItem::from((product_id, info)))))
        .boxed()
    }

    fn clear_cart(&self, customer: CustomerId) -> ServiceFuture<Cart> {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(customer, Cart::default());

        future::ready(Ok(Cart::default())).boxed()
    }
}
