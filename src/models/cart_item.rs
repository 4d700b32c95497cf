use std::collections::HashMap;

use tokio_postgres::Row;
use validator::Validate;

use super::common::*;
use crate::util::*;

const CUSTOMER_COLUMN: &str = "customer";
const PRODUCT_ID_COLUMN: &str = "product_id";
const QUANTITY_COLUMN: &str = "quantity";
const PRICE_COLUMN: &str = "price";
const NAME_COLUMN: &str = "name";
const IMAGE_COLUMN: &str = "image";
const DESCRIPTION_COLUMN: &str = "description";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItemInfo {
    pub quantity: i32,
    pub price: ProductPrice,
    pub name: String,
    pub image: String,
    pub description: Option<String>,
}

/// Cart contents, keyed by product id.
pub type Cart = HashMap<ProductId, CartItemInfo>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: ProductPrice,
    pub name: String,
    pub image: String,
    pub description: Option<String>,
}

impl From<(ProductId, CartItemInfo)> for CartItem {
    fn from((product_id, info): (ProductId, CartItemInfo)) -> Self {
        Self {
            product_id,
            quantity: info.quantity,
            price: info.price,
            name: info.name,
            image: info.image,
            description: info.description,
        }
    }
}

impl From<CartItem> for (ProductId, CartItemInfo) {
    fn from(item: CartItem) -> Self {
        (
            item.product_id,
            CartItemInfo {
                quantity: item.quantity,
                price: item.price,
                name: item.name,
                image: item.image,
                description: item.description,
            },
        )
    }
}

impl From<Row> for CartItem {
    fn from(row: Row) -> Self {
        Self {
            product_id: ProductId(row.get(PRODUCT_ID_COLUMN)),
            quantity: row.get(QUANTITY_COLUMN),
            price: ProductPrice(row.get(PRICE_COLUMN)),
            name: row.get(NAME_COLUMN),
            image: row.get(IMAGE_COLUMN),
            description: row.get(DESCRIPTION_COLUMN),
        }
    }
}

/// Body of the add-to-cart route: everything about the product except its
/// id, which rides in the path.
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
pub struct CartProductPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub price: ProductPrice,
    pub image: String,
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CartItemMergeStrategy {
    /// Plain insert, conflicts bubble up.
    Standalone,
    /// On conflict, add the inserted quantity to the stored line.
    Incrementer,
    /// On conflict, overwrite the stored line.
    Replacer,
}

pub struct CartItemInserter {
    pub strategy: CartItemMergeStrategy,
    pub customer: CustomerId,
    pub data: CartItem,
}

impl Inserter for CartItemInserter {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        use self::CartItemMergeStrategy::*;

        let mut b = InsertBuilder::new(table)
            .with_arg(CUSTOMER_COLUMN, self.customer.0)
            .with_arg(PRODUCT_ID_COLUMN, self.data.product_id.0)
            .with_arg(QUANTITY_COLUMN, self.data.quantity)
            .with_arg(PRICE_COLUMN, self.data.price.0)
            .with_arg(NAME_COLUMN, self.data.name)
            .with_arg(IMAGE_COLUMN, self.data.image)
            .with_arg(DESCRIPTION_COLUMN, self.data.description);

        b = match self.strategy {
            Standalone => b,
            Incrementer => b.with_extra(format!(
                "ON CONFLICT (customer, product_id) DO UPDATE SET \
                 quantity = {table}.quantity + excluded.quantity, price = excluded.price, \
                 name = excluded.name, image = excluded.image, description = excluded.description",
                table = table
            )),
            Replacer => b.with_extra(
                "ON CONFLICT (customer, product_id) DO UPDATE SET \
                 quantity = excluded.quantity, price = excluded.price, \
                 name = excluded.name, image = excluded.image, description = excluded.description",
            ),
        };

        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct CartItemFilter {
    pub customer: Option<CustomerId>,
    pub product_id: Option<ProductId>,
}

impl Filter for CartItemFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(customer) = self.customer {
            b = b.with_filter(CUSTOMER_COLUMN, customer.0);
        }

        if let Some(product_id) = self.product_id {
            b = b.with_filter(PRODUCT_ID_COLUMN, product_id.0);
        }

        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct CartItemUpdateData {
    pub quantity: Option<i32>,
}

pub struct CartItemUpdater {
    pub filter: CartItemFilter,
    pub data: CartItemUpdateData,
}

impl Updater for CartItemUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let CartItemUpdater { filter, data } = self;

        let mut b = UpdateBuilder::from(filter.into_filtered_operation_builder(table));

        if let Some(quantity) = data.quantity {
            b = b.with_value(QUANTITY_COLUMN, quantity);
        }

        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> CartItem {
        CartItem {
            product_id: ProductId(5555),
            quantity: 1,
            price: ProductPrice(34.9),
            name: "Boule à neige".to_string(),
            image: "https://img.flocon.example/5555.jpg".to_string(),
            description: None,
        }
    }

    #[test]
    fn incrementer_adds_to_stored_quantity() {
        let (query, args) = CartItemInserter {
            strategy: CartItemMergeStrategy::Incrementer,
            customer: CustomerId(1234),
            data: item(),
        }
        .into_insert_builder("cart_items")
        .build();

        assert!(query.contains("ON CONFLICT (customer, product_id)"));
        assert!(query.contains("quantity = cart_items.quantity + excluded.quantity"));
        assert_eq!(args.len(), 7);
    }

    #[test]
    fn replacer_overwrites_stored_quantity() {
        let (query, _) = CartItemInserter {
            strategy: CartItemMergeStrategy::Replacer,
            customer: CustomerId(1234),
            data: item(),
        }
        .into_insert_builder("cart_items")
        .build();

        assert!(query.contains("quantity = excluded.quantity"));
    }

    #[test]
    fn cart_item_splits_into_cart_entry() {
        let (product_id, info) = <(ProductId, CartItemInfo)>::from(item());
        assert_eq!(product_id, ProductId(5555));
        assert_eq!(info.quantity, 1);
        assert_eq!(CartItem::from((product_id, info)), item());
    }
}
