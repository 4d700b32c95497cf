pub mod repo;
pub use self::repo::*;

pub mod cart_item;
pub use self::cart_item::*;

pub mod order;
pub use self::order::*;

pub mod order_event;
pub use self::order_event::*;

pub mod admin;
pub use self::admin::*;
