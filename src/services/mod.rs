pub mod types;
pub use self::types::*;

pub mod system;
pub use self::system::*;

pub mod cart;
pub use self::cart::*;

pub mod checkout;
pub use self::checkout::*;

pub mod reconciler;
pub use self::reconciler::*;

pub mod order;
pub use self::order::*;

pub mod admin;
pub use self::admin::*;
