pub mod client;
pub mod model;
pub mod signature;

pub use self::client::*;
pub use self::model::*;
