pub mod client;
pub mod controller;
pub mod request_util;
