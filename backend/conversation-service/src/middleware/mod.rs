pub mod auth;
pub mod error_handling;
pub mod guards;
pub mod request_id;

pub use request_id::RequestIdMiddleware;
