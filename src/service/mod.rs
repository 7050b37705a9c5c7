pub mod dialogue;
mod error;
pub mod payment;
pub mod registration;
pub mod subscription;
pub mod user;

pub use error::ServiceError;
