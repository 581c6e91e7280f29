pub mod error;
pub mod subscriber;
