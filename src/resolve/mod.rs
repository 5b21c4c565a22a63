//! Resolution of message fields from raw archive properties.

pub mod address;
pub mod classify;
pub mod property;
