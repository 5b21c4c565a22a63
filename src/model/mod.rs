//! Normalized record types, recipient addresses, and property identifiers.

pub mod address;
pub mod mail;
pub mod property;
