//! `pst-harvest`: extract mail items and attachments from mailbox archives
//! into a normalized SQLite store.
//!
//! The library walks an archive through the [`archive`] traits, resolves
//! each field from whichever legacy property carries it, writes attachments
//! to disk and persists records in transactional batches.

pub mod archive;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod parser;
pub mod resolve;
pub mod store;
pub mod walker;
