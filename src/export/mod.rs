//! Writing extracted content to the filesystem.

pub mod attachment;
