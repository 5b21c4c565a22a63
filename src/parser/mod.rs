//! Text decoding: charset normalization, transport headers, and RTF bodies.

pub mod encoding;
pub mod header;
pub mod rtf;
