//! qabank-text
//!
//! Tag index and ranked query engine over an entry store. See `index` and
//! `search`; `text_utils` holds the shared normalization and term splitting.
pub mod index;
pub mod search;
pub mod text_utils;

pub use index::TagIndex;
pub use search::{Query, QueryEngine};
