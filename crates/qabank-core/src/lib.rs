#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod loader;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, MalformedRecord, Result};
pub use store::EntryStore;
pub use types::{CodeSample, Entry, EntryId, NewEntry, Tag};
