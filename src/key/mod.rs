//! Primary-key extraction and the key-based lookup built on it.

pub mod extractor;
pub mod key_values;

pub use extractor::{KeyFinder, extract_key_values, resolve_tracked};
pub use key_values::KeyValues;
