pub mod error;
pub mod value;

pub use error::{FindError, Result};
pub use value::{DataType, Value};
