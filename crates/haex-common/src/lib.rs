pub mod error;
pub mod types;
pub mod value;

pub use error::{Error, HostError, Result};
pub use types::{ExtensionInfo, FailurePolicy, TABLE_NAMESPACE_SEPARATOR};
pub use value::SqlValue;
