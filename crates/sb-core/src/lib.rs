pub mod error;
pub mod record;
pub mod value;

pub use error::{BoxError, TIMEOUT_ERROR_CODE};
pub use record::{Record, RecordField, DEFAULT_STRUCT_TAG};
pub use value::*;
