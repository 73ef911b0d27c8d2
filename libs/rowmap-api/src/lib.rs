pub mod cursor;
pub mod decode;
pub mod error;
pub mod scan;
pub mod value;

pub use rowmap_api_derive::Scan;

pub use cursor::{Cursor, ExecResult, Executor};
pub use decode::{Decode, Discard};
pub use error::{BoxError, DecodeError};
pub use scan::{Binder, FieldDef, FieldKind, Layout, Scan, ScanKind};
pub use value::Value;
