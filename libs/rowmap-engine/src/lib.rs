//! Row-to-struct mapping: column names are matched against a cached
//! structure map of the destination type, and each row is decoded straight
//! into the destination's fields.

pub mod classify;
pub mod config;
pub mod error;
pub mod mapper;
pub mod normalize;
pub mod scan;
pub mod session;
pub mod structure;

pub use classify::Classification;
pub use config::MapperConfig;
pub use error::{ConfigError, ScanError, StructOnlyReason};
pub use mapper::Mapper;
pub use normalize::{NameCase, NameNormalizer};
pub use scan::{Destination, ScanOptions, Shape, scan_all, scan_one};
pub use session::{Row, Rows, Session};
pub use structure::{FieldInfo, StructureCache, StructureMap, Traversal};
