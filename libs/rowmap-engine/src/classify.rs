use std::sync::Arc;

use rowmap_api::scan::{Scan, ScanKind};

use crate::error::StructOnlyReason;
use crate::structure::{StructureCache, StructureMap};

/// How the scanner treats a destination element type.
#[derive(Debug, Clone)]
pub enum Classification {
    /// One opaque value per row, decoded from the single column.
    Scalar {
        type_name: &'static str,
        reason: StructOnlyReason,
    },
    /// Fields matched against columns by name.
    Composite(Arc<StructureMap>),
}

impl Classification {
    pub fn is_scalar_like(&self) -> bool {
        matches!(self, Classification::Scalar { .. })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Classification::Scalar { type_name, .. } => *type_name,
            Classification::Composite(map) => map.type_name(),
        }
    }
}

/// Classify `T`. Capability comes before structure: a struct with its own
/// `Decode` impl is scalar-like whatever fields it has.
pub fn classify<T: Scan>(cache: &StructureCache) -> Classification {
    let map = cache.resolve::<T>();
    let type_name = map.type_name();
    let scalar = |reason| Classification::Scalar { type_name, reason };
    match map.kind() {
        ScanKind::Decoder => scalar(StructOnlyReason::Decoder),
        ScanKind::Primitive => scalar(StructOnlyReason::Primitive),
        ScanKind::Composite if map.is_empty() => scalar(StructOnlyReason::NoFields),
        ScanKind::Composite => Classification::Composite(map),
    }
}

pub fn is_scalar_like<T: Scan>(cache: &StructureCache) -> bool {
    classify::<T>(cache).is_scalar_like()
}
