use std::any::TypeId;

use crate::decode::{Decode, Discard};
use crate::value::Value;

/// How a type presents itself to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Built-in single value (integer, float, bool, text, bytes, `Option<_>`).
    Primitive,
    /// Type with its own [`Decode`] impl. Never field-mapped, even if it has fields.
    Decoder,
    /// Struct whose fields are matched against columns by name.
    Composite,
}

/// Static field table of a type. Produced by `#[derive(Scan)]`, consumed
/// once per type by the engine's structure cache.
#[derive(Debug, Clone)]
pub enum Layout {
    Primitive { type_name: &'static str },
    Decoder { type_name: &'static str },
    Composite { type_name: &'static str, fields: Vec<FieldDef> },
}

impl Layout {
    pub fn kind(&self) -> ScanKind {
        match self {
            Layout::Primitive { .. } => ScanKind::Primitive,
            Layout::Decoder { .. } => ScanKind::Decoder,
            Layout::Composite { .. } => ScanKind::Composite,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Layout::Primitive { type_name }
            | Layout::Decoder { type_name }
            | Layout::Composite { type_name, .. } => type_name,
        }
    }
}

/// One declared field. Position in `Layout::Composite::fields` is the
/// declaration position used in traversal paths, skipped fields included.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Identifier as declared (`user_id`).
    pub name: &'static str,
    /// `#[db(rename = "...")]`: used verbatim, bypasses the name normalizer.
    pub rename: Option<&'static str>,
    /// `#[db(skip)]`: never mapped, never bound.
    pub skip: bool,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Bound as a single decode slot.
    Value,
    /// `#[db(flatten)]`: recursed into when the nested layout is composite.
    Flatten(fn() -> Layout),
}

/// Destination element type the scanner can allocate and fill.
///
/// Derive it for structs (`#[derive(Scan)]`); primitives, `Option<T>`
/// and `Box<T>` are covered here.
pub trait Scan: Default + 'static {
    const KIND: ScanKind;

    /// Element stored behind a pointer (`Box<T>`).
    const INDIRECT: bool = false;

    fn layout() -> Layout;

    /// Type identity used as the structure cache key.
    /// Pointer wrappers report their pointee.
    fn type_key() -> TypeId {
        TypeId::of::<Self>()
    }

    /// Offer every non-skipped field to `binder`, in declaration order,
    /// recursing into flattened composites.
    fn bind_fields<'a>(&'a mut self, binder: &mut Binder<'a>);

    /// The single decode slot of a scalar-like value, if it has one.
    fn as_decode(&mut self) -> Option<&mut dyn Decode>;
}

/// Collects per-row decode slots for one destination instance.
///
/// Fields are offered in layout order; the `n`-th offered field is leaf
/// ordinal `n`. `columns_by_leaf[n]` tells which result column, if any, reads
/// into it.
pub struct Binder<'a> {
    columns_by_leaf: &'a [Option<usize>],
    next_leaf: usize,
    slots: Vec<Option<&'a mut dyn Decode>>,
}

impl<'a> Binder<'a> {
    pub fn new(columns_by_leaf: &'a [Option<usize>], column_count: usize) -> Self {
        let mut slots = Vec::with_capacity(column_count);
        slots.resize_with(column_count, || None);
        Self {
            columns_by_leaf,
            next_leaf: 0,
            slots,
        }
    }

    /// Offer a plain field.
    pub fn field(&mut self, slot: &'a mut dyn Decode) {
        let leaf = self.next_leaf;
        self.next_leaf += 1;
        if let Some(Some(column)) = self.columns_by_leaf.get(leaf) {
            self.slots[*column] = Some(slot);
        }
    }

    /// Offer a `#[db(flatten)]` field.
    pub fn flatten<T: Scan>(&mut self, value: &'a mut T) {
        match T::KIND {
            ScanKind::Composite => value.bind_fields(self),
            ScanKind::Primitive | ScanKind::Decoder => match value.as_decode() {
                Some(slot) => self.field(slot),
                None => self.next_leaf += 1,
            },
        }
    }

    /// Number of fields offered so far.
    pub fn offered(&self) -> usize {
        self.next_leaf
    }

    /// Finish binding: columns without a field read into `discards`.
    ///
    /// `discards` must hold one sink per column.
    pub fn finish(self, discards: &'a mut [Discard]) -> Vec<&'a mut dyn Decode> {
        self.slots
            .into_iter()
            .zip(discards.iter_mut())
            .map(|(slot, discard)| match slot {
                Some(slot) => slot,
                None => discard as &mut dyn Decode,
            })
            .collect()
    }
}

macro_rules! scan_primitive {
    ($($ty:ty),* $(,)?) => {$(
        impl Scan for $ty {
            const KIND: ScanKind = ScanKind::Primitive;

            fn layout() -> Layout {
                Layout::Primitive { type_name: std::any::type_name::<Self>() }
            }

            fn bind_fields<'a>(&'a mut self, _binder: &mut Binder<'a>) {}

            fn as_decode(&mut self) -> Option<&mut dyn Decode> {
                Some(self)
            }
        }
    )*};
}

scan_primitive!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String, Vec<u8>,
    Value, serde_json::Value,
);

impl<T: Decode + Default + 'static> Scan for Option<T> {
    const KIND: ScanKind = ScanKind::Primitive;

    fn layout() -> Layout {
        Layout::Primitive { type_name: std::any::type_name::<Self>() }
    }

    fn bind_fields<'a>(&'a mut self, _binder: &mut Binder<'a>) {}

    fn as_decode(&mut self) -> Option<&mut dyn Decode> {
        Some(self)
    }
}

impl<T: Scan> Scan for Box<T> {
    const KIND: ScanKind = T::KIND;
    const INDIRECT: bool = true;

    fn layout() -> Layout {
        T::layout()
    }

    fn type_key() -> TypeId {
        T::type_key()
    }

    fn bind_fields<'a>(&'a mut self, binder: &mut Binder<'a>) {
        (**self).bind_fields(binder)
    }

    fn as_decode(&mut self) -> Option<&mut dyn Decode> {
        (**self).as_decode()
    }
}
