use std::collections::VecDeque;

use rowmap_api::cursor::Cursor;
use rowmap_api::decode::Discard;
use rowmap_api::error::DecodeError;
use rowmap_api::scan::{Binder, Scan};

use crate::classify::{Classification, classify};
use crate::error::ScanError;
use crate::structure::StructureCache;

/// Whether a destination holds one element or any number of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Single,
    Sequence,
}

/// Container the scanner appends elements to.
pub trait Destination {
    type Item: Scan;

    fn shape(&self) -> Shape;

    /// Append one fully decoded element.
    fn push(&mut self, item: Self::Item);
}

impl<T: Scan> Destination for Vec<T> {
    type Item = T;

    fn shape(&self) -> Shape {
        Shape::Sequence
    }

    fn push(&mut self, item: T) {
        Vec::push(self, item)
    }
}

impl<T: Scan> Destination for VecDeque<T> {
    type Item = T;

    fn shape(&self) -> Shape {
        Shape::Sequence
    }

    fn push(&mut self, item: T) {
        self.push_back(item)
    }
}

impl<T: Scan> Destination for Option<T> {
    type Item = T;

    fn shape(&self) -> Shape {
        Shape::Single
    }

    fn push(&mut self, item: T) {
        *self = Some(item);
    }
}

/// Per-call scan switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Reject scalar-like element types.
    pub struct_only: bool,
    /// Discard columns with no matching field instead of failing.
    pub lenient: bool,
}

impl ScanOptions {
    pub fn with_struct_only(mut self, struct_only: bool) -> Self {
        self.struct_only = struct_only;
        self
    }

    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }
}

/// Classify the element type, enforcing `struct_only`. Runs before the
/// cursor is touched.
pub(crate) fn check_element<T: Scan>(
    cache: &StructureCache,
    options: ScanOptions,
) -> Result<Classification, ScanError> {
    let classification = classify::<T>(cache);
    if options.struct_only {
        if let Classification::Scalar { type_name, reason } = &classification {
            return Err(ScanError::StructOnlyViolation {
                type_name: *type_name,
                reason: *reason,
            });
        }
    }
    Ok(classification)
}

/// Where each column of a result set goes, fixed for the whole scan.
#[derive(Debug)]
pub(crate) enum RowPlan {
    /// The one column decodes into the element itself.
    Scalar { type_name: &'static str },
    /// `columns_by_leaf[leaf]` is the column read into field `leaf`.
    Composite {
        type_name: &'static str,
        columns_by_leaf: Vec<Option<usize>>,
    },
}

impl RowPlan {
    pub(crate) fn build(
        classification: &Classification,
        columns: &[String],
        lenient: bool,
    ) -> Result<Self, ScanError> {
        match classification {
            Classification::Scalar { type_name, .. } => {
                if columns.len() != 1 {
                    return Err(ScanError::ShapeMismatch {
                        type_name: *type_name,
                        columns: columns.len(),
                    });
                }
                Ok(RowPlan::Scalar {
                    type_name: *type_name,
                })
            }
            Classification::Composite(map) => {
                let mut columns_by_leaf = vec![None; map.len()];
                let traversals = map.traversals_by_names(columns);
                for (index, (column, traversal)) in columns.iter().zip(&traversals).enumerate() {
                    match traversal.leaf() {
                        // A later duplicate column overrides an earlier one.
                        Some(leaf) => columns_by_leaf[leaf] = Some(index),
                        None if lenient => {
                            tracing::trace!(
                                column = column.as_str(),
                                type_name = map.type_name(),
                                "discarding unmapped column"
                            );
                        }
                        None => {
                            return Err(ScanError::MissingField {
                                column: column.clone(),
                                type_name: map.type_name(),
                            });
                        }
                    }
                }
                Ok(RowPlan::Composite {
                    type_name: map.type_name(),
                    columns_by_leaf,
                })
            }
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            RowPlan::Scalar { type_name } | RowPlan::Composite { type_name, .. } => *type_name,
        }
    }

    /// Decode the cursor's current row into `item`.
    ///
    /// `discards` holds one sink per column.
    pub(crate) fn decode_row<C: Cursor + ?Sized, T: Scan>(
        &self,
        cursor: &mut C,
        item: &mut T,
        discards: &mut [Discard],
    ) -> Result<(), DecodeError> {
        match self {
            RowPlan::Scalar { type_name } => match item.as_decode() {
                Some(slot) => cursor.decode_into(&mut [slot]),
                None => Err(DecodeError::unsupported(type_name)),
            },
            RowPlan::Composite { columns_by_leaf, .. } => {
                let mut binder = Binder::new(columns_by_leaf, discards.len());
                item.bind_fields(&mut binder);
                let mut slots = binder.finish(discards);
                cursor.decode_into(&mut slots)
            }
        }
    }
}

/// Drain `cursor` into `dest`, one new element per row. Returns the number of
/// rows scanned.
///
/// Elements decoded before a failing row stay in `dest`. The cursor is not
/// closed.
pub fn scan_all<C, D>(
    cache: &StructureCache,
    cursor: &mut C,
    dest: &mut D,
    options: ScanOptions,
) -> Result<usize, ScanError>
where
    C: Cursor + ?Sized,
    D: Destination,
{
    if dest.shape() != Shape::Sequence {
        return Err(ScanError::InvalidDestination(format!(
            "expected a sequence destination, got a single {}",
            std::any::type_name::<D::Item>()
        )));
    }
    let classification = check_element::<D::Item>(cache, options)?;
    let columns = cursor.columns().map_err(ScanError::Cursor)?;
    let plan = RowPlan::build(&classification, &columns, options.lenient)?;

    let mut discards = vec![Discard; columns.len()];
    let mut rows = 0usize;
    while cursor.advance() {
        let mut item = D::Item::default();
        plan.decode_row(cursor, &mut item, &mut discards)
            .map_err(|e| ScanError::from(e).with_context(format!("row {rows}")))?;
        dest.push(item);
        rows += 1;
    }
    if let Some(err) = cursor.final_error() {
        return Err(ScanError::Cursor(err));
    }

    tracing::debug!(
        type_name = plan.type_name(),
        columns = columns.len(),
        rows,
        "scanned result set"
    );
    Ok(rows)
}

/// Decode the first row of `cursor` into `dest`.
///
/// Does not read past the first row and does not close the cursor.
pub fn scan_one<C, T>(
    cache: &StructureCache,
    cursor: &mut C,
    dest: &mut T,
    options: ScanOptions,
) -> Result<(), ScanError>
where
    C: Cursor + ?Sized,
    T: Scan,
{
    let classification = check_element::<T>(cache, options)?;
    let columns = cursor.columns().map_err(ScanError::Cursor)?;
    let plan = RowPlan::build(&classification, &columns, options.lenient)?;

    if !cursor.advance() {
        return Err(match cursor.final_error() {
            Some(err) => ScanError::Cursor(err),
            None => ScanError::NoRows,
        });
    }
    let mut discards = vec![Discard; columns.len()];
    plan.decode_row(cursor, dest, &mut discards)?;
    Ok(())
}
