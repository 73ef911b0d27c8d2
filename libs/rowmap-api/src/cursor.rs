use std::future::Future;
use std::pin::Pin;

use crate::decode::Decode;
use crate::error::{BoxError, DecodeError};
use crate::value::Value;

/// Result-set cursor trait.
///
/// The mapping engine doesn't know concrete drivers.
/// For the engine, a result set is just this trait.
pub trait Cursor {
    /// Column names in result order.
    fn columns(&mut self) -> Result<Vec<String>, BoxError>;

    /// Move to the next row. `false` at end of data or on failure;
    /// the failure itself is reported by [`Cursor::final_error`].
    fn advance(&mut self) -> bool;

    /// Decode the current row, one value per slot, in column order.
    fn decode_into(&mut self, slots: &mut [&mut dyn Decode]) -> Result<(), DecodeError>;

    /// Error that ended iteration early, checked after `advance()` returns `false`.
    fn final_error(&mut self) -> Option<BoxError>;

    /// Release the result set. Must be called on every exit path.
    fn close(&mut self) -> Result<(), BoxError>;
}

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    fn columns(&mut self) -> Result<Vec<String>, BoxError> {
        (**self).columns()
    }

    fn advance(&mut self) -> bool {
        (**self).advance()
    }

    fn decode_into(&mut self, slots: &mut [&mut dyn Decode]) -> Result<(), DecodeError> {
        (**self).decode_into(slots)
    }

    fn final_error(&mut self) -> Option<BoxError> {
        (**self).final_error()
    }

    fn close(&mut self) -> Result<(), BoxError> {
        (**self).close()
    }
}

/// Outcome of a statement that doesn't return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Generated id, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// Query execution trait: a connection, transaction or prepared statement.
///
/// Pooling, routing and transaction lifecycle stay behind this trait.
pub trait Executor: Send + Sync {
    type Cursor: Cursor + Send;

    fn query<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> Pin<Box<dyn Future<Output = Result<Self::Cursor, BoxError>> + Send + 'a>>;

    fn exec<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> Pin<Box<dyn Future<Output = Result<ExecResult, BoxError>> + Send + 'a>>;
}

impl<E: Executor + ?Sized> Executor for &E {
    type Cursor = E::Cursor;

    fn query<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> Pin<Box<dyn Future<Output = Result<Self::Cursor, BoxError>> + Send + 'a>> {
        (**self).query(sql, args)
    }

    fn exec<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> Pin<Box<dyn Future<Output = Result<ExecResult, BoxError>> + Send + 'a>> {
        (**self).exec(sql, args)
    }
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    type Cursor = E::Cursor;

    fn query<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> Pin<Box<dyn Future<Output = Result<Self::Cursor, BoxError>> + Send + 'a>> {
        (**self).query(sql, args)
    }

    fn exec<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> Pin<Box<dyn Future<Output = Result<ExecResult, BoxError>> + Send + 'a>> {
        (**self).exec(sql, args)
    }
}
