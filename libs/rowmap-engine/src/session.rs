use std::any::TypeId;
use std::sync::Arc;

use rowmap_api::cursor::{Cursor, ExecResult, Executor};
use rowmap_api::decode::Discard;
use rowmap_api::error::BoxError;
use rowmap_api::scan::Scan;
use rowmap_api::value::Value;

use crate::error::ScanError;
use crate::mapper::Mapper;
use crate::scan::{self, Destination, RowPlan, ScanOptions, check_element};

// ═══════════════════════════════════════════════════════════════
//  Session
// ═══════════════════════════════════════════════════════════════

/// An executor paired with a mapper and a strict/lenient flag.
///
/// Everything produced from a session (rows, single rows, derived
/// sessions) carries both along.
#[derive(Debug, Clone)]
pub struct Session<E> {
    executor: E,
    mapper: Arc<Mapper>,
    lenient: bool,
}

impl<E: Executor> Session<E> {
    /// Session with the mapper's configured lenient flag.
    pub fn new(executor: E, mapper: Arc<Mapper>) -> Self {
        let lenient = mapper.is_lenient();
        Self {
            executor,
            mapper,
            lenient,
        }
    }

    /// Copy of this session that discards unmatched columns.
    pub fn lenient(&self) -> Self
    where
        E: Clone,
    {
        Self {
            executor: self.executor.clone(),
            mapper: Arc::clone(&self.mapper),
            lenient: true,
        }
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Session over another executor (transaction, prepared statement)
    /// with this session's mapper and flag.
    pub fn inherit<F: Executor>(&self, executor: F) -> Session<F> {
        Session {
            executor,
            mapper: Arc::clone(&self.mapper),
            lenient: self.lenient,
        }
    }

    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows<E::Cursor>, ScanError> {
        let cursor = self.executor.query(sql, args).await.map_err(ScanError::Cursor)?;
        Ok(Rows::new(cursor, Arc::clone(&self.mapper), self.lenient))
    }

    /// Query expected to return one row. A query failure is held in the
    /// returned [`Row`] and surfaces from its scan.
    pub async fn query_row(&self, sql: &str, args: &[Value]) -> Row<E::Cursor> {
        let state = match self.executor.query(sql, args).await {
            Ok(cursor) => Ok(Rows::new(cursor, Arc::clone(&self.mapper), self.lenient)),
            Err(e) => Err(e),
        };
        Row { state }
    }

    /// Run `sql` and scan every row into `dest`. The cursor is closed on
    /// every path.
    pub async fn select<D: Destination>(
        &self,
        dest: &mut D,
        sql: &str,
        args: &[Value],
    ) -> Result<usize, ScanError> {
        let mut rows = self.query(sql, args).await?;
        let scanned = rows.scan_all(dest);
        let closed = rows.close();
        let count = scanned?;
        closed?;
        Ok(count)
    }

    /// Run `sql` and scan its first row into `dest`; [`ScanError::NoRows`]
    /// when there is none.
    pub async fn get<T: Scan>(&self, dest: &mut T, sql: &str, args: &[Value]) -> Result<(), ScanError> {
        self.query_row(sql, args).await.scan(dest)
    }

    pub async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, ScanError> {
        self.executor.exec(sql, args).await.map_err(ScanError::Cursor)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Rows
// ═══════════════════════════════════════════════════════════════

/// Plan for one struct type, reused across `struct_scan` calls.
struct StructPlan {
    type_id: TypeId,
    plan: RowPlan,
    discards: Vec<Discard>,
}

/// Open result set. Closed on drop if not closed explicitly.
pub struct Rows<C: Cursor> {
    cursor: C,
    mapper: Arc<Mapper>,
    lenient: bool,
    closed: bool,
    struct_plan: Option<StructPlan>,
}

impl<C: Cursor> std::fmt::Debug for Rows<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("lenient", &self.lenient)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<C: Cursor> Rows<C> {
    pub fn new(cursor: C, mapper: Arc<Mapper>, lenient: bool) -> Self {
        Self {
            cursor,
            mapper,
            lenient,
            closed: false,
            struct_plan: None,
        }
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    fn options(&self, struct_only: bool) -> ScanOptions {
        ScanOptions {
            struct_only,
            lenient: self.lenient,
        }
    }

    pub fn columns(&mut self) -> Result<Vec<String>, ScanError> {
        self.cursor.columns().map_err(ScanError::Cursor)
    }

    pub fn advance(&mut self) -> bool {
        self.cursor.advance()
    }

    /// Error that ended iteration, once `advance()` has returned `false`.
    pub fn final_error(&mut self) -> Option<BoxError> {
        self.cursor.final_error()
    }

    /// Scan the current row into a struct.
    ///
    /// The column plan is computed on the first call for a type, including
    /// the missing-field check in strict mode, and reused for later rows.
    pub fn struct_scan<T: Scan>(&mut self, dest: &mut T) -> Result<(), ScanError> {
        let key = T::type_key();
        let mut cached = match self.struct_plan.take() {
            Some(cached) if cached.type_id == key => cached,
            _ => {
                let classification = check_element::<T>(self.mapper.cache(), self.options(true))?;
                let columns = self.columns()?;
                StructPlan {
                    type_id: key,
                    plan: RowPlan::build(&classification, &columns, self.lenient)?,
                    discards: vec![Discard; columns.len()],
                }
            }
        };
        let result = cached.plan.decode_row(&mut self.cursor, dest, &mut cached.discards);
        self.struct_plan = Some(cached);
        Ok(result?)
    }

    /// Scan all remaining rows into `dest`. Does not close.
    pub fn scan_all<D: Destination>(&mut self, dest: &mut D) -> Result<usize, ScanError> {
        let options = self.options(false);
        scan::scan_all(self.mapper.cache(), &mut self.cursor, dest, options)
    }

    /// Like [`Rows::scan_all`], rejecting scalar-like element types.
    pub fn scan_all_structs<D: Destination>(&mut self, dest: &mut D) -> Result<usize, ScanError> {
        let options = self.options(true);
        scan::scan_all(self.mapper.cache(), &mut self.cursor, dest, options)
    }

    fn scan_one<T: Scan>(&mut self, dest: &mut T, struct_only: bool) -> Result<(), ScanError> {
        let options = self.options(struct_only);
        scan::scan_one(self.mapper.cache(), &mut self.cursor, dest, options)
    }

    pub fn close(&mut self) -> Result<(), ScanError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.cursor.close().map_err(ScanError::Cursor)
    }
}

impl<C: Cursor> Drop for Rows<C> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.cursor.close() {
                tracing::warn!(error = %e, "failed to close rows on drop");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Row
// ═══════════════════════════════════════════════════════════════

/// Result of [`Session::query_row`]: the rows, or the deferred query error.
pub struct Row<C: Cursor> {
    state: Result<Rows<C>, BoxError>,
}

impl<C: Cursor> std::fmt::Debug for Row<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            Ok(rows) => f.debug_tuple("Row").field(rows).finish(),
            Err(e) => f.debug_struct("Row").field("error", &e.to_string()).finish(),
        }
    }
}

impl<C: Cursor> Row<C> {
    pub fn from_rows(rows: Rows<C>) -> Self {
        Self { state: Ok(rows) }
    }

    /// The deferred query error, if the query failed.
    pub fn err(&self) -> Option<&BoxError> {
        self.state.as_ref().err()
    }

    pub fn is_lenient(&self) -> bool {
        self.state.as_ref().is_ok_and(Rows::is_lenient)
    }

    pub fn columns(&mut self) -> Result<Vec<String>, ScanError> {
        match &mut self.state {
            Ok(rows) => rows.columns(),
            Err(e) => Err(ScanError::Cursor(e.to_string().into())),
        }
    }

    /// Scan the first row into `dest` and close.
    pub fn scan<T: Scan>(self, dest: &mut T) -> Result<(), ScanError> {
        self.finish(dest, false)
    }

    /// Like [`Row::scan`], rejecting scalar-like destinations.
    pub fn struct_scan<T: Scan>(self, dest: &mut T) -> Result<(), ScanError> {
        self.finish(dest, true)
    }

    fn finish<T: Scan>(self, dest: &mut T, struct_only: bool) -> Result<(), ScanError> {
        let mut rows = self.state.map_err(ScanError::Cursor)?;
        let scanned = rows.scan_one(dest, struct_only);
        let closed = rows.close();
        scanned?;
        closed
    }
}
