use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use rowmap_api::{BoxError, Cursor, Decode, DecodeError, ExecResult, Executor, Value};

// ═══════════════════════════════════════════════════════════════
//  ResultSet
// ═══════════════════════════════════════════════════════════════

/// Columns and rows served by a [`MemoryCursor`].
///
/// Fixture format:
///
/// ```json
/// {"columns": ["id", "name"], "rows": [[1, "alice"], [2, null]], "error": "connection reset"}
/// ```
///
/// `error`, when present, is reported by `final_error()` once the rows run out.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResultSet {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
            error: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ═══════════════════════════════════════════════════════════════
//  CloseTracker
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Counts {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Counts cursors opened and closed. Clones share the counters, so a test
/// can keep one after the cursor itself has been moved away.
#[derive(Debug, Clone, Default)]
pub struct CloseTracker {
    counts: Arc<Counts>,
}

impl CloseTracker {
    pub fn opened(&self) -> usize {
        self.counts.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counts.closed.load(Ordering::SeqCst)
    }

    /// Cursors opened but not yet closed.
    pub fn open(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }

    pub fn all_closed(&self) -> bool {
        self.open() == 0
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryCursor
// ═══════════════════════════════════════════════════════════════

/// Cursor over an in-memory [`ResultSet`].
#[derive(Debug)]
pub struct MemoryCursor {
    columns: Vec<String>,
    pending: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    final_error: Option<String>,
    columns_error: Option<String>,
    closed: bool,
    tracker: CloseTracker,
}

impl MemoryCursor {
    pub fn new(set: ResultSet) -> Self {
        Self::tracked(set, CloseTracker::default())
    }

    /// Cursor that reports its open/close to `tracker`.
    pub fn tracked(set: ResultSet, tracker: CloseTracker) -> Self {
        tracker.counts.opened.fetch_add(1, Ordering::SeqCst);
        Self {
            columns: set.columns,
            pending: set.rows.into(),
            current: None,
            final_error: set.error,
            columns_error: None,
            closed: false,
            tracker,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(ResultSet::from_json(json)?))
    }

    /// Report `message` from `final_error()` after the last row.
    pub fn with_final_error(mut self, message: impl Into<String>) -> Self {
        self.final_error = Some(message.into());
        self
    }

    /// Fail `columns()` with `message`.
    pub fn with_columns_error(mut self, message: impl Into<String>) -> Self {
        self.columns_error = Some(message.into());
        self
    }

    pub fn tracker(&self) -> CloseTracker {
        self.tracker.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Rows not yet reached by `advance()`.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl Cursor for MemoryCursor {
    fn columns(&mut self) -> Result<Vec<String>, BoxError> {
        if self.closed {
            return Err("cursor is closed".into());
        }
        match &self.columns_error {
            Some(message) => Err(message.clone().into()),
            None => Ok(self.columns.clone()),
        }
    }

    fn advance(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.current = self.pending.pop_front();
        self.current.is_some()
    }

    fn decode_into(&mut self, slots: &mut [&mut dyn Decode]) -> Result<(), DecodeError> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DecodeError::driver("decode called without a current row"))?;
        if slots.len() != row.len() {
            return Err(DecodeError::driver(format!(
                "expected {} destination arguments in decode, not {}",
                row.len(),
                slots.len()
            )));
        }
        for (index, (slot, value)) in slots.iter_mut().zip(row).enumerate() {
            let name = self.columns.get(index).map(String::as_str).unwrap_or("?");
            slot.decode(value.clone()).map_err(|e| e.with_column(index, name))?;
        }
        Ok(())
    }

    fn final_error(&mut self) -> Option<BoxError> {
        if !self.pending.is_empty() || self.current.is_some() {
            return None;
        }
        self.final_error.clone().map(Into::into)
    }

    fn close(&mut self) -> Result<(), BoxError> {
        if !self.closed {
            self.closed = true;
            self.current = None;
            self.pending.clear();
            self.tracker.counts.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryExecutor
// ═══════════════════════════════════════════════════════════════

/// Executor answering queries from result sets registered per SQL text.
///
/// Every statement run through it is recorded with its arguments.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    results: RwLock<HashMap<String, ResultSet>>,
    execs: RwLock<HashMap<String, ExecResult>>,
    history: RwLock<Vec<(String, Vec<Value>)>>,
    tracker: CloseTracker,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `set` for every `query` of `sql`.
    pub async fn register(&self, sql: impl Into<String>, set: ResultSet) {
        self.results.write().await.insert(sql.into(), set);
    }

    /// Answer `exec` of `sql` with `result`.
    pub async fn register_exec(&self, sql: impl Into<String>, result: ExecResult) {
        self.execs.write().await.insert(sql.into(), result);
    }

    /// Statements run so far, in order, with their arguments.
    pub async fn history(&self) -> Vec<(String, Vec<Value>)> {
        self.history.read().await.clone()
    }

    /// Tracker shared by every cursor this executor hands out.
    pub fn tracker(&self) -> CloseTracker {
        self.tracker.clone()
    }

    async fn record(&self, sql: &str, args: &[Value]) {
        self.history.write().await.push((sql.to_string(), args.to_vec()));
    }
}

impl Executor for MemoryExecutor {
    type Cursor = MemoryCursor;

    fn query<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> Pin<Box<dyn Future<Output = Result<MemoryCursor, BoxError>> + Send + 'a>> {
        Box::pin(async move {
            self.record(sql, args).await;
            let results = self.results.read().await;
            match results.get(sql) {
                Some(set) => Ok(MemoryCursor::tracked(set.clone(), self.tracker.clone())),
                None => {
                    let err: BoxError = format!("no result set registered for query {sql:?}").into();
                    Err(err)
                }
            }
        })
    }

    fn exec<'a>(
        &'a self,
        sql: &'a str,
        args: &'a [Value],
    ) -> Pin<Box<dyn Future<Output = Result<ExecResult, BoxError>> + Send + 'a>> {
        Box::pin(async move {
            self.record(sql, args).await;
            let execs = self.execs.read().await;
            match execs.get(sql) {
                Some(result) => Ok(*result),
                None => {
                    let err: BoxError = format!("no exec result registered for {sql:?}").into();
                    Err(err)
                }
            }
        })
    }
}
