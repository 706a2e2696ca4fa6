//! In-memory warehouse for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Barrier;

use sismica_core::{
    CellValue, Error, Result, Row, TableRef, TableSchema, TableStatus, Warehouse,
};

#[derive(Default)]
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<TableRef, Vec<Row>>>,
    failures: Mutex<HashMap<String, String>>,
    count_barrier: Mutex<Option<Arc<Barrier>>>,
    creates: AtomicUsize,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `op` (a trait method name) fail with `message`.
    pub fn fail_operation(&self, op: &str, message: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(op.to_string(), message.to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    /// Hold every `count_rows` call at `barrier` after it has counted.
    ///
    /// Lets tests line up concurrent check-then-write upserts so both see
    /// the same count.
    pub fn pause_after_count(&self, barrier: Arc<Barrier>) {
        if let Ok(mut slot) = self.count_barrier.lock() {
            *slot = Some(barrier);
        }
    }

    /// Number of `create_table` calls so far.
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &TableRef) -> Vec<Row> {
        self.tables
            .lock()
            .ok()
            .and_then(|t| t.get(table).cloned())
            .unwrap_or_default()
    }

    fn check(&self, op: &str) -> Result<()> {
        let failure = self
            .failures
            .lock()
            .map_err(|_| Error::Internal("warehouse lock poisoned".into()))?
            .get(op)
            .cloned();
        match failure {
            Some(msg) => Err(Error::Warehouse(msg)),
            None => Ok(()),
        }
    }

    fn with_table<T>(&self, table: &TableRef, f: impl FnOnce(&mut Vec<Row>) -> T) -> Result<T> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::Internal("warehouse lock poisoned".into()))?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| Error::NotFound(format!("Table {}", table)))?;
        Ok(f(rows))
    }
}

fn matches_key(row: &Row, column: &str, value: &str) -> bool {
    row.get(column).and_then(CellValue::as_str) == Some(value)
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn table_status(&self, table: &TableRef) -> Result<TableStatus> {
        self.check("table_status")?;
        let tables = self
            .tables
            .lock()
            .map_err(|_| Error::Internal("warehouse lock poisoned".into()))?;
        Ok(if tables.contains_key(table) {
            TableStatus::Present
        } else {
            TableStatus::Absent
        })
    }

    async fn create_table(&self, table: &TableRef, _schema: &TableSchema) -> Result<()> {
        self.check("create_table")?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::Internal("warehouse lock poisoned".into()))?;
        tables.entry(table.clone()).or_default();
        Ok(())
    }

    async fn count_rows(&self, table: &TableRef, column: &str, value: &str) -> Result<u64> {
        self.check("count_rows")?;
        let count = self.with_table(table, |rows| {
            rows.iter().filter(|r| matches_key(r, column, value)).count() as u64
        })?;
        let barrier = self.count_barrier.lock().ok().and_then(|b| b.clone());
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        Ok(count)
    }

    async fn update_rows(
        &self,
        table: &TableRef,
        key_column: &str,
        key: &str,
        assignments: &Row,
    ) -> Result<u64> {
        self.check("update_rows")?;
        self.with_table(table, |rows| {
            let mut affected = 0;
            for row in rows.iter_mut().filter(|r| matches_key(r, key_column, key)) {
                for (column, value) in assignments.iter() {
                    row.set(column, value.clone());
                }
                affected += 1;
            }
            affected
        })
    }

    async fn insert_rows(&self, table: &TableRef, new_rows: &[Row]) -> Result<()> {
        self.check("insert_rows")?;
        self.with_table(table, |rows| rows.extend(new_rows.iter().cloned()))
    }

    async fn merge_row(&self, table: &TableRef, key_column: &str, row: &Row) -> Result<()> {
        self.check("merge_row")?;
        let key = row
            .get(key_column)
            .and_then(CellValue::as_str)
            .ok_or_else(|| Error::InvalidInput(format!("Row has no {} value", key_column)))?
            .to_string();
        self.with_table(table, |rows| {
            let mut matched = false;
            for existing in rows.iter_mut().filter(|r| matches_key(r, key_column, &key)) {
                for (column, value) in row.iter() {
                    existing.set(column, value.clone());
                }
                matched = true;
            }
            if !matched {
                rows.push(row.clone());
            }
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
