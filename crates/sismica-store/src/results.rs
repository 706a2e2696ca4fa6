//! Result sink: one row per object path holding the raw model response.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use sismica_core::{
    ColumnDef, ColumnType, ExtractionResult, PipelineVariant, Result, Row, TableRef, TableSchema,
    UpsertStrategy, Warehouse,
};

use crate::warehouse::ensure_table;

/// Key column of the results table.
pub const KEY_COLUMN: &str = "archivo";

/// Results table schema for a variant. `Full` adds the processing timestamp.
pub fn results_schema(variant: PipelineVariant) -> TableSchema {
    let mut columns = vec![
        ColumnDef::new("archivo", ColumnType::String),
        ColumnDef::new("respuesta_modelo", ColumnType::String),
    ];
    if variant.stores_timestamp() {
        columns.push(ColumnDef::new("fecha_procesamiento", ColumnType::Timestamp));
    }
    TableSchema {
        columns,
        key: Some(KEY_COLUMN),
    }
}

pub struct ResultStore {
    warehouse: Arc<dyn Warehouse>,
    table: TableRef,
    schema: TableSchema,
    strategy: UpsertStrategy,
    variant: PipelineVariant,
}

impl ResultStore {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        table: TableRef,
        strategy: UpsertStrategy,
        variant: PipelineVariant,
    ) -> Self {
        Self {
            warehouse,
            table,
            schema: results_schema(variant),
            strategy,
            variant,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Store `respuesta` for `archivo`, replacing any earlier response.
    ///
    /// With [`UpsertStrategy::CheckThenWrite`] two concurrent calls for the
    /// same path may both insert.
    pub async fn upsert(&self, archivo: &str, respuesta: &str) -> Result<ExtractionResult> {
        let start = Instant::now();
        ensure_table(self.warehouse.as_ref(), &self.table, &self.schema).await?;

        let result = ExtractionResult {
            archivo: archivo.to_string(),
            respuesta_modelo: respuesta.to_string(),
            fecha_procesamiento: self.variant.stores_timestamp().then(Utc::now),
        };
        let mut row = Row::new()
            .with("archivo", archivo)
            .with("respuesta_modelo", respuesta);
        if let Some(ts) = result.fecha_procesamiento {
            row.set("fecha_procesamiento", ts);
        }

        let op = match self.strategy {
            UpsertStrategy::Merge => {
                self.warehouse
                    .merge_row(&self.table, KEY_COLUMN, &row)
                    .await?;
                "merge"
            }
            UpsertStrategy::CheckThenWrite => {
                let existing = self
                    .warehouse
                    .count_rows(&self.table, KEY_COLUMN, archivo)
                    .await?;
                if existing > 0 {
                    self.warehouse
                        .update_rows(&self.table, KEY_COLUMN, archivo, &row.without(KEY_COLUMN))
                        .await?;
                    "update"
                } else {
                    self.warehouse
                        .insert_rows(&self.table, std::slice::from_ref(&row))
                        .await?;
                    "insert"
                }
            }
        };

        debug!(
            subsystem = "store",
            component = "results",
            op,
            archivo,
            db_table = %self.table,
            response_len = respuesta.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Result stored"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::MemoryWarehouse;
    use sismica_core::CellValue;
    use tokio::sync::Barrier;

    fn table() -> TableRef {
        TableRef::new("p", "gf_pozos", "resultados_pozos")
    }

    fn store(
        warehouse: &Arc<MemoryWarehouse>,
        strategy: UpsertStrategy,
        variant: PipelineVariant,
    ) -> ResultStore {
        ResultStore::new(warehouse.clone(), table(), strategy, variant)
    }

    fn texts(warehouse: &MemoryWarehouse) -> Vec<String> {
        warehouse
            .rows(&table())
            .iter()
            .filter_map(|r| r.get("respuesta_modelo").and_then(CellValue::as_str))
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_schema_per_variant() {
        let full = results_schema(PipelineVariant::Full);
        assert!(full.column("fecha_procesamiento").is_some());
        let minimal = results_schema(PipelineVariant::Minimal);
        assert_eq!(minimal.columns.len(), 2);
        assert_eq!(minimal.key, Some("archivo"));
    }

    #[tokio::test]
    async fn test_serial_upserts_leave_one_row_with_latest_text() {
        for strategy in [UpsertStrategy::Merge, UpsertStrategy::CheckThenWrite] {
            let warehouse = Arc::new(MemoryWarehouse::new());
            let results = store(&warehouse, strategy, PipelineVariant::Full);

            results.upsert("lineas/a.pdf", "{\"v\": 1}").await.unwrap();
            results.upsert("lineas/a.pdf", "{\"v\": 2}").await.unwrap();

            assert_eq!(texts(&warehouse), vec!["{\"v\": 2}"], "strategy {}", strategy);
            assert_eq!(warehouse.create_calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_full_variant_writes_timestamp_minimal_does_not() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let full = store(&warehouse, UpsertStrategy::Merge, PipelineVariant::Full);
        let result = full.upsert("a.pdf", "x").await.unwrap();
        assert!(result.fecha_procesamiento.is_some());
        let rows = warehouse.rows(&table());
        assert!(matches!(
            rows[0].get("fecha_procesamiento"),
            Some(CellValue::Timestamp(_))
        ));

        let warehouse = Arc::new(MemoryWarehouse::new());
        let minimal = store(&warehouse, UpsertStrategy::CheckThenWrite, PipelineVariant::Minimal);
        let result = minimal.upsert("a.pdf", "x").await.unwrap();
        assert!(result.fecha_procesamiento.is_none());
        assert!(warehouse.rows(&table())[0].get("fecha_procesamiento").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_check_then_write_can_duplicate() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let results = Arc::new(store(
            &warehouse,
            UpsertStrategy::CheckThenWrite,
            PipelineVariant::Full,
        ));
        // Create the table up front so both calls go straight to the count.
        results.upsert("otro.pdf", "seed").await.unwrap();
        warehouse.pause_after_count(Arc::new(Barrier::new(2)));

        let a = {
            let results = results.clone();
            tokio::spawn(async move { results.upsert("a.pdf", "first").await })
        };
        let b = {
            let results = results.clone();
            tokio::spawn(async move { results.upsert("a.pdf", "second").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let dupes = warehouse
            .rows(&table())
            .iter()
            .filter(|r| r.get("archivo").and_then(CellValue::as_str) == Some("a.pdf"))
            .count();
        assert_eq!(dupes, 2);
    }

    #[tokio::test]
    async fn test_concurrent_merge_leaves_one_row() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let results = Arc::new(store(&warehouse, UpsertStrategy::Merge, PipelineVariant::Full));

        let calls = (0..8).map(|i| {
            let results = results.clone();
            tokio::spawn(async move { results.upsert("a.pdf", &format!("r{}", i)).await })
        });
        for call in futures::future::join_all(calls).await {
            call.unwrap().unwrap();
        }
        assert_eq!(warehouse.rows(&table()).len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        warehouse.fail_operation("merge_row", "quota exceeded");
        let results = store(&warehouse, UpsertStrategy::Merge, PipelineVariant::Full);
        let err = results.upsert("a.pdf", "x").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
