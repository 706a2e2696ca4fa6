//! Metrics sink: append-only processing metrics, one row per attempt.

use std::sync::Arc;

use tracing::debug;

use sismica_core::{
    ColumnDef, ColumnType, ProcessingMetric, Result, Row, TableRef, TableSchema, Warehouse,
};

use crate::warehouse::ensure_table;

pub fn metrics_schema() -> TableSchema {
    TableSchema {
        columns: vec![
            ColumnDef::new("archivo", ColumnType::String),
            ColumnDef::new("fecha_procesamiento", ColumnType::Timestamp),
            ColumnDef::new("status", ColumnType::String),
            ColumnDef::new("error_mensaje", ColumnType::String),
            ColumnDef::new("tiempo_procesamiento_seg", ColumnType::Float),
            ColumnDef::new("model_version", ColumnType::String),
        ],
        key: None,
    }
}

fn metric_row(metric: &ProcessingMetric) -> Row {
    Row::new()
        .with("archivo", metric.archivo.as_str())
        .with("fecha_procesamiento", metric.fecha_procesamiento)
        .with("status", metric.status.as_str())
        .with("error_mensaje", metric.error_mensaje.clone())
        .with("tiempo_procesamiento_seg", metric.tiempo_procesamiento_seg)
        .with("model_version", metric.model_version.as_str())
}

pub struct MetricsStore {
    warehouse: Arc<dyn Warehouse>,
    table: TableRef,
    schema: TableSchema,
}

impl MetricsStore {
    pub fn new(warehouse: Arc<dyn Warehouse>, table: TableRef) -> Self {
        Self {
            warehouse,
            table,
            schema: metrics_schema(),
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Append one metric row, creating the table on first use.
    pub async fn record(&self, metric: &ProcessingMetric) -> Result<()> {
        ensure_table(self.warehouse.as_ref(), &self.table, &self.schema).await?;
        self.warehouse
            .insert_rows(&self.table, &[metric_row(metric)])
            .await?;
        debug!(
            subsystem = "store",
            component = "metrics",
            op = "record",
            archivo = %metric.archivo,
            status = %metric.status,
            db_table = %self.table,
            "Metric recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::MemoryWarehouse;
    use sismica_core::CellValue;

    #[tokio::test]
    async fn test_record_appends_every_attempt() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let table = TableRef::new("p", "gf_pozos", "metricas_procesamiento");
        let metrics = MetricsStore::new(warehouse.clone(), table.clone());

        metrics
            .record(&ProcessingMetric::failure("a.pdf", "boom", 0.5, "gemini-2.5-flash"))
            .await
            .unwrap();
        metrics
            .record(&ProcessingMetric::success("a.pdf", 3.25, "gemini-2.5-flash"))
            .await
            .unwrap();

        let rows = warehouse.rows(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("status").and_then(CellValue::as_str), Some("error"));
        assert_eq!(rows[0].get("error_mensaje").and_then(CellValue::as_str), Some("boom"));
        assert_eq!(rows[1].get("error_mensaje"), Some(&CellValue::Null));
        assert_eq!(
            rows[1].get("tiempo_procesamiento_seg"),
            Some(&CellValue::Float(3.25))
        );
        assert_eq!(warehouse.create_calls(), 1);
    }

    #[test]
    fn test_metrics_schema_has_no_key() {
        let schema = metrics_schema();
        assert!(schema.key.is_none());
        assert_eq!(
            schema.column("tiempo_procesamiento_seg").map(|c| c.column_type),
            Some(ColumnType::Float)
        );
    }
}
