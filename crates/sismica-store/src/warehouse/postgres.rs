//! PostgreSQL warehouse. The dataset becomes a schema; the project is ignored.

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use tracing::debug;

use sismica_core::{
    CellValue, Error, Result, Row, TableRef, TableSchema, TableStatus, Warehouse,
};

use super::{validate_identifier, validate_table};

pub struct PostgresWarehouse {
    pool: PgPool,
}

impl PostgresWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn qualified(table: &TableRef) -> Result<String> {
    validate_table(table)?;
    Ok(format!("\"{}\".\"{}\"", table.dataset, table.table))
}

fn column(name: &str) -> Result<String> {
    Ok(format!("\"{}\"", validate_identifier(name)?))
}

fn bind_cell<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &CellValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        CellValue::String(s) => query.bind(s.clone()),
        CellValue::Timestamp(ts) => query.bind(*ts),
        CellValue::Float(v) => query.bind(*v),
        CellValue::Null => query.bind(None::<String>),
    }
}

fn insert_sql(table: &str, row: &Row) -> Result<String> {
    let columns = row.columns().map(column).collect::<Result<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    ))
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    async fn table_status(&self, table: &TableRef) -> Result<TableStatus> {
        let name = qualified(table)?;
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(&name)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(if exists {
            TableStatus::Present
        } else {
            TableStatus::Absent
        })
    }

    async fn create_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()> {
        let name = qualified(table)?;
        let mut defs = schema
            .columns
            .iter()
            .map(|c| Ok(format!("{} {}", column(c.name)?, c.column_type.postgres_name())))
            .collect::<Result<Vec<_>>>()?;
        if let Some(key) = schema.key {
            defs.push(format!("UNIQUE ({})", column(key)?));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", table.dataset))
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            name,
            defs.join(", ")
        ))
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(subsystem = "store", component = "postgres", db_table = %name, "Table ensured");
        Ok(())
    }

    async fn count_rows(&self, table: &TableRef, col: &str, value: &str) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            qualified(table)?,
            column(col)?
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count.max(0) as u64)
    }

    async fn update_rows(
        &self,
        table: &TableRef,
        key_column: &str,
        key: &str,
        assignments: &Row,
    ) -> Result<u64> {
        if assignments.is_empty() {
            return Err(Error::InvalidInput("UPDATE without assignments".into()));
        }
        let mut sets = Vec::with_capacity(assignments.len());
        for (i, name) in assignments.columns().enumerate() {
            sets.push(format!("{} = ${}", column(name)?, i + 1));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${}",
            qualified(table)?,
            sets.join(", "),
            column(key_column)?,
            assignments.len() + 1
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in assignments.iter() {
            query = bind_cell(query, value);
        }
        let result = query
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn insert_rows(&self, table: &TableRef, rows: &[Row]) -> Result<()> {
        let name = qualified(table)?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for row in rows {
            let sql = insert_sql(&name, row)?;
            let mut query = sqlx::query(&sql);
            for (_, value) in row.iter() {
                query = bind_cell(query, value);
            }
            query.execute(&mut *tx).await.map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn merge_row(&self, table: &TableRef, key_column: &str, row: &Row) -> Result<()> {
        if row.get(key_column).is_none() {
            return Err(Error::InvalidInput(format!("Row has no {} value", key_column)));
        }
        let key = column(key_column)?;
        let updates = row
            .columns()
            .filter(|c| *c != key_column)
            .map(|c| column(c).map(|q| format!("{} = EXCLUDED.{}", q, q)))
            .collect::<Result<Vec<_>>>()?;
        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "{} ON CONFLICT ({}) {}",
            insert_sql(&qualified(table)?, row)?,
            key,
            conflict
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in row.iter() {
            query = bind_cell(query, value);
        }
        query.execute(&self.pool).await.map_err(Error::Database)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
