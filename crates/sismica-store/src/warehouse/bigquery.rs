//! BigQuery warehouse over the v2 REST API.
//!
//! Table lookup and creation use the `tables` resource, reads and DML use
//! `jobs.query` with named parameters, and appends use streaming
//! `insertAll`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace};

use sismica_core::{
    defaults, CellValue, EndpointConfig, Error, Result, Row, TableRef, TableSchema, TableStatus,
    TokenProvider, Warehouse,
};

use super::{validate_identifier, validate_table};

/// Poll attempts for a query job that did not finish within `timeoutMs`.
const MAX_POLL_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    /// API root including `/bigquery/v2`.
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Server-side wait per `jobs.query` / `getQueryResults` call.
    pub query_timeout_ms: u64,
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BIGQUERY_BASE_URL.to_string(),
            timeout_seconds: defaults::BACKEND_TIMEOUT_SECS,
            query_timeout_ms: defaults::QUERY_TIMEOUT_MS,
        }
    }
}

impl BigQueryConfig {
    pub fn from_endpoints(endpoints: &EndpointConfig) -> Self {
        Self {
            base_url: endpoints.bigquery_base_url.clone(),
            timeout_seconds: defaults::BACKEND_TIMEOUT_SECS,
            query_timeout_ms: endpoints.bigquery_query_timeout_ms,
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryParameter {
    name: String,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ParameterType {
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ParameterValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl QueryParameter {
    fn new(name: impl Into<String>, value: &CellValue) -> Self {
        let (type_, value) = match value {
            CellValue::String(s) => ("STRING", Some(s.clone())),
            CellValue::Timestamp(ts) => (
                "TIMESTAMP",
                Some(ts.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string()),
            ),
            CellValue::Float(v) => ("FLOAT64", Some(v.to_string())),
            CellValue::Null => ("STRING", None),
        };
        Self {
            name: name.into(),
            parameter_type: ParameterType { type_ },
            parameter_value: ParameterValue { value },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    #[serde(default)]
    rows: Vec<TableRow>,
    num_dml_affected_rows: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertError>,
}

#[derive(Debug, Deserialize)]
struct InsertError {
    index: u32,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

// =============================================================================
// STATEMENTS
// =============================================================================

fn quoted(table: &TableRef) -> String {
    format!("`{}.{}.{}`", table.project, table.dataset, table.table)
}

pub(crate) fn count_statement(
    table: &TableRef,
    column: &str,
    value: &str,
) -> Result<(String, Vec<QueryParameter>)> {
    validate_table(table)?;
    validate_identifier(column)?;
    let sql = format!(
        "SELECT COUNT(*) AS total FROM {} WHERE {} = @key",
        quoted(table),
        column
    );
    Ok((sql, vec![QueryParameter::new("key", &value.into())]))
}

pub(crate) fn update_statement(
    table: &TableRef,
    key_column: &str,
    key: &str,
    assignments: &Row,
) -> Result<(String, Vec<QueryParameter>)> {
    validate_table(table)?;
    validate_identifier(key_column)?;
    if assignments.is_empty() {
        return Err(Error::InvalidInput("UPDATE without assignments".into()));
    }
    let mut sets = Vec::with_capacity(assignments.len());
    let mut params = Vec::with_capacity(assignments.len() + 1);
    for (column, value) in assignments.iter() {
        validate_identifier(column)?;
        sets.push(format!("{} = @v_{}", column, column));
        params.push(QueryParameter::new(format!("v_{}", column), value));
    }
    params.push(QueryParameter::new("key", &key.into()));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = @key",
        quoted(table),
        sets.join(", "),
        key_column
    );
    Ok((sql, params))
}

pub(crate) fn merge_statement(
    table: &TableRef,
    key_column: &str,
    row: &Row,
) -> Result<(String, Vec<QueryParameter>)> {
    validate_table(table)?;
    validate_identifier(key_column)?;
    if row.get(key_column).is_none() {
        return Err(Error::InvalidInput(format!("Row has no {} value", key_column)));
    }

    let mut selects = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    let mut columns = Vec::with_capacity(row.len());
    for (column, value) in row.iter() {
        validate_identifier(column)?;
        selects.push(format!("@v_{} AS {}", column, column));
        params.push(QueryParameter::new(format!("v_{}", column), value));
        columns.push(column);
    }

    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != key_column)
        .map(|c| format!("{} = S.{}", c, c))
        .collect();
    let values: Vec<String> = columns.iter().map(|c| format!("S.{}", c)).collect();

    let mut sql = format!(
        "MERGE {} T USING (SELECT {}) S ON T.{} = S.{}",
        quoted(table),
        selects.join(", "),
        key_column,
        key_column
    );
    if !updates.is_empty() {
        sql.push_str(&format!(" WHEN MATCHED THEN UPDATE SET {}", updates.join(", ")));
    }
    sql.push_str(&format!(
        " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
        columns.join(", "),
        values.join(", ")
    ));
    Ok((sql, params))
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct BigQueryWarehouse {
    client: Client,
    config: BigQueryConfig,
    auth: Arc<dyn TokenProvider>,
}

impl BigQueryWarehouse {
    pub fn new(config: BigQueryConfig, auth: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Warehouse(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            auth,
        })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn table_url(&self, table: &TableRef) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.base(),
            table.project,
            table.dataset,
            table.table
        )
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Warehouse(format!(
            "BigQuery {} returned {}: {}",
            what, status, body
        )))
    }

    /// Run a statement and wait for the job to complete.
    async fn query(
        &self,
        project: &str,
        sql: &str,
        params: Vec<QueryParameter>,
    ) -> Result<QueryResponse> {
        let start = Instant::now();
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": params,
            "timeoutMs": self.config.query_timeout_ms,
        });
        trace!(subsystem = "store", component = "bigquery", op = "query", sql, "Submitting query");

        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(format!("{}/projects/{}/queries", self.base(), project))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Warehouse(format!("Query request failed: {}", e)))?;
        let mut result: QueryResponse = Self::check(response, "jobs.query")
            .await?
            .json()
            .await
            .map_err(|e| Error::Warehouse(format!("Failed to parse query response: {}", e)))?;

        let mut attempts = 0;
        while !result.job_complete {
            attempts += 1;
            if attempts > MAX_POLL_ATTEMPTS {
                return Err(Error::Warehouse(format!(
                    "Query did not complete after {} polls",
                    MAX_POLL_ATTEMPTS
                )));
            }
            let job = result
                .job_reference
                .as_ref()
                .ok_or_else(|| Error::Warehouse("Incomplete query without job reference".into()))?;
            let mut request = self
                .client
                .get(format!(
                    "{}/projects/{}/queries/{}",
                    self.base(),
                    project,
                    urlencoding::encode(&job.job_id)
                ))
                .bearer_auth(self.auth.access_token().await?)
                .query(&[("timeoutMs", self.config.query_timeout_ms.to_string())]);
            if let Some(ref location) = job.location {
                request = request.query(&[("location", location)]);
            }
            let response = request
                .send()
                .await
                .map_err(|e| Error::Warehouse(format!("Query poll failed: {}", e)))?;
            let polled: QueryResponse = Self::check(response, "getQueryResults")
                .await?
                .json()
                .await
                .map_err(|e| Error::Warehouse(format!("Failed to parse query results: {}", e)))?;
            result = QueryResponse {
                job_reference: polled.job_reference.or(result.job_reference),
                ..polled
            };
        }

        if let Some(first) = result.errors.first() {
            return Err(Error::Warehouse(first.message.clone()));
        }

        debug!(
            subsystem = "store",
            component = "bigquery",
            op = "query",
            polls = attempts,
            duration_ms = start.elapsed().as_millis() as u64,
            "Query complete"
        );
        Ok(result)
    }
}

fn affected_rows(response: &QueryResponse) -> u64 {
    response
        .num_dml_affected_rows
        .as_deref()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn table_status(&self, table: &TableRef) -> Result<TableStatus> {
        validate_table(table)?;
        let response = self
            .client
            .get(self.table_url(table))
            .bearer_auth(self.auth.access_token().await?)
            .query(&[("fields", "id")])
            .send()
            .await
            .map_err(|e| Error::Warehouse(format!("Table lookup failed: {}", e)))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(TableStatus::Absent);
        }
        Self::check(response, "tables.get").await?;
        Ok(TableStatus::Present)
    }

    async fn create_table(&self, table: &TableRef, schema: &TableSchema) -> Result<()> {
        validate_table(table)?;
        let fields: Vec<serde_json::Value> = schema
            .columns
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "type": c.column_type.bigquery_name(),
                    "mode": "NULLABLE",
                })
            })
            .collect();
        let body = json!({
            "tableReference": {
                "projectId": table.project,
                "datasetId": table.dataset,
                "tableId": table.table,
            },
            "schema": { "fields": fields },
        });
        let response = self
            .client
            .post(format!(
                "{}/projects/{}/datasets/{}/tables",
                self.base(),
                table.project,
                table.dataset
            ))
            .bearer_auth(self.auth.access_token().await?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Warehouse(format!("Table create failed: {}", e)))?;

        // Another instance created it between our lookup and this call.
        if response.status() == StatusCode::CONFLICT {
            debug!(subsystem = "store", component = "bigquery", db_table = %table, "Table already exists");
            return Ok(());
        }
        Self::check(response, "tables.insert").await?;
        Ok(())
    }

    async fn count_rows(&self, table: &TableRef, column: &str, value: &str) -> Result<u64> {
        let (sql, params) = count_statement(table, column, value)?;
        let result = self.query(&table.project, &sql, params).await?;
        let cell = result
            .rows
            .first()
            .and_then(|r| r.f.first())
            .map(|c| &c.v)
            .ok_or_else(|| Error::Warehouse("COUNT returned no rows".into()))?;
        match cell {
            serde_json::Value::String(s) => s
                .parse()
                .map_err(|_| Error::Warehouse(format!("COUNT returned {:?}", s))),
            serde_json::Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| Error::Warehouse(format!("COUNT returned {}", n))),
            other => Err(Error::Warehouse(format!("COUNT returned {}", other))),
        }
    }

    async fn update_rows(
        &self,
        table: &TableRef,
        key_column: &str,
        key: &str,
        assignments: &Row,
    ) -> Result<u64> {
        let (sql, params) = update_statement(table, key_column, key, assignments)?;
        let result = self.query(&table.project, &sql, params).await?;
        Ok(affected_rows(&result))
    }

    async fn insert_rows(&self, table: &TableRef, rows: &[Row]) -> Result<()> {
        validate_table(table)?;
        if rows.is_empty() {
            return Ok(());
        }
        let body = json!({
            "rows": rows.iter().map(|r| json!({ "json": r.to_json() })).collect::<Vec<_>>(),
        });
        let response = self
            .client
            .post(format!("{}/insertAll", self.table_url(table)))
            .bearer_auth(self.auth.access_token().await?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Warehouse(format!("insertAll request failed: {}", e)))?;
        let result: InsertAllResponse = Self::check(response, "insertAll")
            .await?
            .json()
            .await
            .map_err(|e| Error::Warehouse(format!("Failed to parse insertAll response: {}", e)))?;

        if let Some(failed) = result.insert_errors.first() {
            let reasons: Vec<&str> = failed.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(Error::Warehouse(format!(
                "insertAll rejected {} row(s), first at index {}: {}",
                result.insert_errors.len(),
                failed.index,
                reasons.join("; ")
            )));
        }
        debug!(
            subsystem = "store",
            component = "bigquery",
            op = "insert_rows",
            db_table = %table,
            result_count = rows.len(),
            "Rows streamed"
        );
        Ok(())
    }

    async fn merge_row(&self, table: &TableRef, key_column: &str, row: &Row) -> Result<()> {
        let (sql, params) = merge_statement(table, key_column, row)?;
        self.query(&table.project, &sql, params).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "bigquery"
    }
}
