//! PostgreSQL record source implementation.
//!
//! Queries are assembled from the domain schema: table and column names
//! come from static schema definitions, never from caller input; only
//! constraint values are bound as parameters.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info, instrument};

use crate::domain::{
    AppError, Condition, DatabaseError, ExportDomain, FieldKind, FieldValue, Predicate,
    RecordCursor, RecordSource, SourceError,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL-backed [`RecordSource`] with connection pooling
pub struct PostgresRecordSource {
    pool: PgPool,
}

impl PostgresRecordSource {
    /// Create a new source with custom pool configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new source with default pool configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Render the query text for a domain and predicate. Identifiers come
    /// from the static schema; values are numbered placeholders.
    fn build_query(domain: ExportDomain, predicate: &Predicate, limit: i64) -> String {
        let schema = domain.schema();
        let columns = schema.field_names().collect::<Vec<_>>().join(", ");
        let mut sql = format!("SELECT {} FROM {}", columns, schema.table);

        let mut placeholder = 0usize;
        let mut clauses = Vec::new();
        for (column, condition) in predicate.clauses() {
            match condition {
                Condition::Eq(_) => {
                    placeholder += 1;
                    clauses.push(format!("{column} = ${placeholder}"));
                }
                Condition::In(values) => {
                    let slots: Vec<String> = values
                        .iter()
                        .map(|_| {
                            placeholder += 1;
                            format!("${placeholder}")
                        })
                        .collect();
                    clauses.push(format!("{column} IN ({})", slots.join(", ")));
                }
                Condition::Range { min, max } => {
                    if min.is_some() {
                        placeholder += 1;
                        clauses.push(format!("{column} >= ${placeholder}"));
                    }
                    if max.is_some() {
                        placeholder += 1;
                        clauses.push(format!("{column} <= ${placeholder}"));
                    }
                }
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(&format!(" ORDER BY 1 LIMIT {limit}"));
        sql
    }

    fn bind_predicate<'q>(
        mut query: Query<'q, Postgres, PgArguments>,
        predicate: &'q Predicate,
    ) -> Query<'q, Postgres, PgArguments> {
        for (_, condition) in predicate.clauses() {
            match condition {
                Condition::Eq(value) => query = Self::bind_value(query, value),
                Condition::In(values) => {
                    for value in values {
                        query = Self::bind_value(query, value);
                    }
                }
                Condition::Range { min, max } => {
                    if let Some(value) = min {
                        query = Self::bind_value(query, value);
                    }
                    if let Some(value) = max {
                        query = Self::bind_value(query, value);
                    }
                }
            }
        }
        query
    }

    fn bind_value<'q>(
        query: Query<'q, Postgres, PgArguments>,
        value: &'q FieldValue,
    ) -> Query<'q, Postgres, PgArguments> {
        match value {
            FieldValue::Str(s) => query.bind(s.as_str()),
            FieldValue::Num(n) => query.bind(*n),
            FieldValue::Date(d) => query.bind(*d),
            FieldValue::Bool(b) => query.bind(*b),
            // Translation never produces Null; keep placeholders aligned
            FieldValue::Null => query.bind(None::<String>),
        }
    }

    /// Decode one row into the neutral JSON shape the mapper consumes.
    fn row_to_json(domain: ExportDomain, row: &PgRow) -> Result<serde_json::Value, SourceError> {
        let schema = domain.schema();
        let mut object = serde_json::Map::with_capacity(schema.fields.len());
        for spec in schema.fields {
            let value = match spec.kind {
                FieldKind::Str => row
                    .try_get::<Option<String>, _>(spec.name)
                    .map(|v| v.map_or(serde_json::Value::Null, serde_json::Value::String)),
                FieldKind::Num => row.try_get::<Option<f64>, _>(spec.name).map(|v| {
                    v.and_then(|n| serde_json::Number::from_f64(n).map(serde_json::Value::Number))
                        .unwrap_or(serde_json::Value::Null)
                }),
                FieldKind::Date => row.try_get::<Option<DateTime<Utc>>, _>(spec.name).map(|v| {
                    v.map_or(serde_json::Value::Null, |d| {
                        serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Secs, true))
                    })
                }),
                FieldKind::Bool => row
                    .try_get::<Option<bool>, _>(spec.name)
                    .map(|v| v.map_or(serde_json::Value::Null, serde_json::Value::Bool)),
            }
            .map_err(|e| SourceError::Fatal(format!("column {}: {e}", spec.name)))?;
            object.insert(spec.name.to_string(), value);
        }
        Ok(serde_json::Value::Object(object))
    }
}

#[async_trait]
impl RecordSource for PostgresRecordSource {
    #[instrument(skip(self, predicate), fields(domain = %domain))]
    async fn open(
        &self,
        domain: ExportDomain,
        predicate: &Predicate,
        limit: i64,
    ) -> Result<Box<dyn RecordCursor>, SourceError> {
        let sql = Self::build_query(domain, predicate, limit);
        debug!(sql = %sql, "executing export query");

        let query = Self::bind_predicate(sqlx::query(&sql), predicate);
        let rows = query.fetch_all(&self.pool).await.map_err(classify)?;

        let mut records = VecDeque::with_capacity(rows.len());
        for row in &rows {
            records.push_back(Self::row_to_json(domain, row)?);
        }
        Ok(Box::new(PrefetchedCursor { records }))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }
}

/// Transient failures (pool exhaustion, lost connections) are worth one
/// retry; everything else is fatal.
fn classify(err: sqlx::Error) -> SourceError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            SourceError::Transient(err.to_string())
        }
        other => SourceError::Fatal(other.to_string()),
    }
}

/// Result rows are bounded by the export limit, so the cursor holds them
/// in memory; dropping it frees the buffer.
struct PrefetchedCursor {
    records: VecDeque<serde_json::Value>,
}

#[async_trait]
impl RecordCursor for PrefetchedCursor {
    async fn next_batch(&mut self, max: usize) -> Result<Vec<serde_json::Value>, SourceError> {
        let take = max.min(self.records.len());
        Ok(self.records.drain(..take).collect())
    }
}
