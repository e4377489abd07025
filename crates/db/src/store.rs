//! Retry-wrapped document and global operations.
//!
//! The surface the content platform's collections are written against.
//! Documents from every collection share one `document` table (the
//! collection slug partitions the key space, `data` carries the fields);
//! globals are singleton documents keyed by slug in their own table.
//!
//! Every operation builds a [`Statement`], runs it through the
//! [`RetryPolicy`] against the manager's current executor, and reports a
//! final transient failure to the manager so a reconnect cycle starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use marula_core::{CollectionName, DocumentId, GlobalSlug};

use crate::error::DbError;
use crate::executor::{Param, Row, Statement};
use crate::manager::ConnectionManager;
use crate::retry::RetryPolicy;

/// Columns every document query selects, in decode order.
const DOCUMENT_COLUMNS: &str = "id, collection, data, created_at, updated_at";

/// A stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub collection: CollectionName,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored global (singleton document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub slug: GlobalSlug,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

/// Equality filter on top-level document fields.
///
/// Compiled to a jsonb containment predicate (`data @> {...}`), which the
/// GIN index on `data` serves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Map<String, Value>);

impl Filter {
    /// An empty filter matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Whether the filter has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn to_containment_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort key for `find`. Documents sort on their timestamps; field-level
/// ordering belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    CreatedAt(SortDirection),
    UpdatedAt(SortDirection),
}

impl Default for Sort {
    fn default() -> Self {
        Self::CreatedAt(SortDirection::Desc)
    }
}

/// Pagination and ordering for `find`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Sort,
}

/// The retry-wrapped CRUD surface.
#[derive(Clone)]
pub struct CollectionStore {
    manager: ConnectionManager,
    retry: RetryPolicy,
}

impl CollectionStore {
    /// Create a store with the default retry policy.
    #[must_use]
    pub fn new(manager: ConnectionManager) -> Self {
        Self::with_retry_policy(manager, RetryPolicy::default())
    }

    /// Create a store with an explicit retry policy.
    #[must_use]
    pub const fn with_retry_policy(manager: ConnectionManager, retry: RetryPolicy) -> Self {
        Self { manager, retry }
    }

    /// List documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn find(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DbError> {
        let stmt = find_statement(collection, filter, options);
        let rows = self.run("find", stmt).await?;
        rows.iter().map(document_from_row).collect()
    }

    /// Fetch a single document by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no such document exists.
    pub async fn find_by_id(
        &self,
        collection: &CollectionName,
        id: DocumentId,
    ) -> Result<Document, DbError> {
        let stmt = find_by_id_statement(collection, id);
        let rows = self.run("find_by_id", stmt).await?;
        rows.first().map_or(Err(DbError::NotFound), document_from_row)
    }

    /// Count documents matching a filter.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn count(
        &self,
        collection: &CollectionName,
        filter: &Filter,
    ) -> Result<u64, DbError> {
        let stmt = count_statement(collection, filter);
        let rows = self.run("count", stmt).await?;
        let row = rows
            .first()
            .ok_or_else(|| DbError::Decode("count returned no rows".to_owned()))?;
        row_u64(row, "count")
    }

    /// Create a document with a generated id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure.
    pub async fn create(
        &self,
        collection: &CollectionName,
        data: Value,
    ) -> Result<Document, DbError> {
        self.create_with_id(collection, DocumentId::generate(), data)
            .await
    }

    /// Create a document under a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if the id already exists.
    pub async fn create_with_id(
        &self,
        collection: &CollectionName,
        id: DocumentId,
        data: Value,
    ) -> Result<Document, DbError> {
        let stmt = create_statement(collection, id, &data);
        let rows = self.run("create", stmt).await?;
        rows.first().map_or_else(
            || Err(DbError::Decode("insert returned no row".to_owned())),
            document_from_row,
        )
    }

    /// Replace a document's data.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no such document exists.
    pub async fn update(
        &self,
        collection: &CollectionName,
        id: DocumentId,
        data: Value,
    ) -> Result<Document, DbError> {
        let stmt = update_statement(collection, id, &data);
        let rows = self.run("update", stmt).await?;
        rows.first().map_or(Err(DbError::NotFound), document_from_row)
    }

    /// Delete a document, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no such document exists.
    pub async fn delete(
        &self,
        collection: &CollectionName,
        id: DocumentId,
    ) -> Result<Document, DbError> {
        let stmt = delete_statement(collection, id);
        let rows = self.run("delete", stmt).await?;
        rows.first().map_or(Err(DbError::NotFound), document_from_row)
    }

    /// Fetch a global, if it has ever been written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn find_global(&self, slug: &GlobalSlug) -> Result<Option<Global>, DbError> {
        let stmt = find_global_statement(slug);
        let rows = self.run("find_global", stmt).await?;
        rows.first().map(global_from_row).transpose()
    }

    /// Create or replace a global.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn update_global(&self, slug: &GlobalSlug, data: Value) -> Result<Global, DbError> {
        let stmt = update_global_statement(slug, &data);
        let rows = self.run("update_global", stmt).await?;
        rows.first().map_or_else(
            || Err(DbError::Decode("upsert returned no row".to_owned())),
            global_from_row,
        )
    }

    /// Run one statement through the retry policy, reporting a final
    /// transient failure to the manager.
    async fn run(&self, operation: &'static str, stmt: Statement) -> Result<Vec<Row>, DbError> {
        let manager = &self.manager;
        let result = self
            .retry
            .run(operation, || {
                let stmt = stmt.clone();
                async move {
                    let executor = manager.executor().await?;
                    executor.fetch(&stmt).await
                }
            })
            .await;

        if let Err(error) = &result {
            manager.report_failure(error);
        }
        result
    }
}

// =============================================================================
// Statement builders
// =============================================================================

fn find_statement(
    collection: &CollectionName,
    filter: &Filter,
    options: &FindOptions,
) -> Statement {
    let mut sql = format!("SELECT {DOCUMENT_COLUMNS} FROM document WHERE collection = $1");
    let mut params = vec![Param::Text(collection.as_str().to_owned())];

    if !filter.is_empty() {
        params.push(Param::Json(filter.to_containment_json()));
        sql.push_str(&format!(" AND data @> ${}", params.len()));
    }

    sql.push_str(order_by_clause(options.sort));

    if let Some(limit) = options.limit {
        params.push(Param::Int(limit));
        sql.push_str(&format!(" LIMIT ${}", params.len()));
    }
    if let Some(offset) = options.offset {
        params.push(Param::Int(offset));
        sql.push_str(&format!(" OFFSET ${}", params.len()));
    }

    Statement::new(sql, params)
}

fn find_by_id_statement(collection: &CollectionName, id: DocumentId) -> Statement {
    Statement::new(
        format!("SELECT {DOCUMENT_COLUMNS} FROM document WHERE collection = $1 AND id = $2"),
        vec![
            Param::Text(collection.as_str().to_owned()),
            Param::Uuid(id.as_uuid()),
        ],
    )
}

fn count_statement(collection: &CollectionName, filter: &Filter) -> Statement {
    let mut sql = String::from("SELECT COUNT(*) AS count FROM document WHERE collection = $1");
    let mut params = vec![Param::Text(collection.as_str().to_owned())];

    if !filter.is_empty() {
        params.push(Param::Json(filter.to_containment_json()));
        sql.push_str(&format!(" AND data @> ${}", params.len()));
    }

    Statement::new(sql, params)
}

fn create_statement(collection: &CollectionName, id: DocumentId, data: &Value) -> Statement {
    Statement::new(
        format!(
            "INSERT INTO document (id, collection, data) VALUES ($1, $2, $3) \
             RETURNING {DOCUMENT_COLUMNS}"
        ),
        vec![
            Param::Uuid(id.as_uuid()),
            Param::Text(collection.as_str().to_owned()),
            Param::Json(data.clone()),
        ],
    )
}

fn update_statement(collection: &CollectionName, id: DocumentId, data: &Value) -> Statement {
    Statement::new(
        format!(
            "UPDATE document SET data = $3, updated_at = now() \
             WHERE collection = $1 AND id = $2 RETURNING {DOCUMENT_COLUMNS}"
        ),
        vec![
            Param::Text(collection.as_str().to_owned()),
            Param::Uuid(id.as_uuid()),
            Param::Json(data.clone()),
        ],
    )
}

fn delete_statement(collection: &CollectionName, id: DocumentId) -> Statement {
    Statement::new(
        format!(
            "DELETE FROM document WHERE collection = $1 AND id = $2 RETURNING {DOCUMENT_COLUMNS}"
        ),
        vec![
            Param::Text(collection.as_str().to_owned()),
            Param::Uuid(id.as_uuid()),
        ],
    )
}

fn find_global_statement(slug: &GlobalSlug) -> Statement {
    Statement::new(
        "SELECT slug, data, updated_at FROM global WHERE slug = $1",
        vec![Param::Text(slug.as_str().to_owned())],
    )
}

fn update_global_statement(slug: &GlobalSlug, data: &Value) -> Statement {
    Statement::new(
        "INSERT INTO global (slug, data) VALUES ($1, $2) \
         ON CONFLICT (slug) DO UPDATE SET data = EXCLUDED.data, updated_at = now() \
         RETURNING slug, data, updated_at",
        vec![
            Param::Text(slug.as_str().to_owned()),
            Param::Json(data.clone()),
        ],
    )
}

const fn order_by_clause(sort: Sort) -> &'static str {
    match sort {
        Sort::CreatedAt(SortDirection::Asc) => " ORDER BY created_at ASC",
        Sort::CreatedAt(SortDirection::Desc) => " ORDER BY created_at DESC",
        Sort::UpdatedAt(SortDirection::Asc) => " ORDER BY updated_at ASC",
        Sort::UpdatedAt(SortDirection::Desc) => " ORDER BY updated_at DESC",
    }
}

// =============================================================================
// Row decoding
// =============================================================================

fn document_from_row(row: &Row) -> Result<Document, DbError> {
    Ok(Document {
        id: DocumentId::new(row_uuid(row, "id")?),
        collection: CollectionName::parse(row_str(row, "collection")?)
            .map_err(|e| DbError::Decode(format!("invalid collection in database: {e}")))?,
        data: row_json(row, "data"),
        created_at: row_timestamp(row, "created_at")?,
        updated_at: row_timestamp(row, "updated_at")?,
    })
}

fn global_from_row(row: &Row) -> Result<Global, DbError> {
    Ok(Global {
        slug: GlobalSlug::parse(row_str(row, "slug")?)
            .map_err(|e| DbError::Decode(format!("invalid slug in database: {e}")))?,
        data: row_json(row, "data"),
        updated_at: row_timestamp(row, "updated_at")?,
    })
}

fn row_value<'a>(row: &'a Row, column: &str) -> Result<&'a Value, DbError> {
    row.get(column)
        .ok_or_else(|| DbError::Decode(format!("missing column {column}")))
}

fn row_str<'a>(row: &'a Row, column: &str) -> Result<&'a str, DbError> {
    row_value(row, column)?
        .as_str()
        .ok_or_else(|| DbError::Decode(format!("column {column} is not a string")))
}

fn row_uuid(row: &Row, column: &str) -> Result<uuid::Uuid, DbError> {
    row_str(row, column)?
        .parse()
        .map_err(|e| DbError::Decode(format!("column {column} is not a uuid: {e}")))
}

fn row_json(row: &Row, column: &str) -> Value {
    row.get(column).cloned().unwrap_or(Value::Null)
}

fn row_timestamp(row: &Row, column: &str) -> Result<DateTime<Utc>, DbError> {
    let raw = row_str(row, column)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DbError::Decode(format!("column {column} is not a timestamp: {e}")))
}

/// Counts arrive as a JSON number from the wire protocol and as a string
/// from the http transport (int8 exceeds JSON's safe integer range).
fn row_u64(row: &Row, column: &str) -> Result<u64, DbError> {
    match row_value(row, column)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| DbError::Decode(format!("column {column} is not a count"))),
        Value::String(s) => s
            .parse()
            .map_err(|e| DbError::Decode(format!("column {column} is not a count: {e}"))),
        _ => Err(DbError::Decode(format!("column {column} is not a count"))),
    }
}
