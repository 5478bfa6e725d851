use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};

use super::{validate_identifier, Record, RemoteStore, StoreError};

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Rows read straight from Postgres, rendered with `to_jsonb` so the store
/// stays agnostic of table layout.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one(&self, sql: &str, id: Option<i64>) -> Result<Option<Record>, StoreError> {
        let mut query = sqlx::query_as::<_, (Json<Value>,)>(sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|(Json(v),)| serde_json::from_value::<Record>(v))
            .transpose()
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl RemoteStore for PgStore {
    fn backend_name(&self) -> &str {
        "postgres"
    }

    async fn fetch_latest(&self, collection: &str) -> Result<Option<Record>, StoreError> {
        self.fetch_one(&latest_sql(collection)?, None).await
    }

    async fn fetch_by_id(&self, collection: &str, id: i64) -> Result<Option<Record>, StoreError> {
        self.fetch_one(&by_id_sql(collection)?, Some(id)).await
    }

    async fn upsert(
        &self,
        collection: &str,
        record: Record,
        conflict_target: &str,
    ) -> Result<(), StoreError> {
        let columns: Vec<&str> = record.keys().map(String::as_str).collect();
        let sql = upsert_sql(collection, &columns, conflict_target)?;
        sqlx::query(&sql)
            .bind(Json(Value::Object(record)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQL builders
// ---------------------------------------------------------------------------

pub(crate) fn latest_sql(collection: &str) -> Result<String, StoreError> {
    let table = validate_identifier(collection)?;
    Ok(format!(
        "SELECT to_jsonb(t) FROM {table} AS t ORDER BY t.created_at DESC LIMIT 1"
    ))
}

pub(crate) fn by_id_sql(collection: &str) -> Result<String, StoreError> {
    let table = validate_identifier(collection)?;
    Ok(format!(
        "SELECT to_jsonb(t) FROM {table} AS t WHERE t.id = $1 LIMIT 1"
    ))
}

/// Insert the given columns from a JSON parameter (`$1`); on conflict,
/// overwrite only those columns.
pub(crate) fn upsert_sql(
    collection: &str,
    columns: &[&str],
    conflict_target: &str,
) -> Result<String, StoreError> {
    let table = validate_identifier(collection)?;
    let target = validate_identifier(conflict_target)?;
    if !columns.contains(&target) {
        return Err(StoreError::Rejected(format!(
            "record has no {target:?} column"
        )));
    }
    let columns = columns
        .iter()
        .map(|c| validate_identifier(*c))
        .collect::<Result<Vec<_>, _>>()?;

    let list = columns.join(", ");
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != target)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();
    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_owned()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    Ok(format!(
        "INSERT INTO {table} ({list}) \
         SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1) \
         ON CONFLICT ({target}) {on_conflict}"
    ))
}
