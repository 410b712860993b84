//! Postgres-backed `DocumentStore`.
//! Each collection is one table with a `JSONB body` column; `find`
//! pulls every row back and refilters with `query::matches` rather
//! than transpiling the full condition AST to SQL, since the exact
//! semantics (dotted-path reads, `$elemMatch`) are cheaper to keep in
//! one place than to duplicate in two query languages. A future
//! optimization is pushing the top-level `Eq`/`Gt` legs down into a
//! `WHERE body @> $1` pre-filter; tracked as an open question, not
//! implemented here.

use crate::error::{EngineError, Result};
use crate::persistence::query::{matches, Query};
use crate::persistence::store::{Document, DocumentStore};
use async_trait::async_trait;
use serde_json::Value as Json;
use sqlx::PgPool;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| EngineError::Store(e.into()))?;
        Ok(PostgresStore { pool })
    }

    async fn ensure_table(&self, collection: &str) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {collection} (id TEXT PRIMARY KEY, body JSONB NOT NULL)"
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Store(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.ensure_table(collection).await?;
        let sql = format!("SELECT id, body FROM {collection}");
        let rows: Vec<(String, Json)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::Store(e.into()))?;
        Ok(rows
            .into_iter()
            .filter(|(_, body)| matches(body, query))
            .map(|(id, body)| Document { id, body })
            .collect())
    }

    async fn find_one(&self, collection: &str, query: &Query) -> Result<Option<Document>> {
        Ok(self.find(collection, query).await?.into_iter().next())
    }

    async fn insert(&self, collection: &str, id: &str, body: Json) -> Result<()> {
        self.ensure_table(collection).await?;
        let sql = format!(
            "INSERT INTO {collection} (id, body) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET body = excluded.body"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Store(e.into()))?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, body: Json) -> Result<()> {
        self.insert(collection, id, body).await
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        self.ensure_table(collection).await?;
        let sql = format!("DELETE FROM {collection} WHERE id = $1");
        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Store(e.into()))?;
        Ok(())
    }

    async fn create_unique_index(&self, collection: &str, field_path: &str) -> Result<()> {
        self.ensure_table(collection).await?;
        let index_name = format!("{collection}_{}_uniq", field_path.replace('.', "_"));
        let expr = field_path
            .split('.')
            .fold(String::from("body"), |acc, seg| format!("{acc}->'{seg}'"));
        let sql = format!("CREATE UNIQUE INDEX IF NOT EXISTS {index_name} ON {collection} (({expr}))");
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Store(e.into()))?;
        Ok(())
    }
}
