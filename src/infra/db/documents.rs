use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    application::repos::{Document, DocumentStore, MonthlyAggregation, RepoError},
    domain::types::{Collection, MonthlyStatistic},
};

use super::{PostgresDocumentStore, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct MonthlyRow {
    month: String,
    status: Option<String>,
    count: i64,
}

impl From<MonthlyRow> for MonthlyStatistic {
    fn from(row: MonthlyRow) -> Self {
        Self {
            month: row.month,
            count: row_count(row.count),
            status: row.status,
        }
    }
}

fn row_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(
        &self,
        collection: Collection,
        id: Uuid,
        document: Document,
    ) -> Result<Uuid, RepoError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(document))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepoError> {
        let body = sqlx::query_scalar::<_, Json<Document>>(
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(body.map(|Json(document)| document))
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<Document>, RepoError> {
        let body = sqlx::query_scalar::<_, Json<Document>>(
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND body @> jsonb_build_object($2::text, $3::jsonb)
            LIMIT 1
            "#,
        )
        .bind(collection.as_str())
        .bind(field)
        .bind(Json(value))
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(body.map(|Json(document)| document))
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Document,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = body || $3
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(fields))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, RepoError> {
        let bodies = sqlx::query_scalar::<_, Json<Document>>(
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1
            ORDER BY inserted_at, id
            "#,
        )
        .bind(collection.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(bodies.into_iter().map(|Json(document)| document).collect())
    }

    async fn count(&self, collection: Collection) -> Result<u64, RepoError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents WHERE collection = $1")
                .bind(collection.as_str())
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(row_count(count))
    }

    async fn aggregate_monthly(
        &self,
        collection: Collection,
        aggregation: MonthlyAggregation,
    ) -> Result<Vec<MonthlyStatistic>, RepoError> {
        // Months are the first seven characters of an RFC 3339 timestamp, so text order is
        // chronological order.
        let rows = match aggregation.secondary {
            None => sqlx::query_as::<_, MonthlyRow>(
                r#"
                SELECT substr(body ->> $2, 1, 7) AS month,
                       NULL::text AS status,
                       COUNT(*) AS count
                FROM documents
                WHERE collection = $1 AND body ->> $2 IS NOT NULL
                GROUP BY 1
                ORDER BY 1
                "#,
            )
            .bind(collection.as_str())
            .bind(aggregation.time_field)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?,
            Some(secondary) => sqlx::query_as::<_, MonthlyRow>(
                r#"
                SELECT substr(body ->> $2, 1, 7) AS month,
                       body ->> $3 AS status,
                       COUNT(*) AS count
                FROM documents
                WHERE collection = $1 AND body ->> $2 IS NOT NULL
                GROUP BY 1, 2
                ORDER BY 1, 2
                "#,
            )
            .bind(collection.as_str())
            .bind(aggregation.time_field)
            .bind(secondary)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?,
        };

        Ok(rows.into_iter().map(MonthlyStatistic::from).collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
