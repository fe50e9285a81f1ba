use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use crate::application::ports::outbound::{QueueElementStorePort, StoreError, StoredElement};
use crate::domain::entities::QueueElement;
use crate::domain::value_objects::{ElementId, Revision};

/// Queue elements persisted as JSON documents, indexed by request name
pub struct SqliteElementStore {
    pool: SqlitePool,
}

impl SqliteElementStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS queue_elements (
                id TEXT PRIMARY KEY,
                rev TEXT NOT NULL,
                request_name TEXT NOT NULL,
                status TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
        "#).execute(&pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_queue_elements_request ON queue_elements (request_name)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn decode_row((id, rev, payload): (String, String, String)) -> Result<StoredElement, StoreError> {
    let id = ElementId::parse(&id)
        .ok_or_else(|| StoreError::Serialization(format!("invalid element id '{}'", id)))?;
    let element: QueueElement =
        serde_json::from_str(&payload).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(StoredElement {
        id,
        rev: Revision::from_string(rev),
        element,
    })
}

#[async_trait]
impl QueueElementStorePort for SqliteElementStore {
    async fn insert_batch(
        &self,
        elements: Vec<QueueElement>,
    ) -> Result<Vec<StoredElement>, StoreError> {
        let mut stored = Vec::with_capacity(elements.len());
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        for element in elements {
            let item = StoredElement {
                id: ElementId::new(),
                rev: Revision::initial(),
                element,
            };
            let payload = serde_json::to_string(&item.element)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            sqlx::query(
                "INSERT INTO queue_elements (id, rev, request_name, status, payload, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(item.id.to_string())
            .bind(item.rev.as_str())
            .bind(&item.element.request_name)
            .bind(item.element.status.as_str())
            .bind(payload)
            .bind(item.element.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

            stored.push(item);
        }

        tx.commit().await.map_err(db_error)?;
        Ok(stored)
    }

    async fn list_by_workflow(
        &self,
        request_name: Option<&str>,
    ) -> Result<Vec<StoredElement>, StoreError> {
        let rows: Vec<(String, String, String)> = match request_name {
            Some(name) => sqlx::query_as(
                "SELECT id, rev, payload FROM queue_elements WHERE request_name = ? ORDER BY created_at",
            )
            .bind(name)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as("SELECT id, rev, payload FROM queue_elements ORDER BY created_at")
                .fetch_all(&self.pool)
                .await,
        }
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match decode_row(row) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    warn!("Skipping unreadable queue element: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn delete(&self, id: ElementId, rev: &Revision) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM queue_elements WHERE id = ? AND rev = ?")
            .bind(id.to_string())
            .bind(rev.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current: Option<(String,)> = sqlx::query_as("SELECT rev FROM queue_elements WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        match current {
            Some((current,)) => Err(StoreError::Conflict {
                id,
                current: Revision::from_string(current),
            }),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn count_workflows(&self) -> Result<usize, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT request_name) FROM queue_elements")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
