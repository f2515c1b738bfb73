use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::authz::{Jurisdiction, ResourceCategory, ResourceLookup};
use crate::errors::AppResult;

/// Resource locations backed by the `resource_locations` table.
#[derive(Debug, Clone)]
pub struct SqliteResourceLookup {
    pool: SqlitePool,
}

impl SqliteResourceLookup {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, category: ResourceCategory, resource_id: &str, location: &Jurisdiction) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO resource_locations (category, resource_id, region, district) VALUES (?, ?, ?, ?)
            ON CONFLICT(category, resource_id) DO UPDATE SET region = excluded.region, district = excluded.district
            "#,
        )
        .bind(category.as_str())
        .bind(resource_id)
        .bind(location.region.as_ref().map(|r| r.as_str()))
        .bind(location.district.as_ref().map(|d| d.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceLookup for SqliteResourceLookup {
    async fn locate(&self, category: ResourceCategory, resource_id: &str) -> AppResult<Option<Jurisdiction>> {
        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT region, district FROM resource_locations WHERE category = ? AND resource_id = ?",
        )
        .bind(category.as_str())
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(region, district)| Jurisdiction::from_names(region.as_deref(), district.as_deref())))
    }
}
