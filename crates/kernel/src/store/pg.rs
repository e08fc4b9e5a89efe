//! PostgreSQL content store.
//!
//! Row structs mirror the tables; public model types are converted from
//! them so the `content_type` enum and image metadata stay strongly
//! typed. Element updates and their version snapshots share one
//! transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::focal::{FocalKey, FocalPoint};
use crate::models::{
    ContentElement, ContentElementVersion, ContentGroup, ContentType, CreateElement, CreateGroup,
    UpdateElement, UpdateGroup, snapshot_required,
};
use crate::store::ContentStore;

const GROUP_COLUMNS: &str = "id, name, description, author_id, deleted_at, created, changed";
const ELEMENT_COLUMNS: &str = "id, group_id, name, content_type, text_content, \"position\", \
     required, image_hint, image_filename, image_mime, author_id, deleted_at, created, changed";

/// Database row for a content group.
#[derive(sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    author_id: Option<Uuid>,
    deleted_at: Option<i64>,
    created: i64,
    changed: i64,
}

impl From<GroupRow> for ContentGroup {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            author_id: row.author_id,
            deleted_at: row.deleted_at,
            created: row.created,
            changed: row.changed,
        }
    }
}

/// Database row for a content element.
#[derive(sqlx::FromRow)]
struct ElementRow {
    id: Uuid,
    group_id: Uuid,
    name: String,
    content_type: String,
    text_content: Option<String>,
    position: Option<i32>,
    required: bool,
    image_hint: Option<String>,
    image_filename: Option<String>,
    image_mime: Option<String>,
    author_id: Option<Uuid>,
    deleted_at: Option<i64>,
    created: i64,
    changed: i64,
}

impl TryFrom<ElementRow> for ContentElement {
    type Error = anyhow::Error;

    fn try_from(row: ElementRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            group_id: row.group_id,
            name: row.name,
            content_type: row.content_type.parse()?,
            text_content: row.text_content,
            position: row.position,
            required: row.required,
            image_hint: row.image_hint,
            image_filename: row.image_filename,
            image_mime: row.image_mime,
            author_id: row.author_id,
            deleted_at: row.deleted_at,
            created: row.created,
            changed: row.changed,
        })
    }
}

/// Database row for an element version.
#[derive(sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    element_id: Uuid,
    version_number: i32,
    text_content: Option<String>,
    author_id: Option<Uuid>,
    created: i64,
}

impl From<VersionRow> for ContentElementVersion {
    fn from(row: VersionRow) -> Self {
        Self {
            id: row.id,
            element_id: row.element_id,
            version_number: row.version_number,
            text_content: row.text_content,
            author_id: row.author_id,
            created: row.created,
        }
    }
}

/// PostgreSQL-backed content store with a process-wide request cache.
pub struct PgContentStore {
    pool: PgPool,
    /// Active groups cached by name. Cleared wholesale at the end of an
    /// import; invalidated per-name on mutation.
    cache: DashMap<String, ContentGroup>,
}

impl PgContentStore {
    /// Create a new PostgreSQL content store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: DashMap::new(),
        }
    }

    async fn fetch_group(&self, id: Uuid) -> Result<ContentGroup> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM content_group WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch group")?
        .with_context(|| format!("group not found: {id}"))?;

        Ok(row.into())
    }

    async fn fetch_element(&self, id: Uuid) -> Result<ContentElement> {
        let row = sqlx::query_as::<_, ElementRow>(&format!(
            "SELECT {ELEMENT_COLUMNS} FROM content_element WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch element")?
        .with_context(|| format!("element not found: {id}"))?;

        row.try_into()
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn list_active_groups_ordered(&self) -> Result<Vec<ContentGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM content_group WHERE deleted_at IS NULL ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to list groups")?;

        Ok(rows.into_iter().map(ContentGroup::from).collect())
    }

    async fn list_active_elements_ordered(&self, group_id: Uuid) -> Result<Vec<ContentElement>> {
        let rows = sqlx::query_as::<_, ElementRow>(&format!(
            "SELECT {ELEMENT_COLUMNS} FROM content_element \
             WHERE group_id = $1 AND deleted_at IS NULL \
             ORDER BY \"position\" ASC NULLS LAST, created ASC"
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list elements")?;

        rows.into_iter().map(ContentElement::try_from).collect()
    }

    async fn find_group_by_name(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> Result<Option<ContentGroup>> {
        if !include_deleted {
            if let Some(cached) = self.cache.get(name) {
                return Ok(Some(cached.clone()));
            }
        }

        let filter = if include_deleted {
            ""
        } else {
            " AND deleted_at IS NULL"
        };
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM content_group WHERE name = $1{filter}"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("failed to find group by name")?;

        let group = row.map(ContentGroup::from);

        if !include_deleted {
            if let Some(ref g) = group {
                self.cache.insert(g.name.clone(), g.clone());
            }
        }

        Ok(group)
    }

    async fn find_element_by_group_and_name(
        &self,
        group_id: Uuid,
        name: &str,
        include_deleted: bool,
    ) -> Result<Option<ContentElement>> {
        let filter = if include_deleted {
            ""
        } else {
            " AND deleted_at IS NULL"
        };
        // An active row wins over deleted ones; among deleted rows the
        // most recently changed wins.
        let row = sqlx::query_as::<_, ElementRow>(&format!(
            "SELECT {ELEMENT_COLUMNS} FROM content_element \
             WHERE group_id = $1 AND name = $2{filter} \
             ORDER BY (deleted_at IS NULL) DESC, changed DESC LIMIT 1"
        ))
        .bind(group_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("failed to find element by group and name")?;

        row.map(ContentElement::try_from).transpose()
    }

    async fn create_group(&self, input: CreateGroup) -> Result<ContentGroup> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO content_group (id, name, description, author_id, deleted_at, created, changed)
            VALUES ($1, $2, $3, $4, NULL, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.author_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to create group")?;

        info!(group_id = %id, name = %input.name, "group created");
        self.fetch_group(id).await
    }

    async fn update_group(&self, id: Uuid, input: UpdateGroup) -> Result<ContentGroup> {
        let current = self.fetch_group(id).await?;
        let description = input.description.or(current.description);
        let now = chrono::Utc::now().timestamp();

        sqlx::query("UPDATE content_group SET description = $1, changed = $2 WHERE id = $3")
            .bind(&description)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to update group")?;

        self.cache.remove(&current.name);
        self.fetch_group(id).await
    }

    async fn restore_group(&self, id: Uuid) -> Result<()> {
        let current = self.fetch_group(id).await?;

        sqlx::query("UPDATE content_group SET deleted_at = NULL, changed = $1 WHERE id = $2")
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to restore group")?;

        self.cache.remove(&current.name);
        info!(group_id = %id, name = %current.name, "group restored");
        Ok(())
    }

    async fn soft_delete_group(&self, id: Uuid) -> Result<()> {
        let current = self.fetch_group(id).await?;

        let required_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM content_element \
             WHERE group_id = $1 AND required AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("failed to count required elements")?;

        if required_count > 0 {
            anyhow::bail!("group '{}' still owns required elements", current.name);
        }

        sqlx::query("UPDATE content_group SET deleted_at = $1, changed = $1 WHERE id = $2")
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to soft-delete group")?;

        self.cache.remove(&current.name);
        info!(group_id = %id, name = %current.name, "group soft-deleted");
        Ok(())
    }

    async fn create_element(&self, input: CreateElement) -> Result<ContentElement> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO content_element
                (id, group_id, name, content_type, text_content, "position",
                 required, image_hint, author_id, deleted_at, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, $10, $11)
            "#,
        )
        .bind(id)
        .bind(input.group_id)
        .bind(&input.name)
        .bind(input.content_type.as_str())
        .bind(&input.text_content)
        .bind(input.position)
        .bind(input.required)
        .bind(&input.image_hint)
        .bind(input.author_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to create element")?;

        info!(element_id = %id, name = %input.name, "element created");
        self.fetch_element(id).await
    }

    async fn update_element(&self, id: Uuid, input: UpdateElement) -> Result<ContentElement> {
        let current = self.fetch_element(id).await?;
        let now = chrono::Utc::now().timestamp();

        let needs_version =
            snapshot_required(current.text_content.as_deref(), input.text_content.as_deref());

        // Merge updates with current values (partial-update semantics).
        let text_content = input.text_content.or_else(|| current.text_content.clone());
        let position = input.position.or(current.position);
        let required = input.required.unwrap_or(current.required);
        let image_hint = input.image_hint.or_else(|| current.image_hint.clone());
        let author_id = input.author_id.or(current.author_id);

        let mut tx = self.pool.begin().await.context("failed to start transaction")?;

        if needs_version {
            let next_number: i32 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(version_number), 0) + 1 \
                 FROM content_element_version WHERE element_id = $1",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .context("failed to compute next version number")?;

            sqlx::query(
                r#"
                INSERT INTO content_element_version
                    (id, element_id, version_number, text_content, author_id, created)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(id)
            .bind(next_number)
            .bind(&current.text_content)
            .bind(author_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("failed to insert version snapshot")?;

            debug!(element_id = %id, version = next_number, "version snapshot recorded");
        }

        sqlx::query(
            r#"
            UPDATE content_element SET
                text_content = $1,
                "position" = $2,
                required = $3,
                image_hint = $4,
                author_id = $5,
                changed = $6
            WHERE id = $7
            "#,
        )
        .bind(&text_content)
        .bind(position)
        .bind(required)
        .bind(&image_hint)
        .bind(author_id)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to update element")?;

        tx.commit().await.context("failed to commit transaction")?;

        self.fetch_element(id).await
    }

    async fn restore_element(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE content_element SET deleted_at = NULL, changed = $1 WHERE id = $2")
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to restore element")?;

        info!(element_id = %id, "element restored");
        Ok(())
    }

    async fn soft_delete_element(&self, id: Uuid) -> Result<()> {
        let current = self.fetch_element(id).await?;

        if current.required {
            anyhow::bail!("element '{}' is required and cannot be deleted", current.name);
        }

        sqlx::query("UPDATE content_element SET deleted_at = $1, changed = $1 WHERE id = $2")
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to soft-delete element")?;

        info!(element_id = %id, name = %current.name, "element soft-deleted");
        Ok(())
    }

    async fn list_versions(&self, element_id: Uuid) -> Result<Vec<ContentElementVersion>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            "SELECT id, element_id, version_number, text_content, author_id, created \
             FROM content_element_version WHERE element_id = $1 ORDER BY version_number ASC",
        )
        .bind(element_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list versions")?;

        Ok(rows.into_iter().map(ContentElementVersion::from).collect())
    }

    async fn attach_image(
        &self,
        element_id: Uuid,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE content_element SET
                image_filename = $1,
                image_mime = $2,
                image_data = $3,
                changed = $4
            WHERE id = $5
            "#,
        )
        .bind(filename)
        .bind(content_type)
        .bind(bytes)
        .bind(chrono::Utc::now().timestamp())
        .bind(element_id)
        .execute(&self.pool)
        .await
        .context("failed to attach image")?;

        debug!(element_id = %element_id, filename = %filename, size = bytes.len(), "image attached");
        Ok(())
    }

    async fn download_image_bytes(&self, element_id: Uuid) -> Result<Option<Vec<u8>>> {
        let data: Option<Option<Vec<u8>>> =
            sqlx::query_scalar("SELECT image_data FROM content_element WHERE id = $1")
                .bind(element_id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to download image bytes")?;

        Ok(data.flatten())
    }

    async fn set_focal_point(&self, key: &FocalKey, point: FocalPoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO focal_point (owner_type, owner_id, attachment, x, y)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_type, owner_id, attachment)
            DO UPDATE SET x = EXCLUDED.x, y = EXCLUDED.y
            "#,
        )
        .bind(&key.owner_type)
        .bind(key.owner_id)
        .bind(&key.attachment)
        .bind(point.x)
        .bind(point.y)
        .execute(&self.pool)
        .await
        .context("failed to set focal point")?;

        Ok(())
    }

    async fn get_focal_point(&self, key: &FocalKey) -> Result<Option<FocalPoint>> {
        let row: Option<(f32, f32)> = sqlx::query_as(
            "SELECT x, y FROM focal_point \
             WHERE owner_type = $1 AND owner_id = $2 AND attachment = $3",
        )
        .bind(&key.owner_type)
        .bind(key.owner_id)
        .bind(&key.attachment)
        .fetch_optional(&self.pool)
        .await
        .context("failed to get focal point")?;

        Ok(row.map(|(x, y)| FocalPoint { x, y }))
    }

    fn clear_request_cache(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for PgContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgContentStore").finish()
    }
}
