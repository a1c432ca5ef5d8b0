//! SQLite adapter for ActivityRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::sqlite::{
    format_datetime, parse_datetime, parse_json_or_default, parse_optional_datetime, parse_optional_uuid,
    parse_uuid,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::activity::{Activity, ActivityStatus, ActivityType};
use crate::domain::models::lifecycle::DuePredicate;
use crate::domain::ports::activity_repository::{ActivityFilter, ActivityRepository};

#[derive(Clone)]
pub struct SqliteActivityRepository {
    pool: SqlitePool,
}

impl SqliteActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: String,
    place_id: Option<String>,
    title: String,
    slug: String,
    description: Option<String>,
    activity_type: String,
    status: String,
    location: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    start_date: String,
    end_date: Option<String>,
    image_path: Option<String>,
    entry_fee_cents: i64,
    is_free: bool,
    max_participants: Option<i64>,
    current_participants: i64,
    contact_phone: Option<String>,
    contact_email: Option<String>,
    organizer_name: Option<String>,
    tags: Option<String>,
    is_featured: bool,
    is_active: bool,
    view_count: i64,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = DomainError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let status = ActivityStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        Ok(Activity {
            id: parse_uuid(&row.id)?,
            place_id: parse_optional_uuid(row.place_id)?,
            title: row.title,
            slug: row.slug,
            description: row.description,
            activity_type: ActivityType::from_str(&row.activity_type).unwrap_or_default(),
            status,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            start_date: parse_datetime(&row.start_date)?,
            end_date: parse_optional_datetime(row.end_date)?,
            image_path: row.image_path,
            entry_fee_cents: row.entry_fee_cents,
            is_free: row.is_free,
            max_participants: row.max_participants.map(|m| u32::try_from(m).unwrap_or(u32::MAX)),
            current_participants: u32::try_from(row.current_participants).unwrap_or(0),
            contact_phone: row.contact_phone,
            contact_email: row.contact_email,
            organizer_name: row.organizer_name,
            tags: parse_json_or_default(row.tags)?,
            is_featured: row.is_featured,
            is_active: row.is_active,
            view_count: u64::try_from(row.view_count).unwrap_or(0),
            created_by: parse_optional_uuid(row.created_by)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

/// WHERE clause and bindings selecting the rows a due predicate matches.
fn due_clause(predicate: &DuePredicate) -> (String, Vec<String>) {
    let mut clause = String::from("is_active = 1 AND status = ?");
    let mut bindings = vec![predicate.status.as_str().to_string()];

    if let Some(cutoff) = predicate.start_due_by {
        clause.push_str(" AND start_date <= ?");
        bindings.push(format_datetime(cutoff));
    }
    if let Some(cutoff) = predicate.end_due_by {
        clause.push_str(" AND end_date IS NOT NULL AND end_date <= ?");
        bindings.push(format_datetime(cutoff));
    }

    (clause, bindings)
}

#[async_trait]
impl ActivityRepository for SqliteActivityRepository {
    async fn create(&self, activity: &Activity) -> DomainResult<()> {
        let tags = serde_json::to_string(&activity.tags)?;

        sqlx::query(
            "INSERT INTO activities
             (id, place_id, title, slug, description, activity_type, status, location,
              latitude, longitude, start_date, end_date, image_path, entry_fee_cents, is_free,
              max_participants, current_participants, contact_phone, contact_email, organizer_name,
              tags, is_featured, is_active, view_count, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)",
        )
        .bind(activity.id.to_string())
        .bind(activity.place_id.map(|u| u.to_string()))
        .bind(&activity.title)
        .bind(&activity.slug)
        .bind(&activity.description)
        .bind(activity.activity_type.as_str())
        .bind(activity.status.as_str())
        .bind(&activity.location)
        .bind(activity.latitude)
        .bind(activity.longitude)
        .bind(format_datetime(activity.start_date))
        .bind(activity.end_date.map(format_datetime))
        .bind(&activity.image_path)
        .bind(activity.entry_fee_cents)
        .bind(activity.is_free)
        .bind(activity.max_participants.map(i64::from))
        .bind(i64::from(activity.current_participants))
        .bind(&activity.contact_phone)
        .bind(&activity.contact_email)
        .bind(&activity.organizer_name)
        .bind(&tags)
        .bind(activity.is_featured)
        .bind(activity.is_active)
        .bind(i64::try_from(activity.view_count).unwrap_or(i64::MAX))
        .bind(activity.created_by.map(|u| u.to_string()))
        .bind(format_datetime(activity.created_at))
        .bind(format_datetime(activity.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Activity>> {
        let row: Option<ActivityRow> = sqlx::query_as("SELECT * FROM activities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Activity::try_from).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> DomainResult<Option<Activity>> {
        let row: Option<ActivityRow> = sqlx::query_as("SELECT * FROM activities WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Activity::try_from).transpose()
    }

    async fn update(&self, activity: &Activity, expected: ActivityStatus) -> DomainResult<u64> {
        let tags = serde_json::to_string(&activity.tags)?;

        let result = sqlx::query(
            "UPDATE activities SET
             place_id = ?2, title = ?3, slug = ?4, description = ?5, activity_type = ?6,
             location = ?7, latitude = ?8, longitude = ?9, start_date = ?10, end_date = ?11,
             image_path = ?12, entry_fee_cents = ?13, is_free = ?14, max_participants = ?15,
             current_participants = ?16, contact_phone = ?17, contact_email = ?18,
             organizer_name = ?19, tags = ?20, updated_at = ?21
             WHERE id = ?1 AND status = ?22",
        )
        .bind(activity.id.to_string())
        .bind(activity.place_id.map(|u| u.to_string()))
        .bind(&activity.title)
        .bind(&activity.slug)
        .bind(&activity.description)
        .bind(activity.activity_type.as_str())
        .bind(&activity.location)
        .bind(activity.latitude)
        .bind(activity.longitude)
        .bind(format_datetime(activity.start_date))
        .bind(activity.end_date.map(format_datetime))
        .bind(&activity.image_path)
        .bind(activity.entry_fee_cents)
        .bind(activity.is_free)
        .bind(activity.max_participants.map(i64::from))
        .bind(i64::from(activity.current_participants))
        .bind(&activity.contact_phone)
        .bind(&activity.contact_email)
        .bind(&activity.organizer_name)
        .bind(&tags)
        .bind(format_datetime(activity.updated_at))
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn toggle_featured(&self, id: Uuid, updated_at: DateTime<Utc>) -> DomainResult<Option<Activity>> {
        let row: Option<ActivityRow> = sqlx::query_as(
            "UPDATE activities SET is_featured = NOT is_featured, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(format_datetime(updated_at))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Activity::try_from).transpose()
    }

    async fn toggle_active(&self, id: Uuid, updated_at: DateTime<Utc>) -> DomainResult<Option<Activity>> {
        let row: Option<ActivityRow> = sqlx::query_as(
            "UPDATE activities SET is_active = NOT is_active, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(format_datetime(updated_at))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Activity::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &ActivityFilter) -> DomainResult<Vec<Activity>> {
        let mut query = String::from("SELECT * FROM activities WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if !filter.include_inactive {
            query.push_str(" AND is_active = 1");
        }
        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(place_id) = &filter.place_id {
            query.push_str(" AND place_id = ?");
            bindings.push(place_id.to_string());
        }
        if let Some(activity_type) = &filter.activity_type {
            query.push_str(" AND activity_type = ?");
            bindings.push(activity_type.as_str().to_string());
        }
        if let Some(featured) = filter.is_featured {
            query.push_str(if featured { " AND is_featured = 1" } else { " AND is_featured = 0" });
        }
        if let Some(after) = filter.starts_after {
            query.push_str(" AND start_date >= ?");
            bindings.push(format_datetime(after));
        }
        if let Some(before) = filter.starts_before {
            query.push_str(" AND start_date <= ?");
            bindings.push(format_datetime(before));
        }

        query.push_str(" ORDER BY start_date ASC");
        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, ActivityRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<ActivityRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Activity::try_from).collect()
    }

    async fn find_due(&self, predicate: &DuePredicate) -> DomainResult<Vec<Activity>> {
        let (clause, bindings) = due_clause(predicate);
        let query = format!("SELECT * FROM activities WHERE {clause} ORDER BY start_date ASC");

        let mut q = sqlx::query_as::<_, ActivityRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<ActivityRow> = q.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                Activity::try_from(row)
                    .map_err(|e| warn!(activity_id = %id, error = %e, "skipping unreadable activity row"))
                    .ok()
            })
            .collect())
    }

    async fn update_where(
        &self,
        predicate: &DuePredicate,
        new_status: ActivityStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let (clause, bindings) = due_clause(predicate);
        let query = format!("UPDATE activities SET status = ?, updated_at = ? WHERE {clause}");

        let mut q = sqlx::query(&query)
            .bind(new_status.as_str())
            .bind(format_datetime(updated_at));
        for binding in &bindings {
            q = q.bind(binding);
        }

        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ActivityStatus,
        to: ActivityStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = sqlx::query("UPDATE activities SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(format_datetime(updated_at))
            .bind(id.to_string())
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn increment_views(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("UPDATE activities SET view_count = view_count + 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_by_status(&self) -> DomainResult<Vec<(ActivityStatus, u64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM activities GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts: Vec<(ActivityStatus, u64)> = ActivityStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for (status, count) in rows {
            if let Some(status) = ActivityStatus::from_str(&status) {
                if let Some(entry) = counts.iter_mut().find(|(s, _)| *s == status) {
                    entry.1 = u64::try_from(count).unwrap_or(0);
                }
            }
        }
        Ok(counts)
    }
}
