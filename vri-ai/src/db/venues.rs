//! Venue database operations

use sqlx::{Row, SqlitePool};
use vri_common::{Error, Result};

use super::reviews::{review_from_row, LOCK_WAIT_MS};
use crate::models::{SummaryResult, Venue, VenueReviewGroup};
use crate::utils::retry_on_lock;

/// Insert or replace a venue
pub async fn save_venue(pool: &SqlitePool, venue: &Venue) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO venues (id, name, ai_summary, ai_key_points, ai_global_score, updated_at)
        VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            ai_summary = excluded.ai_summary,
            ai_key_points = excluded.ai_key_points,
            ai_global_score = excluded.ai_global_score,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&venue.id)
    .bind(&venue.name)
    .bind(&venue.ai_summary)
    .bind(&venue.ai_key_points)
    .bind(&venue.ai_global_score)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one venue
pub async fn load_venue(pool: &SqlitePool, venue_id: &str) -> Result<Option<Venue>> {
    let row = sqlx::query(
        "SELECT id, name, ai_summary, ai_key_points, ai_global_score FROM venues WHERE id = ?",
    )
    .bind(venue_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(Venue {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            ai_summary: row.try_get("ai_summary")?,
            ai_key_points: row.try_get("ai_key_points")?,
            ai_global_score: row.try_get("ai_global_score")?,
        })),
        None => Ok(None),
    }
}

/// Replace the three summary fields of a venue
///
/// Returns `false` when the venue does not exist.
pub async fn update_venue_summary(pool: &SqlitePool, summary: &SummaryResult) -> Result<bool> {
    retry_on_lock("update_venue_summary", LOCK_WAIT_MS, || async move {
        let result = sqlx::query(
            r#"
            UPDATE venues
            SET ai_summary = ?, ai_key_points = ?, ai_global_score = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(summary.synopsis.as_str())
        .bind(summary.key_points.as_str())
        .bind(summary.global_score.as_str())
        .bind(summary.venue_id.as_str())
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    })
    .await
}

/// Join reviews with text to their venue, grouped per venue
///
/// Reviews whose venue does not exist are left out by the inner join.
/// Blank text is dropped with the same rule the pipeline stages apply.
pub async fn load_venue_review_groups(pool: &SqlitePool) -> Result<Vec<VenueReviewGroup>> {
    let rows = sqlx::query(
        r#"
        SELECT v.name AS venue_name,
               r.id, r.venue_id, r.text, r.ai_sentiment, r.ai_confidence_score, r.ai_clusters
        FROM reviews r
        INNER JOIN venues v ON v.id = r.venue_id
        WHERE r.text IS NOT NULL
          AND TRIM(r.text, ' ' || char(9) || char(10) || char(11) || char(12) || char(13)) != ''
        ORDER BY v.id, r.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut groups: Vec<VenueReviewGroup> = Vec::new();
    for row in &rows {
        let review = review_from_row(row)?;
        if review.analyzable_text().is_none() {
            continue;
        }

        match groups.last_mut() {
            Some(group) if group.venue_id == review.venue_id => group.reviews.push(review),
            _ => groups.push(VenueReviewGroup {
                venue_id: review.venue_id.clone(),
                venue_name: row.try_get("venue_name")?,
                reviews: vec![review],
            }),
        }
    }

    Ok(groups)
}
