//! Review database operations
//!
//! Derived fields live in `ai_sentiment`, `ai_confidence_score` and
//! `ai_clusters` (JSON array of `{label, score}`).

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use vri_common::{Error, Result};

use crate::models::{ClusterAssignment, Review, ReviewUpdate, Sentiment};
use crate::utils::retry_on_lock;

/// Maximum time spent retrying a locked write
pub(crate) const LOCK_WAIT_MS: u64 = 5000;

/// Insert or replace a review, derived fields included
pub async fn save_review(pool: &SqlitePool, review: &Review) -> Result<()> {
    let clusters_json = encode_clusters(review.clusters.as_deref())?;

    sqlx::query(
        r#"
        INSERT INTO reviews (id, venue_id, text, ai_sentiment, ai_confidence_score, ai_clusters, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            venue_id = excluded.venue_id,
            text = excluded.text,
            ai_sentiment = excluded.ai_sentiment,
            ai_confidence_score = excluded.ai_confidence_score,
            ai_clusters = excluded.ai_clusters,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&review.id)
    .bind(&review.venue_id)
    .bind(&review.text)
    .bind(review.sentiment.as_ref().map(|s| s.label.as_str()))
    .bind(review.sentiment.as_ref().map(|s| s.score))
    .bind(clusters_json)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load every review ordered by id
pub async fn load_all_reviews(pool: &SqlitePool) -> Result<Vec<Review>> {
    let rows = sqlx::query(
        r#"
        SELECT id, venue_id, text, ai_sentiment, ai_confidence_score, ai_clusters
        FROM reviews
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(review_from_row).collect()
}

/// Load one review
pub async fn load_review(pool: &SqlitePool, review_id: &str) -> Result<Option<Review>> {
    let row = sqlx::query(
        r#"
        SELECT id, venue_id, text, ai_sentiment, ai_confidence_score, ai_clusters
        FROM reviews
        WHERE id = ?
        "#,
    )
    .bind(review_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(review_from_row).transpose()
}

/// Write the fields present in `update` in one statement
///
/// Returns `false` when the review does not exist or `update` is empty.
pub async fn update_review_fields(
    pool: &SqlitePool,
    review_id: &str,
    update: &ReviewUpdate,
) -> Result<bool> {
    let sql = match (&update.sentiment, &update.clusters) {
        (Some(_), Some(_)) => {
            "UPDATE reviews SET ai_sentiment = ?, ai_confidence_score = ?, ai_clusters = ?, \
             updated_at = CURRENT_TIMESTAMP WHERE id = ?"
        }
        (Some(_), None) => {
            "UPDATE reviews SET ai_sentiment = ?, ai_confidence_score = ?, \
             updated_at = CURRENT_TIMESTAMP WHERE id = ?"
        }
        (None, Some(_)) => {
            "UPDATE reviews SET ai_clusters = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?"
        }
        (None, None) => return Ok(false),
    };

    let sentiment = update.sentiment.as_ref();
    let clusters_json = encode_clusters(update.clusters.as_deref())?;
    let clusters_json = clusters_json.as_deref();

    retry_on_lock("update_review", LOCK_WAIT_MS, || async move {
        let mut query = sqlx::query(sql);
        if let Some(sentiment) = sentiment {
            query = query.bind(sentiment.label.as_str()).bind(sentiment.score);
        }
        if let Some(clusters) = clusters_json {
            query = query.bind(clusters);
        }

        let result = query
            .bind(review_id)
            .execute(pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    })
    .await
}

/// Build a review from a row holding the review columns
pub(crate) fn review_from_row(row: &SqliteRow) -> Result<Review> {
    let label: Option<String> = row.try_get("ai_sentiment")?;
    let score: Option<f64> = row.try_get("ai_confidence_score")?;
    let clusters_json: Option<String> = row.try_get("ai_clusters")?;

    let sentiment = match (label, score) {
        (Some(label), Some(score)) => Some(Sentiment { label, score }),
        _ => None,
    };

    let clusters = clusters_json
        .map(|json| {
            serde_json::from_str::<Vec<ClusterAssignment>>(&json)
                .map_err(|e| Error::Internal(format!("Malformed ai_clusters: {}", e)))
        })
        .transpose()?;

    Ok(Review {
        id: row.try_get("id")?,
        venue_id: row.try_get("venue_id")?,
        text: row.try_get("text")?,
        sentiment,
        clusters,
    })
}

fn encode_clusters(clusters: Option<&[ClusterAssignment]>) -> Result<Option<String>> {
    clusters
        .map(|c| {
            serde_json::to_string(c)
                .map_err(|e| Error::Internal(format!("Failed to serialize clusters: {}", e)))
        })
        .transpose()
}
