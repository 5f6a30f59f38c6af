use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::{MediaType, TitleId, TitleMetadata},
    services::providers::MetadataStore,
};

/// Creates a PostgreSQL connection pool
///
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

const TITLE_COLUMNS: &str = "id, title, media_type, overview, genres, release_year, vote_average, \
     vote_count, popularity, runtime, original_language, adult, tone_tags, keywords, \
     streaming_providers";

/// Maximum rows returned for a reference-title lookup
const TITLE_MATCH_LIMIT: i64 = 10;

#[derive(Debug, FromRow)]
struct TitleRow {
    id: i64,
    title: String,
    media_type: String,
    overview: Option<String>,
    genres: Option<Vec<String>>,
    release_year: Option<i32>,
    vote_average: Option<f64>,
    vote_count: Option<i64>,
    popularity: Option<f64>,
    runtime: Option<i32>,
    original_language: Option<String>,
    adult: Option<bool>,
    tone_tags: Option<Vec<String>>,
    keywords: Option<Vec<String>>,
    streaming_providers: Option<Vec<String>>,
}

impl From<TitleRow> for TitleMetadata {
    fn from(row: TitleRow) -> Self {
        let media_type = match row.media_type.as_str() {
            "tv" | "tv_show" | "series" => MediaType::TvShow,
            _ => MediaType::Movie,
        };

        TitleMetadata {
            id: TitleId(row.id),
            title: row.title,
            media_type,
            overview: row.overview,
            genres: row.genres.unwrap_or_default(),
            release_year: row.release_year,
            vote_average: row.vote_average,
            vote_count: row.vote_count.unwrap_or(0),
            popularity: row.popularity.unwrap_or(0.0),
            runtime: row.runtime,
            original_language: row.original_language,
            adult: row.adult.unwrap_or(false),
            tone_tags: row.tone_tags.unwrap_or_default(),
            keywords: row.keywords.unwrap_or_default(),
            streaming_providers: row.streaming_providers.unwrap_or_default(),
        }
    }
}

/// Metadata store over the `titles` table
///
/// Any database failure surfaces as [`AppError::MetadataUnavailable`].
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: sqlx::Error) -> AppError {
    tracing::error!(error = %e, "Metadata query failed");
    AppError::MetadataUnavailable(e.to_string())
}

#[async_trait::async_trait]
impl MetadataStore for PgMetadataStore {
    async fn get(&self, id: TitleId) -> AppResult<Option<TitleMetadata>> {
        let row: Option<TitleRow> =
            sqlx::query_as(&format!("SELECT {} FROM titles WHERE id = $1", TITLE_COLUMNS))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        Ok(row.map(TitleMetadata::from))
    }

    async fn get_many(&self, ids: &[TitleId]) -> AppResult<HashMap<TitleId, TitleMetadata>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let raw_ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows: Vec<TitleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM titles WHERE id = ANY($1)",
            TITLE_COLUMNS
        ))
        .bind(raw_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let meta = TitleMetadata::from(row);
                (meta.id, meta)
            })
            .collect())
    }

    async fn titles_matching(&self, text: &str) -> AppResult<Vec<(TitleId, String)>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        // Substring hits, plus titles sharing the first few letters so that a
        // misspelt reference still has fuzzy-match candidates
        let escaped = text
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let prefix: String = text.chars().take(4).collect();

        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, title FROM titles \
             WHERE title ILIKE $1 OR lower(left(title, 4)) = lower($2) \
             ORDER BY popularity DESC NULLS LAST, id ASC \
             LIMIT $3",
        )
        .bind(format!("%{}%", escaped))
        .bind(prefix)
        .bind(TITLE_MATCH_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(|(id, title)| (TitleId(id), title))
            .collect())
    }
}
