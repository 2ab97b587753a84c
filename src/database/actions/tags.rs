use redis::aio::MultiplexedConnection;
use serde::Deserialize;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    database::error::QueryError,
    error::Error,
    schema::{Id, LinkedRecipeTag, Tag},
};

#[derive(Deserialize, Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

async fn query_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

async fn query_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

/// Every tag, read through the catalog cache when one is connected. A cache
/// failure falls back to the database.
pub async fn list_tags(
    pool: &Pool<Postgres>,
    cache: Option<MultiplexedConnection>,
) -> Result<Vec<Tag>, Error> {
    let mut cache = match cache {
        Some(cache) => cache,
        None => return query_tags(pool).await,
    };

    let owned = pool.clone();
    match RedisValue::get_or(CacheKeyType::Tag.new("all"), &mut cache, move || async move {
        query_tags(&owned).await
    })
    .await
    {
        Ok(tags) => Ok(tags.value),
        Err(e) => {
            log::warn!("> Tag cache unavailable, reading database: {e}");
            query_tags(pool).await
        }
    }
}

pub async fn get_tag(
    id: Id,
    pool: &Pool<Postgres>,
    cache: Option<MultiplexedConnection>,
) -> Result<Option<Tag>, Error> {
    let mut cache = match cache {
        Some(cache) => cache,
        None => return query_tag(id, pool).await,
    };

    let owned = pool.clone();
    match RedisValue::get_or(CacheKeyType::Tag.new(id), &mut cache, move || async move {
        query_tag(id, &owned).await
    })
    .await
    {
        Ok(tag) => Ok(tag.value),
        Err(e) => {
            log::warn!("> Tag cache unavailable, reading database: {e}");
            query_tag(id, pool).await
        }
    }
}

/// Ids among `ids` that name no tag.
pub async fn missing_tags(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(ids
        .iter()
        .filter(|id| !found.iter().any(|row| row.0 == **id))
        .copied()
        .collect())
}

pub async fn list_recipe_tags(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<LinkedRecipeTag>, Error> {
    let list: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

/// Inserts tags in batches, skipping slugs that already exist. Returns the
/// number of tags added.
pub async fn load_tags(
    tags: &[NewTag],
    pool: &Pool<Postgres>,
    cache: Option<MultiplexedConnection>,
) -> Result<u64, Error> {
    let mut inserted = 0;

    for chunk in tags.chunks(65535 / 3) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO tags (name, color, slug) ");

        query_builder.push_values(chunk, |mut b, tag| {
            b.push_bind(tag.name.trim())
                .push_bind(tag.color.trim())
                .push_bind(tag.slug.trim());
        });
        query_builder.push(" ON CONFLICT DO NOTHING");

        inserted += query_builder
            .build()
            .execute(pool)
            .await
            .map_err(QueryError::from)?
            .rows_affected();
    }

    if let Some(mut cache) = cache {
        CacheLifetime::BindTagCache.invalidate(&mut cache).await?;
    }

    log::info!("Loaded {inserted} of {} tags", tags.len());
    Ok(inserted)
}
