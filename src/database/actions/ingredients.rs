use redis::aio::MultiplexedConnection;
use serde::Deserialize;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    database::error::QueryError,
    error::Error,
    form::prefix_pattern,
    schema::{Id, Ingredient, RecipePart},
};

#[derive(Deserialize, Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

async fn query_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let list: Vec<Ingredient> = match name {
        Some(name) => {
            sqlx::query_as::<_, Ingredient>("SELECT * FROM ingredients WHERE lower(name) LIKE lower($1) ORDER BY name, id")
                .bind(prefix_pattern(name))
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query_as::<_, Ingredient>("SELECT * FROM ingredients ORDER BY name, id")
                .fetch_all(pool)
                .await
        }
    }
    .map_err(QueryError::from)?;

    Ok(list)
}

async fn query_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Ingredients whose name starts with `name`, ignoring case. Without a name
/// the whole catalog is returned, through the cache when one is connected.
pub async fn search_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
    cache: Option<MultiplexedConnection>,
) -> Result<Vec<Ingredient>, Error> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());
    let mut cache = match (name, cache) {
        (None, Some(cache)) => cache,
        (name, _) => return query_ingredients(name, pool).await,
    };

    let owned = pool.clone();
    match RedisValue::get_or(
        CacheKeyType::Ingredient.new("all"),
        &mut cache,
        move || async move { query_ingredients(None, &owned).await },
    )
    .await
    {
        Ok(list) => Ok(list.value),
        Err(e) => {
            log::warn!("> Ingredient cache unavailable, reading database: {e}");
            query_ingredients(None, pool).await
        }
    }
}

pub async fn get_ingredient(
    id: Id,
    pool: &Pool<Postgres>,
    cache: Option<MultiplexedConnection>,
) -> Result<Option<Ingredient>, Error> {
    let mut cache = match cache {
        Some(cache) => cache,
        None => return query_ingredient(id, pool).await,
    };

    let owned = pool.clone();
    match RedisValue::get_or(
        CacheKeyType::Ingredient.new(id),
        &mut cache,
        move || async move { query_ingredient(id, &owned).await },
    )
    .await
    {
        Ok(ingredient) => Ok(ingredient.value),
        Err(e) => {
            log::warn!("> Ingredient cache unavailable, reading database: {e}");
            query_ingredient(id, pool).await
        }
    }
}

/// Ids among `ids` that name no ingredient.
pub async fn missing_ingredients(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
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

/// Join rows of the given recipes, resolved against the ingredient catalog.
pub async fn list_recipe_parts(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipePart>, Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Inserts ingredients in batches, skipping (name, unit) pairs that already
/// exist. Returns the number of ingredients added.
pub async fn load_ingredients(
    ingredients: &[NewIngredient],
    pool: &Pool<Postgres>,
    cache: Option<MultiplexedConnection>,
) -> Result<u64, Error> {
    let mut inserted = 0;

    for chunk in ingredients.chunks(65535 / 2) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

        query_builder.push_values(chunk, |mut b, ingredient| {
            b.push_bind(ingredient.name.trim())
                .push_bind(ingredient.measurement_unit.trim());
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
        CacheLifetime::BindIngredientCache.invalidate(&mut cache).await?;
    }

    log::info!("Loaded {inserted} of {} ingredients", ingredients.len());
    Ok(inserted)
}
