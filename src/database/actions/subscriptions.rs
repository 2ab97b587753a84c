use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    database::error::QueryError,
    error::{Error, HtmlError},
    jwt::SessionData,
    pagination::{Page, PageContext},
    projection::{group_by_id, ShortRecipeView, SubscriptionView, UserView, Viewer},
    schema::{Id, Recipe, User, UserRow},
};

use super::users::get_user_by_id;

pub async fn subscribed_among(
    user_id: Id,
    author_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Id>, Error> {
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(Id,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)",
    )
    .bind(user_id)
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

async fn is_subscribed(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<bool, Error> {
    Ok(subscribed_among(user_id, &[author_id], pool)
        .await?
        .contains(&author_id))
}

/// Builds the subscription shape for each author, embedding their newest
/// recipes capped at `recipes_limit`.
async fn subscription_views(
    authors: Vec<User>,
    recipes_limit: Option<i64>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionView>, Error> {
    let author_ids: Vec<Id> = authors.iter().map(|author| author.id).collect();
    if author_ids.is_empty() {
        return Ok(vec![]);
    }

    let recipes: Vec<Recipe> = sqlx::query_as(
        "
        SELECT * FROM (
            SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY pub_date DESC, id DESC
    ",
    )
    .bind(&author_ids)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let counts: HashMap<Id, i64> = sqlx::query_as::<_, (Id, i64)>(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(&author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?
    .into_iter()
    .collect();

    let mut recipes = group_by_id(recipes, |recipe| recipe.author_id);

    Ok(authors
        .into_iter()
        .map(|author| SubscriptionView {
            recipes: recipes
                .remove(&author.id)
                .unwrap_or_default()
                .iter()
                .map(|recipe| ShortRecipeView::with_image(recipe, media_url))
                .collect(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
            author: UserView {
                is_subscribed: true,
                ..UserView::from_user(&author, &Viewer::anonymous())
            },
        })
        .collect())
}

pub async fn subscribe(
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if author_id == session.user_id {
        return Err(HtmlError::InvalidRequest.new("You cannot subscribe to yourself."));
    }

    let author = get_user_by_id(author_id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    if is_subscribed(session.user_id, author_id, pool).await? {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this user."));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (author_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(author_id)
    .bind(session.user_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this user."));
    }

    let mut views = subscription_views(vec![author], recipes_limit, media_url, pool).await?;
    views
        .pop()
        .ok_or_else(|| HtmlError::InternalServerError.default())
}

pub async fn unsubscribe(
    session: &SessionData,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if get_user_by_id(author_id, pool).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query("DELETE FROM subscriptions WHERE author_id = $1 AND user_id = $2")
        .bind(author_id)
        .bind(session.user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.new("You are not subscribed to this user."));
    }

    Ok(())
}

pub async fn fetch_subscriptions(
    session: &SessionData,
    page: Page,
    recipes_limit: Option<i64>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionView>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let authors = rows.into_iter().map(|row| row.user).collect();
    let views = subscription_views(authors, recipes_limit, media_url, pool).await?;

    PageContext::paginate(views, total_count, page)
}
