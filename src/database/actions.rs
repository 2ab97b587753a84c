pub mod ingredients;
pub mod interactions;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;

use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{error::Error, jwt::SessionData};

use super::{projection::Viewer, schema::Id};

/// Resolves what the caller has favorited, carted and subscribed to among the
/// given recipes and authors. Anonymous callers resolve to an empty viewer
/// without touching storage.
pub async fn load_viewer(
    session: Option<&SessionData>,
    recipe_ids: &[Id],
    author_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Viewer, Error> {
    let session = match session {
        Some(session) => session,
        None => return Ok(Viewer::anonymous()),
    };

    let favorites = interactions::InteractionKind::Favorite
        .marked_among(session.user_id, recipe_ids, pool)
        .await?;
    let cart = interactions::InteractionKind::ShoppingCart
        .marked_among(session.user_id, recipe_ids, pool)
        .await?;
    let subscriptions: HashSet<Id> =
        subscriptions::subscribed_among(session.user_id, author_ids, pool).await?;

    Ok(Viewer::authenticated(favorites, cart, subscriptions))
}
