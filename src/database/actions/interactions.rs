use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    database::error::QueryError,
    error::{Error, HtmlError},
    jwt::SessionData,
    projection::ShortRecipeView,
    schema::{Id, RecipePart},
    shopping_list,
};

use super::recipes::get_recipe;

/// A per-user mark on a recipe. Both kinds live in a (user, recipe) table
/// with a unique pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Favorite,
    ShoppingCart,
}

impl InteractionKind {
    fn table(self) -> &'static str {
        match self {
            InteractionKind::Favorite => "favorites",
            InteractionKind::ShoppingCart => "carts",
        }
    }

    fn action(self) -> ActionType {
        match self {
            InteractionKind::Favorite => ActionType::ManageOwnFavorites,
            InteractionKind::ShoppingCart => ActionType::ManageOwnCart,
        }
    }

    fn already_marked(self) -> Error {
        match self {
            InteractionKind::Favorite => HtmlError::InvalidRequest.new("Recipe is already in favorites."),
            InteractionKind::ShoppingCart => {
                HtmlError::InvalidRequest.new("Recipe is already in the shopping cart.")
            }
        }
    }

    fn not_marked(self) -> Error {
        match self {
            InteractionKind::Favorite => HtmlError::NotFound.new("Recipe is not in favorites."),
            InteractionKind::ShoppingCart => {
                HtmlError::NotFound.new("Recipe is not in the shopping cart.")
            }
        }
    }

    /// Recipes among `recipe_ids` the user has marked.
    pub async fn marked_among(
        self,
        user_id: Id,
        recipe_ids: &[Id],
        pool: &Pool<Postgres>,
    ) -> Result<HashSet<Id>, Error> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(Id,)> = sqlx::query_as(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
            self.table()
        ))
        .bind(user_id)
        .bind(recipe_ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    /// Marks the recipe. A pair that already exists is rejected, whether the
    /// pre-check or the unique constraint catches it.
    pub async fn add(
        self,
        session: &SessionData,
        recipe_id: Id,
        pool: &Pool<Postgres>,
    ) -> Result<ShortRecipeView, Error> {
        session.authenticate(self.action())?;

        let recipe = get_recipe(recipe_id, pool)
            .await?
            .ok_or_else(|| HtmlError::NotFound.default())?;

        if self
            .marked_among(session.user_id, &[recipe_id], pool)
            .await?
            .contains(&recipe_id)
        {
            return Err(self.already_marked());
        }

        let result = sqlx::query(&format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            self.table()
        ))
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

        if result.rows_affected() == 0 {
            return Err(self.already_marked());
        }

        Ok(ShortRecipeView::without_image(&recipe))
    }

    pub async fn remove(
        self,
        session: &SessionData,
        recipe_id: Id,
        pool: &Pool<Postgres>,
    ) -> Result<(), Error> {
        session.authenticate(self.action())?;

        if get_recipe(recipe_id, pool).await?.is_none() {
            return Err(HtmlError::NotFound.default());
        }

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            self.table()
        ))
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

        if result.rows_affected() == 0 {
            return Err(self.not_marked());
        }

        Ok(())
    }
}

/// Every ingredient row of every recipe in the user's cart.
pub async fn cart_parts(user_id: Id, pool: &Pool<Postgres>) -> Result<Vec<RecipePart>, Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM carts c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// The caller's cart summed per ingredient and rendered as plain text.
pub async fn shopping_list(session: &SessionData, pool: &Pool<Postgres>) -> Result<String, Error> {
    session.authenticate(ActionType::ManageOwnCart)?;

    let parts = cart_parts(session.user_id, pool).await?;
    let totals = shopping_list::aggregate(&parts);
    log::trace!(
        "> Shopping list for user {}: {} rows, {} lines",
        session.user_id,
        parts.len(),
        totals.len()
    );

    Ok(shopping_list::render(&totals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_their_tables_and_actions() {
        assert_eq!(InteractionKind::Favorite.table(), "favorites");
        assert_eq!(InteractionKind::ShoppingCart.table(), "carts");
        assert_eq!(InteractionKind::ShoppingCart.action(), ActionType::ManageOwnCart);
    }

    #[test]
    fn duplicates_are_bad_requests_and_missing_marks_are_not_found() {
        assert_eq!(InteractionKind::Favorite.already_marked().code, 400);
        assert_eq!(InteractionKind::ShoppingCart.not_marked().code, 404);
    }
}
