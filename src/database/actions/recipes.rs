use std::{collections::HashSet, path::Path};

use serde::Deserialize;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::{authorize_recipe_change, ActionType},
    constants::RECIPE_NAME_MAX_LENGTH,
    database::error::{QueryError, TypeError},
    error::{Error, HtmlError},
    form::{prefix_pattern, Form},
    jwt::SessionData,
    media::{decode_image, remove_image, store_image},
    pagination::{Page, PageContext},
    projection::{group_by_id, RecipeView},
    schema::{Id, Recipe, RecipeRow},
};

use super::{
    ingredients::{list_recipe_parts, missing_ingredients},
    load_viewer,
    tags::{list_recipe_tags, missing_tags},
    users::get_users,
};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

/// Accepted shape of a new recipe.
#[derive(Deserialize, Debug, Clone)]
pub struct RecipeWrite {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Id>,
    /// `data:image/<type>;base64,<payload>`
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Accepted shape of a partial update. Omitted fields keep their stored value;
/// a present `tags` or `ingredients` list replaces the stored set wholesale.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipePatch {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(HtmlError::InvalidRequest.field("name", "This field may not be blank."));
    }
    if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        return Err(HtmlError::InvalidRequest.field(
            "name",
            &format!("Ensure this field has no more than {RECIPE_NAME_MAX_LENGTH} characters."),
        ));
    }
    Ok(())
}

fn validate_text(text: &str) -> Result<(), Error> {
    if text.trim().is_empty() {
        return Err(HtmlError::InvalidRequest.field("text", "This field may not be blank."));
    }
    Ok(())
}

fn validate_cooking_time(cooking_time: i32) -> Result<(), Error> {
    if cooking_time <= 0 {
        return Err(HtmlError::InvalidRequest.field("cooking_time", "Cooking time must be positive."));
    }
    Ok(())
}

fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), Error> {
    if ingredients.is_empty() {
        return Err(HtmlError::InvalidRequest.field("ingredients", "At least one ingredient is required."));
    }

    let mut seen = HashSet::new();
    for ingredient in ingredients {
        if ingredient.amount <= 0 {
            return Err(HtmlError::InvalidRequest.field(
                "ingredients",
                &format!(
                    "Amount {} of ingredient {} must be positive.",
                    ingredient.amount, ingredient.id
                ),
            ));
        }
        if !seen.insert(ingredient.id) {
            return Err(HtmlError::InvalidRequest.field(
                "ingredients",
                &format!("Ingredient {} is listed more than once.", ingredient.id),
            ));
        }
    }
    Ok(())
}

/// Drops repeated tag ids, keeping first occurrences in order.
fn dedup_tags(tags: &[Id]) -> Vec<Id> {
    let mut seen = HashSet::new();
    tags.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl RecipeWrite {
    pub fn validate(&self) -> Result<(), Error> {
        validate_name(&self.name)?;
        validate_text(&self.text)?;
        validate_cooking_time(self.cooking_time)?;
        validate_ingredients(&self.ingredients)
    }
}

impl RecipePatch {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(text) = &self.text {
            validate_text(text)?;
        }
        if let Some(cooking_time) = self.cooking_time {
            validate_cooking_time(cooking_time)?;
        }
        if let Some(ingredients) = &self.ingredients {
            validate_ingredients(ingredients)?;
        }
        Ok(())
    }
}

/// Rejects ids that name no stored tag or ingredient, naming the first one.
async fn check_references(
    tags: Option<&[Id]>,
    ingredients: Option<&[IngredientAmount]>,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if let Some(tags) = tags.filter(|tags| !tags.is_empty()) {
        if let Some(id) = missing_tags(tags, pool).await?.first() {
            return Err(HtmlError::InvalidRequest
                .field("tags", &format!("Invalid pk \"{id}\" - object does not exist.")));
        }
    }

    if let Some(ingredients) = ingredients {
        let ids: Vec<Id> = ingredients.iter().map(|ingredient| ingredient.id).collect();
        if let Some(id) = missing_ingredients(&ids, pool).await?.first() {
            return Err(HtmlError::InvalidRequest
                .field("ingredients", &format!("Invalid pk \"{id}\" - object does not exist.")));
        }
    }

    Ok(())
}

/// List filters read from the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Result<Self, TypeError> {
        Ok(Self {
            author: form.get_number("author")?,
            tags: form.get_all("tags"),
            is_favorited: form.get_flag("is_favorited")?,
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart")?,
        })
    }
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Loads a recipe the caller is about to change: 404 when it does not exist,
/// 403 when the caller is neither its author nor allowed to manage all recipes.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    authorize_recipe_change(session, recipe.author_id)?;

    Ok(recipe)
}

/// Newest first. Caller-relative filters match nothing for anonymous callers.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    session: Option<&SessionData>,
    page: Page,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Recipe>, Error> {
    let user_id = session.map(|session| session.user_id);
    if user_id.is_none() && (filter.is_favorited || filter.is_in_shopping_cart) {
        return PageContext::paginate(vec![], 0, page);
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query_builder.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND (",
        );
        let mut separated = query_builder.separated(" OR ");
        for slug in &filter.tags {
            separated.push("t.slug ILIKE ");
            separated.push_bind_unseparated(prefix_pattern(slug));
        }
        query_builder.push("))");
    }

    if let Some(user_id) = user_id {
        if filter.is_favorited {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM carts c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }

    query_builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows = rows.into_iter().map(|row| row.recipe).collect();
    PageContext::paginate(rows, total_count, page)
}

/// Projects recipes for the caller, loading authors, tags, ingredients and the
/// caller's marks for the whole batch at once.
pub async fn load_recipe_views(
    recipes: Vec<Recipe>,
    session: Option<&SessionData>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, Error> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut author_ids: Vec<Id> = recipes.iter().map(|recipe| recipe.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors = get_users(&author_ids, pool).await?;
    let mut tags = group_by_id(list_recipe_tags(&recipe_ids, pool).await?, |row| row.recipe_id);
    let mut parts = group_by_id(list_recipe_parts(&recipe_ids, pool).await?, |row| row.recipe_id);
    let viewer = load_viewer(session, &recipe_ids, &author_ids, pool).await?;

    recipes
        .into_iter()
        .map(|recipe| -> Result<RecipeView, Error> {
            let author = authors
                .iter()
                .find(|author| author.id == recipe.author_id)
                .ok_or_else(|| {
                    log::error!("Recipe {} has no author {}", recipe.id, recipe.author_id);
                    HtmlError::InternalServerError.default()
                })?;
            let recipe_tags = tags
                .remove(&recipe.id)
                .unwrap_or_default()
                .into_iter()
                .map(|row| row.tag)
                .collect();
            let recipe_parts = parts.remove(&recipe.id).unwrap_or_default();

            Ok(RecipeView::assemble(
                recipe,
                author,
                recipe_tags,
                recipe_parts,
                &viewer,
                media_url,
            ))
        })
        .collect()
}

pub async fn get_recipe_view(
    id: Id,
    session: Option<&SessionData>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    load_recipe_views(vec![recipe], session, media_url, pool)
        .await?
        .pop()
        .ok_or_else(|| HtmlError::NotFound.default())
}

/// Deletes every tag link of the recipe and inserts `tags` in their place.
async fn replace_tags(
    recipe_id: Id,
    tags: &[Id],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(tags, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Deletes every ingredient row of the recipe and inserts `ingredients` in
/// their place. Omitted ingredients are gone afterwards.
async fn replace_ingredients(
    recipe_id: Id,
    ingredients: &[IngredientAmount],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    if ingredients.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(ingredients, |mut b, ingredient| {
        b.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });
    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn insert_recipe(
    author_id: Id,
    recipe: &RecipeWrite,
    tags: &[Id],
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(recipe.name.trim())
    .bind(image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    replace_tags(id.0, tags, &mut tr).await?;
    replace_ingredients(id.0, &recipe.ingredients, &mut tr).await?;

    tr.commit().await.map_err(QueryError::from)?;

    Ok(id.0)
}

/// Creates a recipe owned by the caller. The recipe row and all of its links
/// are written in one transaction.
pub async fn create_recipe(
    session: &SessionData,
    recipe: &RecipeWrite,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<Id, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    recipe.validate()?;
    let upload = decode_image(&recipe.image)?;

    let tags = dedup_tags(&recipe.tags);
    check_references(Some(tags.as_slice()), Some(recipe.ingredients.as_slice()), pool).await?;

    let image = store_image(&upload, media_root).await?;
    match insert_recipe(session.user_id, recipe, &tags, &image, pool).await {
        Ok(id) => {
            log::info!("User {} created recipe {id}", session.user_id);
            Ok(id)
        }
        Err(e) => {
            remove_image(&image, media_root).await;
            Err(e)
        }
    }
}

async fn write_patch(
    id: Id,
    patch: &RecipePatch,
    tags: Option<&[Id]>,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($1, name),
            text = COALESCE($2, text),
            cooking_time = COALESCE($3, cooking_time),
            image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(patch.name.as_deref().map(str::trim))
    .bind(patch.text.as_deref())
    .bind(patch.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if let Some(tags) = tags {
        replace_tags(id, tags, &mut tr).await?;
    }
    if let Some(ingredients) = &patch.ingredients {
        replace_ingredients(id, ingredients, &mut tr).await?;
    }

    tr.commit().await.map_err(QueryError::from)?;

    Ok(())
}

/// Applies a partial update. Only the author or someone allowed to manage all
/// recipes may do so.
pub async fn update_recipe(
    id: Id,
    session: &SessionData,
    patch: &RecipePatch,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    patch.validate()?;
    let upload = patch.image.as_deref().map(decode_image).transpose()?;
    let recipe = get_recipe_mut(id, session, pool).await?;

    let tags = patch.tags.as_deref().map(dedup_tags);
    check_references(tags.as_deref(), patch.ingredients.as_deref(), pool).await?;

    let image = match &upload {
        Some(upload) => Some(store_image(upload, media_root).await?),
        None => None,
    };

    match write_patch(id, patch, tags.as_deref(), image.as_deref(), pool).await {
        Ok(()) => {
            if image.is_some() {
                remove_image(&recipe.image, media_root).await;
            }
            log::info!("User {} updated recipe {id}", session.user_id);
            Ok(())
        }
        Err(e) => {
            if let Some(image) = &image {
                remove_image(image, media_root).await;
            }
            Err(e)
        }
    }
}

/// Deletes the recipe along with its links, favorites and cart entries.
pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    remove_image(&recipe.image, media_root).await;
    log::info!("User {} deleted recipe {id}", session.user_id);

    Ok(())
}
