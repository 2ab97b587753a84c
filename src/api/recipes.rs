use std::sync::Arc;

use warp::{
    http::{header::CONTENT_DISPOSITION, StatusCode},
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use crate::{
    actions::{
        interactions::{self, InteractionKind},
        recipes::{self, RecipeFilter, RecipePatch, RecipeWrite},
    },
    constants::{MAX_COUNT_PER_PAGE, RECIPE_COUNT_PER_PAGE, SHOPPING_LIST_FILENAME},
    error::HtmlError,
    form::{Form, FormData},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{Page, PageContext},
    schema::Id,
    state::{with_state, State},
};

use super::reply::{json, json_body, no_content};

async fn list_recipes(
    query: FormData,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let form = Form::from_pairs(query);
    let filter = RecipeFilter::from_form(&form)?;
    let page = Page::from_form(&form, RECIPE_COUNT_PER_PAGE, MAX_COUNT_PER_PAGE)?;

    let PageContext {
        count,
        next,
        previous,
        results,
    } = recipes::fetch_recipes(&filter, session.as_ref(), page, &state.pool).await?;
    let results =
        recipes::load_recipe_views(results, session.as_ref(), &state.config.media_url, &state.pool)
            .await?;

    Ok(json(
        &PageContext {
            count,
            next,
            previous,
            results,
        },
        StatusCode::OK,
    ))
}

async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let view =
        recipes::get_recipe_view(id, session.as_ref(), &state.config.media_url, &state.pool).await?;

    Ok(json(&view, StatusCode::OK))
}

async fn create_recipe(
    session: SessionData,
    payload: RecipeWrite,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let id = recipes::create_recipe(&session, &payload, &state.config.media_root, &state.pool).await?;
    let view =
        recipes::get_recipe_view(id, Some(&session), &state.config.media_url, &state.pool).await?;

    Ok(json(&view, StatusCode::CREATED))
}

async fn update_recipe(
    id: Id,
    session: SessionData,
    payload: RecipePatch,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    recipes::update_recipe(id, &session, &payload, &state.config.media_root, &state.pool).await?;
    let view =
        recipes::get_recipe_view(id, Some(&session), &state.config.media_url, &state.pool).await?;

    Ok(json(&view, StatusCode::OK))
}

async fn delete_recipe(
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    recipes::delete_recipe(id, &session, &state.config.media_root, &state.pool).await?;

    Ok(no_content())
}

async fn replace_recipe(_id: Id) -> Result<Response, Rejection> {
    Err(HtmlError::MethodNotAllowed
        .new("Method \"PUT\" not allowed.")
        .into())
}

async fn mark_recipe(
    kind: InteractionKind,
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let view = kind.add(&session, id, &state.pool).await?;

    Ok(json(&view, StatusCode::CREATED))
}

async fn unmark_recipe(
    kind: InteractionKind,
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    kind.remove(&session, id, &state.pool).await?;

    Ok(no_content())
}

async fn download_shopping_cart(
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let text = interactions::shopping_list(&session, &state.pool).await?;

    Ok(warp::reply::with_header(
        text,
        CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
    .into_response())
}

fn interaction_routes(
    segment: &'static str,
    kind: InteractionKind,
    state: Arc<State>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let path = warp::path("recipes")
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());

    let mark = path
        .clone()
        .and(warp::post())
        .and(with_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, state: Arc<State>| {
            mark_recipe(kind, id, session, state)
        });

    let unmark = path
        .and(warp::delete())
        .and(with_session(state.sessions()))
        .and(with_state(state))
        .and_then(move |id: Id, session: SessionData, state: Arc<State>| {
            unmark_recipe(kind, id, session, state)
        });

    mark.or(unmark).unify()
}

pub fn routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_possible_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(state.sessions()))
        .and(json_body::<RecipeWrite>())
        .and(with_state(state.clone()))
        .and_then(create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let get = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(get_recipe);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.sessions()))
        .and(json_body::<RecipePatch>())
        .and(with_state(state.clone()))
        .and_then(update_recipe);

    let replace = warp::path!("recipes" / Id)
        .and(warp::put())
        .and_then(replace_recipe);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(delete_recipe);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(replace)
        .unify()
        .or(delete)
        .unify()
        .or(interaction_routes("favorite", InteractionKind::Favorite, state.clone()))
        .unify()
        .or(interaction_routes("shopping_cart", InteractionKind::ShoppingCart, state))
        .unify()
}
