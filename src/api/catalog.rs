use std::sync::Arc;

use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use crate::{
    actions::{ingredients, tags},
    error::HtmlError,
    form::{Form, FormData},
    schema::Id,
    state::{with_state, State},
};

use super::reply::json;

async fn list_tags(state: Arc<State>) -> Result<Response, Rejection> {
    let list = tags::list_tags(&state.pool, state.cache.clone()).await?;

    Ok(json(&list, StatusCode::OK))
}

async fn get_tag(id: Id, state: Arc<State>) -> Result<Response, Rejection> {
    let tag = tags::get_tag(id, &state.pool, state.cache.clone())
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json(&tag, StatusCode::OK))
}

async fn list_ingredients(query: FormData, state: Arc<State>) -> Result<Response, Rejection> {
    let form = Form::from_pairs(query);
    let list =
        ingredients::search_ingredients(form.get_str("name"), &state.pool, state.cache.clone())
            .await?;

    Ok(json(&list, StatusCode::OK))
}

async fn get_ingredient(id: Id, state: Arc<State>) -> Result<Response, Rejection> {
    let ingredient = ingredients::get_ingredient(id, &state.pool, state.cache.clone())
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json(&ingredient, StatusCode::OK))
}

/// Read-only tag and ingredient catalog. Neither list is paginated.
pub fn routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let tag_list = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_tags);

    let tag = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_tag);

    let ingredient_list = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_state(state.clone()))
        .and_then(list_ingredients);

    let ingredient = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_state(state))
        .and_then(get_ingredient);

    tag_list
        .or(tag)
        .unify()
        .or(ingredient_list)
        .unify()
        .or(ingredient)
        .unify()
}
