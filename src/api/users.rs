use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use crate::{
    actions::{
        load_viewer,
        subscriptions,
        users::{self, NewUser},
    },
    constants::{MAX_COUNT_PER_PAGE, SUBSCRIPTION_COUNT_PER_PAGE, USER_COUNT_PER_PAGE},
    database::error::TypeError,
    error::HtmlError,
    form::{Form, FormData},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{Page, PageContext},
    projection::{CreatedUserView, UserView},
    schema::{Id, User, UserRole},
    state::{with_state, State},
};

use super::reply::{json, json_body, no_content};

#[derive(Deserialize, Debug)]
struct SetPassword {
    new_password: String,
    current_password: String,
}

#[derive(Deserialize, Debug)]
struct Login {
    email: String,
    password: String,
}

#[derive(Serialize, Debug)]
struct Token {
    auth_token: String,
}

fn recipes_limit(form: &Form) -> Result<Option<i64>, TypeError> {
    match form.get_number::<i64>("recipes_limit")? {
        Some(limit) if limit < 0 => Err(TypeError::new(
            "recipes_limit",
            "Ensure this value is greater than or equal to 0.",
        )),
        limit => Ok(limit),
    }
}

async fn user_views(
    list: &[User],
    session: Option<&SessionData>,
    state: &State,
) -> Result<Vec<UserView>, Rejection> {
    let ids: Vec<Id> = list.iter().map(|user| user.id).collect();
    let viewer = load_viewer(session, &[], &ids, &state.pool).await?;

    Ok(list
        .iter()
        .map(|user| UserView::from_user(user, &viewer))
        .collect())
}

async fn user_view(
    user: User,
    session: Option<&SessionData>,
    state: &State,
) -> Result<UserView, Rejection> {
    let viewer = load_viewer(session, &[], &[user.id], &state.pool).await?;

    Ok(UserView::from_user(&user, &viewer))
}

async fn list_users(
    query: FormData,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let form = Form::from_pairs(query);
    let page = Page::from_form(&form, USER_COUNT_PER_PAGE, MAX_COUNT_PER_PAGE)?;

    let PageContext {
        count,
        next,
        previous,
        results,
    } = users::fetch_users(page, &state.pool).await?;
    let results = user_views(&results, session.as_ref(), &state).await?;

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

async fn register(payload: NewUser, state: Arc<State>) -> Result<Response, Rejection> {
    let user = users::create_user(&payload, UserRole::User, &state.pool).await?;

    Ok(json(&CreatedUserView::from(&user), StatusCode::CREATED))
}

async fn get_user(
    id: Id,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let user = users::get_user_by_id(id, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    let view = user_view(user, session.as_ref(), &state).await?;

    Ok(json(&view, StatusCode::OK))
}

async fn me(session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    let user = users::get_user_by_id(session.user_id, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::InvalidSession.new("Invalid session; User no longer exists"))?;
    let view = user_view(user, Some(&session), &state).await?;

    Ok(json(&view, StatusCode::OK))
}

async fn delete_me(session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    users::delete_user(&session, &state.config.media_root, &state.pool).await?;
    if let Err(e) = state.sessions().revoke(&session).await {
        log::warn!("Account {} deleted but its token stays valid: {e}", session.user_id);
    }

    Ok(no_content())
}

async fn set_password(
    session: SessionData,
    payload: SetPassword,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    users::set_password(
        &session,
        &payload.current_password,
        &payload.new_password,
        &state.pool,
    )
    .await?;

    Ok(no_content())
}

async fn login(payload: Login, state: Arc<State>) -> Result<Response, Rejection> {
    let auth_token = users::login_user(
        &payload.email,
        &payload.password,
        &state.secret(),
        state.config.token_lifetime(),
        &state.pool,
    )
    .await?;

    Ok(json(&Token { auth_token }, StatusCode::OK))
}

async fn logout(session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    state.sessions().revoke(&session).await?;

    Ok(no_content())
}

async fn list_subscriptions(
    query: FormData,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let form = Form::from_pairs(query);
    let page = Page::from_form(&form, SUBSCRIPTION_COUNT_PER_PAGE, MAX_COUNT_PER_PAGE)?;
    let limit = recipes_limit(&form)?;

    let list = subscriptions::fetch_subscriptions(
        &session,
        page,
        limit,
        &state.config.media_url,
        &state.pool,
    )
    .await?;

    Ok(json(&list, StatusCode::OK))
}

async fn subscribe(
    id: Id,
    query: FormData,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let limit = recipes_limit(&Form::from_pairs(query))?;
    let view =
        subscriptions::subscribe(&session, id, limit, &state.config.media_url, &state.pool).await?;

    Ok(json(&view, StatusCode::CREATED))
}

async fn unsubscribe(
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    subscriptions::unsubscribe(&session, id, &state.pool).await?;

    Ok(no_content())
}

pub fn routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_possible_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(list_users);

    let create = warp::path!("users")
        .and(warp::post())
        .and(json_body::<NewUser>())
        .and(with_state(state.clone()))
        .and_then(register);

    let current = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(me);

    let remove_current = warp::path!("users" / "me")
        .and(warp::delete())
        .and(with_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(delete_me);

    let password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(state.sessions()))
        .and(json_body::<SetPassword>())
        .and(with_state(state.clone()))
        .and_then(set_password);

    let subscription_list = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let detail = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(get_user);

    let follow = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(warp::query::<FormData>())
        .and(with_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(subscribe);

    let unfollow = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.sessions()))
        .and(with_state(state.clone()))
        .and_then(unsubscribe);

    let token_login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<Login>())
        .and(with_state(state.clone()))
        .and_then(login);

    let token_logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.sessions()))
        .and(with_state(state))
        .and_then(logout);

    list.or(create)
        .unify()
        .or(current)
        .unify()
        .or(remove_current)
        .unify()
        .or(password)
        .unify()
        .or(subscription_list)
        .unify()
        .or(detail)
        .unify()
        .or(follow)
        .unify()
        .or(unfollow)
        .unify()
        .or(token_login)
        .unify()
        .or(token_logout)
        .unify()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(value: &str) -> Form {
        Form::from_pairs(vec![("recipes_limit".to_string(), value.to_string())])
    }

    #[test]
    fn recipes_limit_is_optional_and_non_negative() {
        assert_eq!(recipes_limit(&Form::default()).unwrap(), None);
        assert_eq!(recipes_limit(&form("3")).unwrap(), Some(3));
        assert!(recipes_limit(&form("-1")).is_err());
        assert!(recipes_limit(&form("many")).is_err());
    }
}
