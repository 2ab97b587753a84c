use std::{convert::Infallible, sync::Arc};

use warp::{reply::Reply, Filter};

use crate::state::State;

use super::{catalog, recipes, reply::handle_rejection, users};

/// The whole service: JSON API under `/api`, uploaded images under `/media`.
/// Every rejection is rendered by `handle_rejection`.
pub fn routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path("api").and(
        recipes::routes(state.clone())
            .or(catalog::routes(state.clone()))
            .or(users::routes(state.clone())),
    );

    let media = warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(state.config.media_root.clone()));

    api.or(media)
        .recover(handle_rejection)
        .with(warp::log("foodgram::api"))
}
