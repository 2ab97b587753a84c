mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod projection;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
    pub mod sessions;
}
mod api {
    pub mod catalog;
    pub mod recipes;
    pub mod reply;
    pub mod routes;
    pub mod users;
}
mod constants;

mod cache {
    pub mod cache;
}

pub mod config;
pub mod error;
pub mod media;
pub mod shopping_list;
pub mod state;

pub use api::routes::routes;
pub use authentication::*;
pub use cache::cache::*;
pub use constants::*;
pub use database::*;
