use std::{convert::Infallible, sync::Arc};

use anyhow::Context;
use redis::aio::MultiplexedConnection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use warp::Filter;

use crate::{config::Config, sessions::Sessions};

pub struct State {
    pub config: Config,
    pub pool: Pool<Postgres>,
    pub cache: Option<MultiplexedConnection>,
    secret: Arc<str>,
    sessions: Sessions,
}

impl State {
    pub fn new(config: Config, pool: Pool<Postgres>, cache: Option<MultiplexedConnection>) -> Arc<Self> {
        let secret: Arc<str> = Arc::from(config.secret_key.as_str());
        let sessions = Sessions::new(secret.clone(), cache.clone());

        Arc::new(Self {
            config,
            pool,
            cache,
            secret,
            sessions,
        })
    }

    /// Opens the database pool, applies pending migrations and connects the
    /// catalog cache when one is configured.
    pub async fn connect(config: Config) -> anyhow::Result<Arc<Self>> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .context("Database connection failed")?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Database migration failed")?;

        let cache = match &config.redis_url {
            Some(url) => Some(init_redis(url).await?),
            None => {
                log::info!("REDIS_URL not set, catalog cache disabled");
                None
            }
        };

        Ok(Self::new(config, pool, cache))
    }

    pub fn secret(&self) -> Arc<str> {
        self.secret.clone()
    }

    pub fn sessions(&self) -> Sessions {
        self.sessions.clone()
    }
}

pub async fn init_redis(url: &str) -> anyhow::Result<MultiplexedConnection> {
    let client = redis::Client::open(url).context("Invalid REDIS_URL")?;
    let connection = client
        .get_multiplexed_async_connection()
        .await
        .context("Redis connection failed")?;

    log::info!("Connected to catalog cache");
    Ok(connection)
}

pub fn with_state(
    state: Arc<State>,
) -> impl Filter<Extract = (Arc<State>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
