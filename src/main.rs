use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use foodgram::{
    actions::{
        ingredients::{self, NewIngredient},
        tags::{self, NewTag},
        users::{self, NewUser},
    },
    config::Config,
    routes,
    schema::UserRole,
    state::State,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Load tags from a JSON array of {name, color, slug}
    LoadTags { path: PathBuf },
    /// Load ingredients from a JSON array of {name, measurement_unit}
    LoadIngredients { path: PathBuf },
    /// Create an account with the admin role
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
}

async fn read_json<T: DeserializeOwned>(path: &PathBuf) -> anyhow::Result<Vec<T>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn serve(state: Arc<State>) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&state.config.media_root)
        .await
        .with_context(|| format!("Failed to create {}", state.config.media_root.display()))?;

    let (address, server) = warp::serve(routes(state.clone())).bind_with_graceful_shutdown(
        state.config.bind_address,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
        },
    );

    log::info!("Listening on http://{address}");
    server.await;
    log::info!("Shut down");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info,sqlx=warn"))
        .init();

    let args = Args::parse();
    let config = Config::load()?;
    let state = State::connect(config).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::LoadTags { path } => {
            let list: Vec<NewTag> = read_json(&path).await?;
            tags::load_tags(&list, &state.pool, state.cache.clone()).await?;
            Ok(())
        }
        Command::LoadIngredients { path } => {
            let list: Vec<NewIngredient> = read_json(&path).await?;
            ingredients::load_ingredients(&list, &state.pool, state.cache.clone()).await?;
            Ok(())
        }
        Command::CreateAdmin {
            email,
            username,
            password,
            first_name,
            last_name,
        } => {
            let user = NewUser {
                email,
                username,
                first_name,
                last_name,
                password,
            };
            let admin = users::create_user(&user, UserRole::Admin, &state.pool).await?;
            log::info!("Created admin {} ({})", admin.username, admin.id);
            Ok(())
        }
    }
}
