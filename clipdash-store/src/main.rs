use std::path::PathBuf;

use clap::Parser;
use clipdash_core::Collection;
use clipdash_store::{AppState, load_seed, serve};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "clipdash-store")]
struct StoreArgs {
    #[arg(long, default_value = "127.0.0.1:8790")]
    bind_address: String,

    /// JSON collection to start from instead of an empty one.
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Id of the empty collection created when no seed is given. A seed
    /// file carries its own id.
    #[arg(long, conflicts_with = "seed")]
    collection_id: Option<String>,
}

const DEFAULT_COLLECTION_ID: &str = "default";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = StoreArgs::parse();
    let collection = match &args.seed {
        Some(path) => match load_seed(path) {
            Ok(collection) => {
                info!(
                    path = %path.display(),
                    items = collection.items.len(),
                    tabs = collection.tabs.len(),
                    "loaded seed collection"
                );
                collection
            }
            Err(err) => {
                error!("failed to load seed {}: {}", path.display(), err);
                std::process::exit(1);
            }
        },
        None => Collection::new(
            args.collection_id
                .clone()
                .unwrap_or_else(|| DEFAULT_COLLECTION_ID.to_owned()),
        ),
    };

    let listener = match tokio::net::TcpListener::bind(&args.bind_address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {}", args.bind_address, err);
            std::process::exit(1);
        }
    };

    info!("store starting on {}", args.bind_address);
    if let Err(err) = serve(listener, AppState::with_collection(collection)).await {
        warn!("store server exited: {}", err);
    }
}
