use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;

mod handlers;
mod logic;
mod state;
mod storage;

use crate::handlers::{ping_handler, root_handler, ws_handler};
use crate::state::{AppState, World};
use crate::storage::{FileStorage, S3Storage, S3StorageConfig, Storage};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    public_dir: Option<PathBuf>,
    #[arg(long)]
    s3_bucket: Option<String>,
    #[arg(long)]
    s3_prefix: Option<String>,
    #[arg(long)]
    s3_region: Option<String>,
    #[arg(long)]
    s3_endpoint_url: Option<String>,
    #[arg(long)]
    s3_force_path_style: bool,
}

async fn build_storage(args: &Args) -> Arc<dyn Storage> {
    if let Some(bucket) = args.s3_bucket.clone() {
        let mut config = S3StorageConfig::new(bucket);
        config.prefix = args.s3_prefix.clone();
        config.region = args.s3_region.clone();
        config.endpoint_url = args.s3_endpoint_url.clone();
        config.force_path_style = args.s3_force_path_style;
        config.access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok();
        config.secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        return Arc::new(S3Storage::new(config).await);
    }
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data"));
    if let Err(error) = tokio::fs::create_dir_all(&data_dir).await {
        eprintln!("Failed to create data dir: {error}");
    }
    Arc::new(FileStorage::new(data_dir))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let storage = build_storage(&args).await;

    let world = match storage.load_world().await {
        Ok(data) => {
            let world = World::from_file_data(data);
            eprintln!(
                "World loaded points={} paths={} users={}",
                world.points.len(),
                world.paths.len(),
                world.users.len()
            );
            world
        }
        Err(reason) => {
            eprintln!("Starting with an empty world: {reason}");
            World::new()
        }
    };

    let state = AppState {
        world: Arc::new(RwLock::new(world)),
        storage,
    };
    let backup_state = state.clone();

    let public_dir = args
        .public_dir
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));
    let index_file = public_dir.join("index.html");

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/ping", get(ping_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(axum::Extension(index_file))
        .with_state(state);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let maybe_data = {
                let mut world = backup_state.world.write().await;
                if !world.dirty {
                    None
                } else {
                    world.dirty = false;
                    Some(world.to_file_data())
                }
            };
            if let Some(data) = maybe_data {
                backup_state.storage.save_world(&data).await;
            }
        }
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Waymark running at http://localhost:{port}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server");
    axum::serve(listener, app).await.expect("Server crashed");
}
