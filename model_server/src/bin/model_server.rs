//! Model server binary.
//!
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Result;
use clap::Parser;
use common::protocol::{DEFAULT_PORT, METADATA_FILE, MODEL_DIR, MODEL_FILE};
use env_logger::TimestampPrecision;
use model_server::{bundle::ModelBundle, routes::build_router, ServerState};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Port on which to serve
    #[clap(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[clap(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Directory holding the static front-end files
    #[clap(long, default_value = "static")]
    static_dir: PathBuf,

    /// Directory holding the exported model bundle
    #[clap(long, default_value = MODEL_DIR)]
    model_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    // Make sure there is a place to drop the exported model into
    let bundle = ModelBundle::new(&args.model_dir);
    if bundle.ensure_dir()? {
        log::warn!(
            "Created model folder {}. Please add your model files: {}, {} and the .onnx weights listed in its weightsManifest",
            bundle.dir().display(),
            MODEL_FILE,
            METADATA_FILE
        );
    } else {
        log::info!("Model folder found at {}", bundle.dir().display());
    }

    let state = Arc::new(ServerState::new(bundle, &args.static_dir));
    let app = build_router(state);

    // Serve HTTP server
    let addr = SocketAddr::new(args.bind, args.port);
    log::info!("Vision classifier server running on http://{}", &addr);
    axum::Server::try_bind(&addr)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            log::info!("Shutting down");
        })
        .await?;

    Ok(())
}
