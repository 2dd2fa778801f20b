//! Capture client binary.
//!
use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use capture_client::{
    display::ConsoleRenderer,
    keys::{forward_keys, KeyBindings},
    meter::spawn_meter_logger,
    nn::TractLoader,
    sensors::{CameraConfig, CameraSource, DirectorySource},
    session::{Command, Session, SessionConfig},
    status::HttpAvailability,
};
use clap::Parser;
use common::protocol::MODEL_DIR;
use env_logger::TimestampPrecision;
use reqwest::{Client, Url};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Base URL of the model server
    #[clap(long, default_value = "http://127.0.0.1:3000")]
    server: Url,

    /// Path of the model bundle on the server
    #[clap(long, default_value_t = format!("{}/", MODEL_DIR))]
    model_path: String,

    /// Replay image files from this directory instead of using a camera
    #[clap(long)]
    frames_dir: Option<PathBuf>,

    /// Video device to capture from
    #[cfg(feature = "v4l")]
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    /// Width of the canvas
    #[clap(long, default_value_t = 400)]
    width: u32,

    /// Height of the canvas
    #[clap(long, default_value_t = 400)]
    height: u32,

    /// Do not mirror frames horizontally
    #[clap(long)]
    no_flip: bool,

    /// Refresh rate bounding the predictions per second
    #[clap(long, default_value_t = 60)]
    fps: u32,

    /// Give up loading the model or setting up the camera after this long
    #[clap(long, default_value_t = 30)]
    acquire_timeout_secs: u64,

    /// Stop capturing while the front-end is hidden
    #[clap(long)]
    pause_when_hidden: bool,

    /// Key starting and stopping the camera
    #[clap(long, default_value_t = ' ')]
    toggle_key: char,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let res = runtime.block_on(run(args));

    // A pending read on stdin would hold up the shutdown otherwise
    runtime.shutdown_timeout(Duration::from_millis(100));

    res
}

async fn run(args: Args) -> Result<()> {
    let camera_config = CameraConfig {
        width: args.width,
        height: args.height,
        flip: !args.no_flip,
    };

    match args.frames_dir.clone() {
        Some(frames_dir) => {
            log::info!("Replaying frames from {}", frames_dir.display());
            serve(args, DirectorySource::new(frames_dir, camera_config)).await
        }
        None => serve_device(args, camera_config).await,
    }
}

#[cfg(feature = "v4l")]
async fn serve_device(args: Args, camera_config: CameraConfig) -> Result<()> {
    log::info!("Capturing from {}", &args.device);
    let cameras = capture_client::sensors::V4lSource::new(args.device.clone(), camera_config);
    serve(args, cameras).await
}

#[cfg(not(feature = "v4l"))]
async fn serve_device(_args: Args, _camera_config: CameraConfig) -> Result<()> {
    anyhow::bail!("No camera available: pass --frames-dir or build with the v4l feature")
}

async fn serve<S: CameraSource>(args: Args, cameras: S) -> Result<()> {
    let client = Client::builder().build()?;
    let bundle_url = args.server.join(&args.model_path)?;

    let mut config = SessionConfig::for_bundle(&bundle_url)?;
    config.acquire_timeout = Duration::from_secs(args.acquire_timeout_secs);
    config.refresh_rate = args.fps;
    config.pause_when_hidden = args.pause_when_hidden;

    let availability = HttpAvailability::new(client.clone(), &args.server)?;
    let loader = TractLoader::new(client);
    let renderer = ConsoleRenderer::stdout();
    let mut session = Session::new(config, availability, loader, cameras, renderer);

    let (command_tx, command_rx) = mpsc::channel(16);

    {
        let bindings = KeyBindings {
            toggle: args.toggle_key,
        };
        let command_tx = command_tx.clone();
        tokio::spawn(async move { forward_keys(tokio::io::stdin(), bindings, command_tx).await });
    }

    {
        let cancel = session.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutting down");
                cancel.cancel();
                let _ = command_tx.send(Command::Shutdown).await;
            }
        });
    }

    spawn_meter_logger(session.meter());

    session.load().await;
    session.run(command_rx).await;

    Ok(())
}
