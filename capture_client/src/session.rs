//! Capture session lifecycle.
//!
//! A session walks `Idle → Checking → Loading → Active → Idle`. It owns the
//! model and the camera together, so either both are held or neither is. All
//! state changes happen on the task driving the session; a capture cycle
//! always completes before the next command is looked at.
//!
use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use common::protocol::{METADATA_FILE, MODEL_FILE};
use reqwest::Url;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

use crate::{
    display::{Renderer, Status},
    fault::{Acquisition, Containment, Fault},
    meter::Meter,
    nn::{Model, ModelLoader},
    prediction::{top_prediction, ResultView},
    scheduler::FrameScheduler,
    sensors::{Camera, CameraSource},
    status::AvailabilityCheck,
};

/// Tunables of a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub model_url: Url,
    pub metadata_url: Url,
    /// Upper bound for loading the model and for setting up the camera, each.
    pub acquire_timeout: Duration,
    /// Display refresh rate bounding the capture cycles per second.
    pub refresh_rate: u32,
    /// Stop capturing while hidden instead of only saying so.
    pub pause_when_hidden: bool,
}

impl SessionConfig {
    /// Config for the bundle at `bundle_url`, e.g. `http://127.0.0.1:3000/my_model/`.
    pub fn for_bundle(bundle_url: &Url) -> Result<Self> {
        Ok(Self {
            model_url: bundle_url.join(MODEL_FILE)?,
            metadata_url: bundle_url.join(METADATA_FILE)?,
            acquire_timeout: Duration::from_secs(30),
            refresh_rate: 60,
            pause_when_hidden: false,
        })
    }
}

/// Lifecycle phase of a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    Checking,
    Loading,
    Active,
    Error,
}

/// User intents driving a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    /// Start, or stop if already running.
    Toggle,
    Stop,
    /// Check the model bundle again after fixing it.
    Recheck,
    Visibility { hidden: bool },
    /// The front-end goes away.
    Shutdown,
}

struct Acquired<M, C> {
    model: M,
    camera: C,
}

/// The one session of a front-end.
pub struct Session<A, L: ModelLoader, S: CameraSource, R> {
    config: SessionConfig,
    availability: A,
    loader: L,
    cameras: S,
    renderer: R,
    phase: Phase,
    start_enabled: bool,
    acquired: Option<Acquired<L::Model, S::Camera>>,
    scheduler: FrameScheduler,
    hidden: bool,
    cancel: CancellationToken,
    meter: Arc<Meter>,
}

impl<A, L, S, R> Session<A, L, S, R>
where
    A: AvailabilityCheck,
    L: ModelLoader,
    S: CameraSource,
    R: Renderer,
{
    pub fn new(config: SessionConfig, availability: A, loader: L, cameras: S, renderer: R) -> Self {
        let scheduler = FrameScheduler::new(config.refresh_rate);

        Self {
            config,
            availability,
            loader,
            cameras,
            renderer,
            phase: Phase::Idle,
            start_enabled: true,
            acquired: None,
            scheduler,
            hidden: false,
            cancel: CancellationToken::new(),
            meter: Arc::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Active && self.acquired.is_some()
    }

    /// Whether model and camera are currently held.
    pub fn holds_resources(&self) -> bool {
        self.acquired.is_some()
    }

    pub fn start_enabled(&self) -> bool {
        self.start_enabled
    }

    pub fn frame_pending(&self) -> bool {
        self.scheduler.pending().is_some()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Cycle counters of this session.
    pub fn meter(&self) -> Arc<Meter> {
        self.meter.clone()
    }

    /// Token aborting outstanding acquisitions when cancelled.
    ///
    /// Cancelling is terminal, later starts are aborted right away.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check the model bundle once the front-end is up.
    pub async fn load(&mut self) {
        self.renderer.status(Status::Ready, "Checking model...");
        if self.check_availability().await {
            self.phase = Phase::Idle;
            self.renderer.show_placeholder();
            self.renderer.status(Status::Ready, "Ready to start");
        }
    }

    /// Start a session, or stop it if it is running already.
    pub async fn start(&mut self) {
        if self.is_running() {
            self.stop();
            return;
        }
        if !self.start_enabled {
            log::warn!("Start is disabled until the model bundle is fixed");
            return;
        }

        if !self.check_availability().await {
            return;
        }

        self.phase = Phase::Loading;
        match self.acquire().await {
            Ok(acquired) => self.activate(acquired),
            Err(fault) => self.contain(fault),
        }
    }

    /// Stop a running session. Does nothing if nothing is running.
    pub fn stop(&mut self) {
        if !self.release() {
            log::debug!("Stop requested without a running session");
            return;
        }

        self.phase = Phase::Idle;
        self.renderer.status(Status::Ready, "Ready to start");
        log::info!("Session stopped");
    }

    /// Check the model bundle again, lifting a disabled start on success.
    pub async fn recheck(&mut self) {
        if self.is_running() {
            log::info!("Session is running, nothing to recheck");
            return;
        }

        self.renderer.status(Status::Ready, "Checking model...");
        if self.check_availability().await {
            self.phase = Phase::Idle;
            self.start_enabled = true;
            self.renderer.set_start_enabled(true);
            self.renderer.show_placeholder();
            self.renderer.status(Status::Ready, "Ready to start");
        }
    }

    /// Run one capture cycle: capture, infer, render and request the next frame.
    pub async fn cycle(&mut self) {
        let Some(acquired) = self.acquired.as_mut() else {
            return;
        };

        if let Err(err) = acquired.camera.update() {
            self.contain(Fault::Capture(err));
            return;
        }

        let predicted = acquired.model.predict(acquired.camera.canvas()).await;
        match predicted {
            Ok(predictions) => match top_prediction(&predictions) {
                Some(top) => {
                    self.renderer.show_result(&ResultView::from(top));
                    self.meter.tick_predicted();
                }
                None => log::warn!("Model returned no predictions"),
            },
            Err(err) => {
                self.meter.tick_skipped();
                self.contain(Fault::Inference(err));
            }
        }

        if self.is_running() && !self.paused() {
            self.scheduler.request();
        }
    }

    /// React to the front-end being hidden or shown again.
    ///
    /// Unless `pause_when_hidden` is set this only changes the status text and
    /// capturing goes on in the background.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
        if !self.is_running() {
            return;
        }

        if hidden {
            if self.config.pause_when_hidden {
                self.cancel_pending_frame();
            }
            self.renderer
                .status(Status::Ready, "Page hidden - camera paused");
        } else {
            if !self.frame_pending() {
                self.scheduler.request();
            }
            self.renderer.status(Status::Active, "Camera active");
        }
    }

    /// Apply a command. Returns `false` once the session is shut down.
    pub async fn handle(&mut self, command: Command) -> bool {
        log::debug!("Handling {:?} in phase {:?}", command, self.phase);
        match command {
            Command::Toggle => self.start().await,
            Command::Stop => self.stop(),
            Command::Recheck => self.recheck().await,
            Command::Visibility { hidden } => self.set_hidden(hidden),
            Command::Shutdown => {
                self.shutdown();
                return false;
            }
        }

        true
    }

    /// Drive the session until shut down or until all command senders are gone.
    pub async fn run(&mut self, mut commands: Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(_frame) = self.scheduler.next_frame(), if self.frame_pending() => {
                    self.cycle().await;
                }
            }
        }
    }

    /// Tear everything down for good.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.stop();
    }

    fn paused(&self) -> bool {
        self.hidden && self.config.pause_when_hidden
    }

    fn cancel_pending_frame(&mut self) {
        if let Some(handle) = self.scheduler.pending() {
            self.scheduler.cancel(handle);
        }
    }

    /// Run the availability check. On failure the fault is contained already.
    async fn check_availability(&mut self) -> bool {
        self.phase = Phase::Checking;
        match self.availability.check().await {
            Ok(status) if status.exists => {
                log::info!("Model files found: {:?}", &status.files);
                true
            }
            Ok(status) => {
                self.contain(Fault::Unavailable(status.message));
                false
            }
            Err(err) => {
                self.contain(Fault::StatusCheck(err));
                false
            }
        }
    }

    /// Acquire model and camera. Whatever was acquired is dropped on failure.
    async fn acquire(&mut self) -> Result<Acquired<L::Model, S::Camera>, Fault> {
        let timeout = self.config.acquire_timeout;

        self.renderer.status(Status::Loading, "Loading model...");
        let model = bounded(
            &self.cancel,
            timeout,
            Acquisition::Model,
            self.loader
                .load(&self.config.model_url, &self.config.metadata_url),
        )
        .await?;
        self.renderer.set_class_count(model.total_classes());

        self.renderer.status(Status::Loading, "Setting up camera...");
        let mut camera = bounded(
            &self.cancel,
            timeout,
            Acquisition::Camera,
            self.cameras.setup(),
        )
        .await?;

        let played = bounded(&self.cancel, timeout, Acquisition::Camera, camera.play()).await;
        if let Err(fault) = played {
            camera.stop();
            return Err(fault);
        }

        Ok(Acquired { model, camera })
    }

    fn activate(&mut self, acquired: Acquired<L::Model, S::Camera>) {
        self.renderer.show_live();
        self.acquired = Some(acquired);
        self.phase = Phase::Active;
        self.renderer.status(Status::Active, "Camera active");
        self.renderer.set_running(true);
        if !self.paused() {
            self.scheduler.request();
        }
        log::info!("Session active");
    }

    /// Cancel the next frame, then release camera and model.
    ///
    /// Returns `false` if nothing was held.
    fn release(&mut self) -> bool {
        self.cancel_pending_frame();

        let Some(mut acquired) = self.acquired.take() else {
            return false;
        };
        acquired.camera.stop();
        drop(acquired);

        self.renderer.show_placeholder();
        self.renderer.set_running(false);

        true
    }

    /// Apply the containment policy of a fault.
    fn contain(&mut self, fault: Fault) {
        match fault.containment() {
            Containment::DisableStart => {
                log::warn!("{}", &fault);
                self.release();
                self.phase = Phase::Error;
                self.start_enabled = false;
                self.renderer.setup_required(&fault.user_message());
                self.renderer.status(Status::Error, "Model not found");
                self.renderer.set_start_enabled(false);
            }
            Containment::RollbackSession => {
                log::error!("{}", &fault);
                self.release();
                self.phase = Phase::Error;
                self.renderer.status(Status::Error, "Failed to start camera");
                self.renderer.notify_error(&fault.user_message());
            }
            Containment::HaltLoop => {
                log::error!("{}", &fault);
                self.release();
                self.phase = Phase::Error;
                self.renderer.status(Status::Error, "Camera capture failed");
                self.renderer.notify_error(&fault.user_message());
            }
            Containment::DisplayOnly => {
                log::warn!("{}", &fault);
                self.renderer.status(Status::Error, "Prediction failed");
            }
        }
    }
}

/// Await an acquisition, bounded by a timeout and a cancellation token.
async fn bounded<T>(
    cancel: &CancellationToken,
    timeout: Duration,
    what: Acquisition,
    acquisition: impl Future<Output = Result<T>>,
) -> Result<T, Fault> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(Fault::Cancelled(what)),
        res = tokio::time::timeout(timeout, acquisition) => match res {
            Err(_elapsed) => Err(Fault::Timeout { what, after: timeout }),
            Ok(Err(err)) => Err(match what {
                Acquisition::Model => Fault::ModelLoad(err),
                Acquisition::Camera => Fault::CameraSetup(err),
            }),
            Ok(Ok(value)) => Ok(value),
        },
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_value_through() {
        let cancel = CancellationToken::new();

        let res = bounded(&cancel, Duration::from_secs(1), Acquisition::Model, async {
            Ok::<_, anyhow::Error>(7)
        })
        .await;

        assert_eq!(res.ok(), Some(7));
    }

    #[tokio::test]
    async fn test_bounded_tags_errors_by_origin() {
        let cancel = CancellationToken::new();

        let res = bounded(&cancel, Duration::from_secs(1), Acquisition::Camera, async {
            Err::<(), _>(anyhow::anyhow!("permission denied"))
        })
        .await;

        assert!(matches!(res, Err(Fault::CameraSetup(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let cancel = CancellationToken::new();

        let res = bounded(
            &cancel,
            Duration::from_secs(5),
            Acquisition::Camera,
            std::future::pending::<Result<()>>(),
        )
        .await;

        assert!(matches!(
            res,
            Err(Fault::Timeout {
                what: Acquisition::Camera,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_bounded_is_cancellable() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let res = bounded(
            &cancel,
            Duration::from_secs(5),
            Acquisition::Model,
            std::future::pending::<Result<()>>(),
        )
        .await;

        assert!(matches!(res, Err(Fault::Cancelled(Acquisition::Model))));
    }

    #[test]
    fn test_bundle_urls() -> Result<()> {
        let config = SessionConfig::for_bundle(&Url::parse("http://127.0.0.1:3000/my_model/")?)?;

        assert_eq!(
            config.model_url.as_str(),
            "http://127.0.0.1:3000/my_model/model.json"
        );
        assert_eq!(
            config.metadata_url.as_str(),
            "http://127.0.0.1:3000/my_model/metadata.json"
        );

        Ok(())
    }
}
