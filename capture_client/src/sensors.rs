//! Sensors module.
//!
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{imageops, RgbImage};

#[cfg(feature = "v4l")]
pub use self::v4l::{V4lCamera, V4lSource};

/// File extensions the replay camera picks up.
const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Geometry of the captured canvas.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    /// Mirror frames horizontally, like looking into a mirror.
    pub flip: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
            flip: true,
        }
    }
}

/// Something that can hand out a camera.
#[allow(async_fn_in_trait)]
pub trait CameraSource {
    type Camera: Camera;

    /// Negotiate access to the device.
    async fn setup(&self) -> Result<Self::Camera>;
}

/// Camera exclusively owned by a session.
#[allow(async_fn_in_trait)]
pub trait Camera {
    /// Start streaming.
    async fn play(&mut self) -> Result<()>;

    /// Capture the latest frame into the canvas.
    fn update(&mut self) -> Result<()>;

    /// Last captured frame.
    fn canvas(&self) -> &RgbImage;

    /// Release the device.
    fn stop(&mut self);
}

/// Scale a captured image to the canvas and mirror it if configured.
fn to_canvas(image: RgbImage, config: &CameraConfig) -> RgbImage {
    let mut canvas = if image.dimensions() == (config.width, config.height) {
        image
    } else {
        imageops::resize(
            &image,
            config.width,
            config.height,
            imageops::FilterType::Triangle,
        )
    };
    if config.flip {
        imageops::flip_horizontal_in_place(&mut canvas);
    }

    canvas
}

/// Camera source replaying the images of a directory.
pub struct DirectorySource {
    dir: PathBuf,
    config: CameraConfig,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, config: CameraConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }
}

impl CameraSource for DirectorySource {
    type Camera = DirectoryCamera;

    async fn setup(&self) -> Result<DirectoryCamera> {
        let frames = list_frames(&self.dir)?;
        if frames.is_empty() {
            bail!("no images found in {}", self.dir.display());
        }
        log::info!(
            "Replaying {} frames from {}",
            frames.len(),
            self.dir.display()
        );

        Ok(DirectoryCamera {
            frames,
            next: 0,
            playing: false,
            canvas: RgbImage::new(self.config.width, self.config.height),
            config: self.config,
        })
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_frame && path.is_file() {
            frames.push(path);
        }
    }
    frames.sort();

    Ok(frames)
}

/// Camera cycling through a fixed list of image files.
pub struct DirectoryCamera {
    frames: Vec<PathBuf>,
    next: usize,
    playing: bool,
    canvas: RgbImage,
    config: CameraConfig,
}

impl Camera for DirectoryCamera {
    async fn play(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        if !self.playing {
            bail!("camera is not playing");
        }
        let path = &self.frames[self.next % self.frames.len()];
        self.next = (self.next + 1) % self.frames.len();

        let image = image::open(path)
            .with_context(|| format!("decoding {}", path.display()))?
            .to_rgb8();
        self.canvas = to_canvas(image, &self.config);

        Ok(())
    }

    fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    fn stop(&mut self) {
        log::debug!("Stopping replay camera");
        self.playing = false;
    }
}

#[cfg(feature = "v4l")]
mod v4l {
    use anyhow::Result;
    use image::RgbImage;
    use rscam::{Camera as Device, Config};
    use simple_error::simple_error;

    use super::{to_canvas, Camera, CameraConfig, CameraSource};

    const FORMAT: &[u8] = b"MJPG";

    /// Video4Linux device on a Linux machine.
    pub struct V4lSource {
        device_name: String,
        resolution: Option<(u32, u32)>,
        frame_rate: Option<(u32, u32)>,
        config: CameraConfig,
    }

    impl V4lSource {
        pub fn new(device_name: impl Into<String>, config: CameraConfig) -> Self {
            Self {
                device_name: device_name.into(),
                resolution: None,
                frame_rate: None,
                config,
            }
        }

        pub fn with_resolution(mut self, resolution: (u32, u32)) -> Self {
            self.resolution = Some(resolution);
            self
        }

        pub fn with_frame_rate(mut self, frame_rate: (u32, u32)) -> Self {
            self.frame_rate = Some(frame_rate);
            self
        }
    }

    impl CameraSource for V4lSource {
        type Camera = V4lCamera;

        async fn setup(&self) -> Result<V4lCamera> {
            let device = Device::new(&self.device_name)?;
            log_supported_formats(&device);

            log::info!("Using camera {}", &self.device_name);

            let resolution = self
                .resolution
                .map(Ok)
                .unwrap_or_else(|| get_max_resolution(&device))?;

            let frame_rate = self
                .frame_rate
                .map(Ok)
                .unwrap_or_else(|| get_max_frame_rate(&device, resolution))?;

            Ok(V4lCamera {
                device,
                resolution,
                frame_rate,
                streaming: false,
                canvas: RgbImage::new(self.config.width, self.config.height),
                config: self.config,
            })
        }
    }

    /// Opened video device.
    pub struct V4lCamera {
        device: Device,
        resolution: (u32, u32),
        frame_rate: (u32, u32),
        streaming: bool,
        canvas: RgbImage,
        config: CameraConfig,
    }

    impl Camera for V4lCamera {
        async fn play(&mut self) -> Result<()> {
            self.device.start(&Config {
                interval: self.frame_rate,
                resolution: self.resolution,
                format: FORMAT,
                ..Default::default()
            })?;
            self.streaming = true;

            Ok(())
        }

        fn update(&mut self) -> Result<()> {
            let frame = self.device.capture()?;
            let image = image::load_from_memory(&frame[..])?.to_rgb8();
            self.canvas = to_canvas(image, &self.config);

            Ok(())
        }

        fn canvas(&self) -> &RgbImage {
            &self.canvas
        }

        fn stop(&mut self) {
            if !self.streaming {
                return;
            }
            self.streaming = false;
            if let Err(err) = self.device.stop() {
                log::warn!("Error stopping camera: {}", err);
            }
        }
    }

    /// Get the maximum supported resolution for MJPG.
    fn get_max_resolution(device: &Device) -> Result<(u32, u32)> {
        let resolution_info = device.resolutions(FORMAT)?;
        log::debug!("Found resolutions: {:?}", &resolution_info);
        match resolution_info {
            rscam::ResolutionInfo::Discretes(resolutions) => resolutions
                .iter()
                // Highest resolution in terms of number of pixels
                .max_by_key(|res| res.0 * res.1)
                .copied(),
            rscam::ResolutionInfo::Stepwise { max, .. } => Some(max),
        }
        .ok_or_else(|| simple_error!("No resolution found").into())
    }

    /// Get the maximum supported frame rate for MJPG and the given resolution.
    fn get_max_frame_rate(device: &Device, resolution: (u32, u32)) -> Result<(u32, u32)> {
        let interval_info = device.intervals(FORMAT, resolution)?;
        log::debug!("Found frame rates: {:?}", &interval_info);
        match interval_info {
            // Intervals are (numerator, denominator) seconds per frame, so the shortest wins
            rscam::IntervalInfo::Discretes(intervals) => intervals
                .iter()
                .max_by_key(|(numerator, denominator)| denominator / numerator.max(&1))
                .copied(),
            rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
        }
        .ok_or_else(|| simple_error!("No frame rate found").into())
    }

    fn log_supported_formats(device: &Device) {
        let formats: Vec<_> = device.formats().filter_map(|fmt| fmt.ok()).collect();
        log::debug!("Supported formats: {:?}, using MJPG", formats);
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn write_frames(dir: &Path, colors: &[[u8; 3]]) -> Result<()> {
        for (idx, color) in colors.iter().enumerate() {
            let mut image = RgbImage::from_pixel(8, 4, image::Rgb(*color));
            // Mark the left edge to observe mirroring
            image.put_pixel(0, 0, image::Rgb([1, 2, 3]));
            image.save(dir.join(format!("frame-{}.png", idx)))?;
        }
        std::fs::write(dir.join("notes.txt"), "ignored")?;

        Ok(())
    }

    #[tokio::test]
    async fn test_replay_cycles_through_frames() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_frames(dir.path(), &[[255, 0, 0], [0, 255, 0]])?;
        let config = CameraConfig {
            width: 8,
            height: 4,
            flip: false,
        };

        let mut camera = DirectorySource::new(dir.path(), config).setup().await?;
        camera.play().await?;

        camera.update()?;
        assert_eq!(camera.canvas().get_pixel(4, 2).0, [255, 0, 0]);
        camera.update()?;
        assert_eq!(camera.canvas().get_pixel(4, 2).0, [0, 255, 0]);
        camera.update()?;
        assert_eq!(camera.canvas().get_pixel(4, 2).0, [255, 0, 0]);

        Ok(())
    }

    #[tokio::test]
    async fn test_replay_flips_and_resizes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_frames(dir.path(), &[[10, 10, 10]])?;

        let mut camera = DirectorySource::new(
            dir.path(),
            CameraConfig {
                width: 8,
                height: 4,
                flip: true,
            },
        )
        .setup()
        .await?;
        camera.play().await?;
        camera.update()?;

        assert_eq!(camera.canvas().get_pixel(7, 0).0, [1, 2, 3]);

        let mut camera = DirectorySource::new(dir.path(), CameraConfig::default())
            .setup()
            .await?;
        camera.play().await?;
        camera.update()?;

        assert_eq!(camera.canvas().dimensions(), (400, 400));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_requires_play() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_frames(dir.path(), &[[0, 0, 0]])?;

        let mut camera = DirectorySource::new(dir.path(), CameraConfig::default())
            .setup()
            .await?;

        assert!(camera.update().is_err());
        camera.play().await?;
        assert!(camera.update().is_ok());
        camera.stop();
        assert!(camera.update().is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_directory_fails_setup() -> Result<()> {
        let dir = tempfile::tempdir()?;

        assert!(DirectorySource::new(dir.path(), CameraConfig::default())
            .setup()
            .await
            .is_err());

        Ok(())
    }
}
