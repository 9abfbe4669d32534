//! Camera frame sources.
//!
//! A source produces frames on demand; the acquisition thread owns it
//! exclusively. Candidate backends are tried in configuration order and the
//! first that opens AND yields a real frame within the startup timeout wins.
//! When every candidate fails the system falls back to the synthetic source,
//! so the pipeline is always operable with no camera attached.
//!
//! Candidates are data-driven (`SourceSpec`): adding a backend means adding
//! a spec variant and an `open_candidate` arm, never touching the
//! orchestration loop.

pub mod synthetic;
#[cfg(feature = "capture-v4l2")]
pub mod v4l2;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::CameraSettings;
use crate::frame::Frame;

pub use synthetic::SyntheticSource;
#[cfg(feature = "capture-v4l2")]
pub use v4l2::V4l2Source;

/// A live or synthetic camera.
///
/// `read` returns the next frame or an error. A real (non-synthetic) read
/// error is terminal: the caller must release the source and not retry.
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<Frame>;

    /// Human-readable identity for logs.
    fn describe(&self) -> String;

    /// Synthetic sources never fail terminally and self-throttle their
    /// generation cadence.
    fn is_synthetic(&self) -> bool {
        false
    }
}

/// One candidate backend, tried in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// A local capture device node, e.g. `/dev/video0`.
    Device(String),
    /// The procedural fallback source.
    Synthetic,
}

impl SourceSpec {
    /// Parse a candidate string from configuration.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("synthetic") {
            SourceSpec::Synthetic
        } else {
            SourceSpec::Device(raw.trim().to_string())
        }
    }
}

/// Try each candidate in order; fall back to the synthetic source.
///
/// Backend-open failures never propagate past this boundary: each is logged
/// and the next candidate is tried. A candidate only wins after producing
/// one real frame within `settings.startup_timeout()`.
pub fn open_first_available(specs: &[SourceSpec], settings: &CameraSettings) -> Box<dyn FrameSource> {
    for spec in specs {
        match open_candidate(spec, settings) {
            Ok(Some(source)) => {
                log::info!("camera source opened: {}", source.describe());
                return source;
            }
            Ok(None) => continue,
            Err(err) => {
                log::warn!("camera candidate {:?} failed: {:#}", spec, err);
            }
        }
    }

    log::info!("no camera candidate usable, falling back to synthetic source");
    Box::new(SyntheticSource::new(settings.width, settings.height))
}

fn open_candidate(
    spec: &SourceSpec,
    settings: &CameraSettings,
) -> Result<Option<Box<dyn FrameSource>>> {
    match spec {
        SourceSpec::Synthetic => Ok(Some(Box::new(SyntheticSource::new(
            settings.width,
            settings.height,
        )))),
        SourceSpec::Device(path) => {
            // Skip absent device nodes outright instead of waiting on open.
            if !Path::new(path).exists() {
                log::debug!("camera candidate {} does not exist, skipping", path);
                return Ok(None);
            }
            open_device(path, settings)
        }
    }
}

#[cfg(feature = "capture-v4l2")]
fn open_device(path: &str, settings: &CameraSettings) -> Result<Option<Box<dyn FrameSource>>> {
    let mut source = V4l2Source::open(path, settings)?;
    probe(&mut source, settings.startup_timeout())?;
    Ok(Some(Box::new(source)))
}

#[cfg(not(feature = "capture-v4l2"))]
fn open_device(path: &str, _settings: &CameraSettings) -> Result<Option<Box<dyn FrameSource>>> {
    log::warn!(
        "camera candidate {} ignored: built without the capture-v4l2 feature",
        path
    );
    Ok(None)
}

/// Require one real frame before accepting a device source.
#[cfg_attr(not(feature = "capture-v4l2"), allow(dead_code))]
fn probe(source: &mut dyn FrameSource, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        match source.read() {
            Ok(frame) if !frame.is_empty() => return Ok(()),
            Ok(_) => {}
            Err(err) if Instant::now() >= deadline => return Err(err),
            Err(_) => {}
        }
        if Instant::now() >= deadline {
            anyhow::bail!("no frame within startup timeout");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
