#![cfg(feature = "capture-v4l2")]

//! USB camera source backed by V4L2.
//!
//! Requests RGB3 at the configured geometry and reads frames through a
//! memory-mapped buffer stream. Capture errors are terminal for this source;
//! the acquisition thread reacts by stopping and releasing the device.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use crate::config::CameraSettings;
use crate::frame::Frame;
use crate::source::FrameSource;

pub struct V4l2Source {
    device_path: String,
    state: DeviceState,
    width: u32,
    height: u32,
    frame_count: u64,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    /// Open the device node and negotiate format. The caller still probes
    /// for a first real frame before accepting the source.
    pub fn open(path: &str, settings: &CameraSettings) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device =
            v4l::Device::with_path(path).with_context(|| format!("open v4l2 device {}", path))?;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("v4l2: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("v4l2: failed to set fps on {}: {}", path, err);
            }
        }

        let width = format.width;
        let height = format.height;
        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!("v4l2: opened {} ({}x{})", path, width, height);
        Ok(Self {
            device_path: path.to_string(),
            state,
            width,
            height,
            frame_count: 0,
        })
    }
}

impl FrameSource for V4l2Source {
    fn read(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let mut pixels = self.state.with_stream_mut(|stream| {
            stream
                .next()
                .map(|(buf, _meta)| buf.to_vec())
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))
        })?;

        let expected = (self.width as usize) * (self.height as usize) * 3;
        if pixels.len() < expected {
            return Err(anyhow!(
                "short v4l2 frame from {}: {} bytes, expected {}",
                self.device_path,
                pixels.len(),
                expected
            ));
        }
        pixels.truncate(expected);

        self.frame_count += 1;
        Ok(Frame::new(pixels, self.width, self.height, self.frame_count))
    }

    fn describe(&self) -> String {
        format!(
            "v4l2 {} ({}x{})",
            self.device_path, self.width, self.height
        )
    }
}
