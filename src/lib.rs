//! SafeGuard Vision
//!
//! Core engine for real-time workplace safety monitoring: acquire camera
//! frames, detect people, check PPE compliance and danger-zone presence,
//! persist rate-limited incidents with photographic evidence, and serve an
//! annotated MJPEG stream with live stats.
//!
//! # Pipeline
//!
//! One acquisition thread owns the camera (or the synthetic fallback) and
//! publishes each frame into a single-slot exchange; stream viewers each run
//! an orchestrator that pulls the latest frame, classifies it while
//! monitoring is active, and encodes it for the multipart transport. The
//! alert manager is process-global so the incident cooldown holds across
//! viewers.
//!
//! # Module Structure
//!
//! - `frame`: RGB frame buffer and the single-slot frame exchange
//! - `source`: camera backends (V4L2 behind `capture-v4l2`, synthetic fallback)
//! - `acquisition`: the producer thread
//! - `detect`: person-detection backends (blob heuristic, tract behind
//!   `backend-tract`)
//! - `classify`: compliance rules, PPE color heuristic, frame annotation
//! - `alert`: cooldown-gated incident creation and evidence capture
//! - `store`: incident persistence (SQLite and in-memory)
//! - `stream`: monitoring state and the per-viewer orchestrator
//! - `api`: the HTTP/MJPEG surface
//! - `render`: drawing primitives used for annotation

pub mod acquisition;
pub mod alert;
pub mod api;
pub mod classify;
pub mod config;
pub mod detect;
pub mod frame;
pub mod render;
pub mod source;
pub mod store;
pub mod stream;

pub use acquisition::AcquisitionThread;
pub use alert::{AlertManager, SharedIncidentStore, DEFAULT_COOLDOWN};
pub use api::{ApiConfig, ApiContext, ApiHandle, ApiServer};
pub use classify::{
    ComplianceState, Classifier, FrameStats, HsvRange, PersonAssessment, PpeConfig,
    DEFAULT_ZONE_FRACTION,
};
pub use config::{CameraSettings, DetectorSettings, MonitorConfig};
pub use detect::{BlobBackend, BoundingBox, Detection, DetectorBackend, CLASS_PERSON};
pub use frame::{Frame, FrameSlot};
pub use source::{FrameSource, SourceSpec, SyntheticSource};
#[cfg(feature = "capture-v4l2")]
pub use source::V4l2Source;
pub use store::{InMemoryIncidentStore, Incident, IncidentStore, SqliteIncidentStore};
pub use stream::{MonitorState, StreamOrchestrator};
