//! Strata Gesture - hand tracking to mixer control
//!
//! The control-domain gesture pipeline:
//! landmarks → Kalman smoothing (+ predictive lookahead) → classification
//! with confidence gating → profile-based mapping → control commands.
//!
//! Frames arrive from an external hand tracker over a [`flume`] channel; the
//! session drains it on its control tick and pushes each frame through a
//! [`GesturePipeline`].

pub mod kalman;
pub mod landmarks;
pub mod mapper;
pub mod mapping;
pub mod pipeline;
pub mod recognize;

pub use kalman::{LandmarkSmoother, OutlierPolicy, SmootherConfig};
pub use landmarks::{HandFrame, HandObservation, Handedness, Point3, NUM_LANDMARKS};
pub use mapper::{ControlCommand, ControlMapper, MapperError};
pub use mapping::{
    ControlKind, ControlTarget, GestureMapping, HandRequirement, MappingMode, MappingParams,
    MappingProfile,
};
pub use pipeline::{frame_channel, FrameReceiver, FrameSender, GesturePipeline, PipelineTiming};
pub use recognize::{
    GestureClass, GesturePayload, GestureResult, Recognizer, RecognizerConfig, SwipeDirection,
};
