pub mod config;
pub mod errors;
pub mod slot;
pub mod types;

pub use config::{SampleParams, Sketch, SketchPreset, SurfaceSize, ViewerConfig};
pub use errors::{AcquisitionError, DecoderError, DepthLinkError, DeviceError, FrameError};
pub use slot::{FrameReader, FrameSlot};
pub use types::*;
