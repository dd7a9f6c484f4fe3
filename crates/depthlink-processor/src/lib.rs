//! depthlink-processor
//!
//! Turns side-by-side depth+colour video frames into point clouds.
//!
//! - [`color`]: RGB → HSV; depth lives in the hue channel.
//! - [`processor`]: the Frame Processor (decode, back-project, map axes,
//!   optional post-projection perturbation).
//! - [`buffer`]: the position/colour arrays handed to the renderer.

pub mod buffer;
pub mod color;
pub mod processor;

pub use buffer::{sample_capacity, CommittedCloud, PointCloudBuffer};
pub use color::{hsv_to_rgb, rgb_to_hsv, Hsv};
pub use processor::{
    AudioWiggle, FrameOutcome, FrameProcessor, PinholeIntrinsics, PointPerturbation,
    DEPTH_ONLY_COLOR, MIN_VALID_DEPTH,
};
