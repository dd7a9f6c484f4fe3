//! depthlink-renderer
//!
//! The rendering surface the render loop draws into: camera rigs, a bounding
//! sphere kept in step with the uploaded cloud, and a software point
//! rasterizer that can write PNG snapshots.

pub mod bounds;
pub mod camera;
pub mod software;
pub mod surface;

pub use bounds::BoundingSphere;
pub use camera::{CameraRig, Lens, OrbitCamera, TurntableCamera};
pub use software::{SoftwareSurface, BACKGROUND};
pub use surface::{PointStyle, RenderSurface, RendererError};
