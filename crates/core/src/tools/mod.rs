//! # Tools
//!
//! Clients for the external services around the commander.
//!
//! - `vision` - Hazard segmentation server (frame in, annotated frame and stats out)

pub mod vision;

pub use vision::{FrameAnalysis, VisionClient, VisionError};
