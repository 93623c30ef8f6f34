//! ratiopix-algorithms: Native pixel operations for ratiometric imaging.
//!
//! This crate provides the image processing behind [`NativeOps`]:
//! - **Filters** - separable Gaussian blur and Laplacian of Gaussian
//! - **Background** - rolling-ball background subtraction
//! - **Threshold** - Moments and Default (IsoData) histogram thresholds
//! - **Align** - translation registration of channels
//! - **Render** - RGB flattening with a burned-in calibration bar
//!
#![warn(missing_docs)]

pub mod align;
pub mod background;
pub mod filters;
mod ops;
pub mod render;
pub mod threshold;

pub use ops::NativeOps;

// Re-export the trait the backend implements
pub use ratiopix_core::PixelOps;
