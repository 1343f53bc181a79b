//! Color types and conversion utilities
//!
//! - **Srgb**: 8-bit gamma-encoded color as stored in tiles and templates.
//! - **LinearRgb**: linear light, the input to CIE XYZ.
//! - **Xyz / Lab**: CIE spaces used for ΔE2000 perceptual distance.
//!
//! ```
//! use canvas_palette::{Lab, Srgb};
//!
//! let srgb = Srgb::from_u8(128, 64, 32);
//! let lab = Lab::from(srgb);
//! assert!(lab.l > 0.0 && lab.l < 100.0);
//! ```

mod lab;
mod linear_rgb;
mod lut;
mod srgb;

pub use lab::{perceptual_distance, Lab, Xyz};
pub use linear_rgb::LinearRgb;
pub use srgb::Srgb;
