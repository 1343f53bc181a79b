//! Gamma lookup table access
//!
//! The table is generated at compile time by build.rs with one exact entry
//! per 8-bit channel value, so no interpolation is needed.

include!(concat!(env!("OUT_DIR"), "/gamma_lut.rs"));

/// Convert an 8-bit sRGB channel value to linear light.
#[inline]
pub fn srgb8_to_linear(value: u8) -> f64 {
    SRGB8_TO_LINEAR[value as usize]
}
