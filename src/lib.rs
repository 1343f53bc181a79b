//! Tileward - keeps pixel-art templates painted on a shared tiled canvas.
//!
//! Templates are sliced into tile-aligned chunks, compared against the live
//! tiles, and the resulting candidate writes are sampled within the
//! account's budget and submitted per tile. [`services::AutoPainter`] runs
//! that cycle unattended.
//! This library exposes modules for integration testing.

pub mod error;
pub mod models;
pub mod rendering;
pub mod services;
