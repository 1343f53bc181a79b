pub mod raster;

pub use raster::{Rgba, RgbaImage};
