//! The canvas palette, color sets and palette errors.

mod color_set;
mod error;
mod palette;

pub use color_set::ColorSet;
pub use error::{PaletteError, ParseColorError};
pub use palette::{Palette, PaletteEntry, CANVAS_COLORS, TRANSPARENT_ID};
