//! Test fixtures and constants.

use canvas_palette::Palette;
use tileward::models::{Placement, Template, TemplateCollection};
use tileward::rendering::{Rgba, RgbaImage};
use tileward::services::{AccountSnapshot, StaticAccount};

/// Palette colours used by the fixtures
pub mod colors {
    use tileward::rendering::Rgba;

    /// Palette id 7
    pub const RED: Rgba = Rgba::new(237, 28, 36, 255);
    /// Palette id 19
    pub const BLUE: Rgba = Rgba::new(64, 147, 228, 255);
    /// Palette id 5
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    /// Palette id 40, premium
    pub const DARK_OLIVE: Rgba = Rgba::new(74, 107, 58, 255);
}

pub const TOKEN: &str = "test-token";

/// An image filled with one colour.
pub fn solid(width: u32, height: u32, px: Rgba) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            img.put(x, y, px);
        }
    }
    img
}

/// A `width`×`height` red template at `placement`, default tile size and
/// draw multiplier.
pub fn red_template(placement: Placement, width: u32, height: u32) -> Template {
    Template::from_image(
        "red",
        "1",
        0,
        placement,
        &solid(width, height, colors::RED),
        1000,
        3,
    )
    .unwrap()
}

pub fn collection(templates: impl IntoIterator<Item = Template>) -> TemplateCollection {
    let mut collection = TemplateCollection::new();
    for template in templates {
        collection.insert(template);
    }
    collection
}

/// Account with the free palette and `charges` charges.
pub fn account(charges: u32) -> StaticAccount {
    StaticAccount(AccountSnapshot {
        charges,
        available: Palette::canvas().free_colors(),
        token: TOKEN.to_string(),
    })
}

/// PNG bytes of a live tile with `pixels` painted.
pub fn tile_png(pixels: &[(u32, u32, Rgba)]) -> Vec<u8> {
    let mut tile = RgbaImage::new(1000, 1000);
    for &(x, y, px) in pixels {
        tile.put(x, y, px);
    }
    tile.encode_png().unwrap()
}
