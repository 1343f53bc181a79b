//! The canvas palette and nearest-color matching.
//!
//! The canvas accepts a fixed, ordered list of colors addressed by a small
//! integer id. Id 0 is reserved for "transparent" and is only ever written
//! to erase a pixel; it never takes part in color matching.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use super::color_set::ColorSet;
use super::error::PaletteError;
use crate::color::Srgb;

/// Id of the reserved transparent / erase entry.
pub const TRANSPARENT_ID: u8 = 0;

/// One palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub id: u8,
    pub name: &'static str,
    pub rgb: Srgb,
    /// Premium colors must be unlocked per account before they can be used.
    pub premium: bool,
}

const fn entry(id: u8, name: &'static str, r: u8, g: u8, b: u8, premium: bool) -> PaletteEntry {
    PaletteEntry {
        id,
        name,
        rgb: Srgb::from_u8(r, g, b),
        premium,
    }
}

/// The 64-color canvas palette. Ids 32..=63 are premium.
pub const CANVAS_COLORS: [PaletteEntry; 64] = [
    entry(0, "Transparent", 0, 0, 0, false),
    entry(1, "Black", 0, 0, 0, false),
    entry(2, "Dark Gray", 60, 60, 60, false),
    entry(3, "Gray", 120, 120, 120, false),
    entry(4, "Light Gray", 210, 210, 210, false),
    entry(5, "White", 255, 255, 255, false),
    entry(6, "Deep Red", 96, 0, 24, false),
    entry(7, "Red", 237, 28, 36, false),
    entry(8, "Orange", 255, 127, 39, false),
    entry(9, "Gold", 246, 170, 9, false),
    entry(10, "Yellow", 249, 221, 59, false),
    entry(11, "Light Yellow", 255, 250, 188, false),
    entry(12, "Dark Green", 14, 185, 104, false),
    entry(13, "Green", 19, 230, 123, false),
    entry(14, "Light Green", 135, 255, 94, false),
    entry(15, "Dark Teal", 12, 129, 110, false),
    entry(16, "Teal", 16, 174, 166, false),
    entry(17, "Light Teal", 19, 225, 190, false),
    entry(18, "Dark Blue", 40, 80, 158, false),
    entry(19, "Blue", 64, 147, 228, false),
    entry(20, "Cyan", 96, 247, 242, false),
    entry(21, "Indigo", 107, 80, 246, false),
    entry(22, "Light Indigo", 153, 177, 251, false),
    entry(23, "Dark Purple", 120, 12, 153, false),
    entry(24, "Purple", 170, 56, 185, false),
    entry(25, "Light Purple", 224, 159, 249, false),
    entry(26, "Dark Pink", 203, 0, 122, false),
    entry(27, "Pink", 236, 31, 128, false),
    entry(28, "Light Pink", 243, 141, 169, false),
    entry(29, "Dark Brown", 104, 70, 52, false),
    entry(30, "Brown", 149, 104, 42, false),
    entry(31, "Beige", 248, 178, 119, false),
    entry(32, "Medium Gray", 170, 170, 170, true),
    entry(33, "Dark Red", 165, 14, 30, true),
    entry(34, "Light Red", 250, 128, 114, true),
    entry(35, "Dark Orange", 228, 92, 26, true),
    entry(36, "Light Tan", 214, 181, 148, true),
    entry(37, "Dark Goldenrod", 156, 132, 49, true),
    entry(38, "Goldenrod", 197, 173, 49, true),
    entry(39, "Light Goldenrod", 232, 212, 95, true),
    entry(40, "Dark Olive", 74, 107, 58, true),
    entry(41, "Olive", 90, 148, 74, true),
    entry(42, "Light Olive", 132, 197, 115, true),
    entry(43, "Dark Cyan", 15, 121, 159, true),
    entry(44, "Light Cyan", 187, 250, 242, true),
    entry(45, "Light Blue", 125, 199, 255, true),
    entry(46, "Dark Indigo", 77, 49, 184, true),
    entry(47, "Dark Slate Blue", 74, 66, 132, true),
    entry(48, "Slate Blue", 122, 113, 196, true),
    entry(49, "Light Slate Blue", 181, 174, 241, true),
    entry(50, "Light Brown", 219, 164, 99, true),
    entry(51, "Dark Beige", 209, 128, 81, true),
    entry(52, "Light Beige", 255, 197, 165, true),
    entry(53, "Dark Peach", 155, 82, 73, true),
    entry(54, "Peach", 209, 128, 120, true),
    entry(55, "Light Peach", 250, 182, 164, true),
    entry(56, "Dark Tan", 123, 99, 82, true),
    entry(57, "Tan", 156, 132, 107, true),
    entry(58, "Dark Slate", 51, 57, 65, true),
    entry(59, "Slate", 109, 117, 141, true),
    entry(60, "Light Slate", 179, 185, 209, true),
    entry(61, "Dark Stone", 109, 100, 63, true),
    entry(62, "Stone", 148, 140, 107, true),
    entry(63, "Light Stone", 205, 197, 158, true),
];

/// An ordered palette with memoized nearest-color lookup.
///
/// Lookups by id are O(1). [`Palette::nearest`] is called once per pixel at
/// tile resolution, so results are cached per 24-bit RGB value for the
/// lifetime of the palette.
///
/// # Example
///
/// ```
/// use canvas_palette::{Palette, Srgb};
///
/// let palette = Palette::canvas();
/// assert_eq!(palette.len(), 64);
/// assert_eq!(palette.nearest(Srgb::from_u8(250, 250, 250)), 5); // White
/// ```
#[derive(Debug)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    nearest_cache: Mutex<HashMap<u32, u8>>,
}

impl Palette {
    /// Create a palette from an ordered entry list.
    ///
    /// # Errors
    ///
    /// - empty list ([`PaletteError::EmptyPalette`])
    /// - more than 64 entries ([`PaletteError::TooManyColors`])
    /// - ids not equal to their position ([`PaletteError::NonDenseId`])
    /// - two drawable entries with the same RGB ([`PaletteError::DuplicateColor`])
    pub fn new(entries: &[PaletteEntry]) -> Result<Self, PaletteError> {
        if entries.is_empty() {
            return Err(PaletteError::EmptyPalette);
        }
        if entries.len() > ColorSet::CAPACITY {
            return Err(PaletteError::TooManyColors(entries.len()));
        }

        let mut seen = HashMap::new();
        for (index, e) in entries.iter().enumerate() {
            if e.id as usize != index {
                return Err(PaletteError::NonDenseId { index, id: e.id });
            }
            // The transparent entry's RGB is meaningless and may repeat black.
            if e.id == TRANSPARENT_ID {
                continue;
            }
            if seen.insert(e.rgb.key(), index).is_some() {
                return Err(PaletteError::DuplicateColor { index });
            }
        }

        Ok(Self {
            entries: entries.to_vec(),
            nearest_cache: Mutex::new(HashMap::new()),
        })
    }

    /// The shared canvas palette.
    pub fn canvas() -> &'static Palette {
        static CANVAS: OnceLock<Palette> = OnceLock::new();
        CANVAS.get_or_init(|| Palette {
            entries: CANVAS_COLORS.to_vec(),
            nearest_cache: Mutex::new(HashMap::new()),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; empty palettes are rejected at construction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by id, O(1).
    #[inline]
    pub fn entry(&self, id: u8) -> Option<&PaletteEntry> {
        self.entries.get(id as usize)
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Case-insensitive lookup by display name.
    pub fn by_name(&self, name: &str) -> Result<&PaletteEntry, PaletteError> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| PaletteError::UnknownColor(name.to_string()))
    }

    /// Every id usable without unlocks, transparent included.
    pub fn free_colors(&self) -> ColorSet {
        ColorSet::from_ids(self.entries.iter().filter(|e| !e.premium).map(|e| e.id))
    }

    /// Every id in the palette.
    pub fn all_colors(&self) -> ColorSet {
        ColorSet::from_ids(self.entries.iter().map(|e| e.id))
    }

    /// Nearest drawable palette id to `rgb` by Euclidean distance in raw RGB.
    ///
    /// Never returns [`TRANSPARENT_ID`]. Ties resolve to the first entry in
    /// palette order. Results are memoized per 24-bit color.
    pub fn nearest(&self, rgb: Srgb) -> u8 {
        let key = rgb.key();
        if let Some(&id) = self.lock_cache().get(&key) {
            return id;
        }

        let id = self.nearest_uncached(rgb);
        self.lock_cache().insert(key, id);
        id
    }

    fn nearest_uncached(&self, rgb: Srgb) -> u8 {
        let mut best_id = TRANSPARENT_ID;
        let mut best_dist = u32::MAX;
        for e in self.entries.iter().filter(|e| e.id != TRANSPARENT_ID) {
            let dist = rgb.distance_squared(e.rgb);
            // Strict less-than keeps the first minimum in palette order.
            if dist < best_dist {
                best_dist = dist;
                best_id = e.id;
            }
        }
        best_id
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<u32, u8>> {
        // A poisoned cache only ever holds complete entries.
        self.nearest_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of memoized nearest-color results.
    pub fn cached_lookups(&self) -> usize {
        self.lock_cache().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_palette() -> Palette {
        Palette::new(&[
            entry(0, "Transparent", 0, 0, 0, false),
            entry(1, "Black", 0, 0, 0, false),
            entry(2, "White", 255, 255, 255, false),
            entry(3, "Red", 255, 0, 0, true),
        ])
        .unwrap()
    }

    #[test]
    fn test_canvas_palette_is_valid() {
        let palette = Palette::new(&CANVAS_COLORS).unwrap();
        assert_eq!(palette.len(), 64);
        for (i, e) in palette.entries().iter().enumerate() {
            assert_eq!(e.id as usize, i);
        }
    }

    #[test]
    fn test_palette_empty_error() {
        assert!(matches!(Palette::new(&[]), Err(PaletteError::EmptyPalette)));
    }

    #[test]
    fn test_palette_non_dense_ids() {
        let result = Palette::new(&[
            entry(0, "Transparent", 0, 0, 0, false),
            entry(2, "White", 255, 255, 255, false),
        ]);
        assert!(matches!(
            result,
            Err(PaletteError::NonDenseId { index: 1, id: 2 })
        ));
    }

    #[test]
    fn test_palette_duplicate_drawable_color() {
        let result = Palette::new(&[
            entry(0, "Transparent", 0, 0, 0, false),
            entry(1, "Red", 255, 0, 0, false),
            entry(2, "Also Red", 255, 0, 0, false),
        ]);
        assert!(matches!(
            result,
            Err(PaletteError::DuplicateColor { index: 2 })
        ));
    }

    #[test]
    fn test_entry_lookup_by_id() {
        let palette = Palette::canvas();
        assert_eq!(palette.entry(7).unwrap().name, "Red");
        assert!(palette.entry(64).is_none());
    }

    #[test]
    fn test_by_name_is_case_insensitive() {
        let palette = Palette::canvas();
        assert_eq!(palette.by_name("light blue").unwrap().id, 45);
        assert!(matches!(
            palette.by_name("Chartreuse"),
            Err(PaletteError::UnknownColor(_))
        ));
    }

    #[test]
    fn test_nearest_never_returns_transparent() {
        let palette = small_palette();
        // Pure black is the transparent entry's RGB too; it must map to Black.
        assert_eq!(palette.nearest(Srgb::from_u8(0, 0, 0)), 1);
        for v in [0u8, 17, 64, 128, 200, 255] {
            assert_ne!(palette.nearest(Srgb::from_u8(v, v / 2, v / 3)), TRANSPARENT_ID);
        }
    }

    #[test]
    fn test_nearest_tie_breaks_in_palette_order() {
        let palette = Palette::new(&[
            entry(0, "Transparent", 0, 0, 0, false),
            entry(1, "Low", 100, 100, 100, false),
            entry(2, "High", 110, 100, 100, false),
        ])
        .unwrap();
        // (105,100,100) is 25 away from both entries.
        assert_eq!(palette.nearest(Srgb::from_u8(105, 100, 100)), 1);
    }

    #[test]
    fn test_nearest_is_memoized_and_stable() {
        let palette = small_palette();
        let color = Srgb::from_u8(250, 10, 5);
        let first = palette.nearest(color);
        assert_eq!(first, 3);
        assert_eq!(palette.cached_lookups(), 1);
        for _ in 0..10 {
            assert_eq!(palette.nearest(color), first);
        }
        assert_eq!(palette.cached_lookups(), 1);
    }

    #[test]
    fn test_nearest_exact_canvas_colors() {
        let palette = Palette::canvas();
        for e in palette.entries().iter().skip(1) {
            assert_eq!(palette.nearest(e.rgb), e.id, "{} should map to itself", e.name);
        }
    }

    #[test]
    fn test_free_colors_excludes_premium() {
        let palette = small_palette();
        let free = palette.free_colors();
        assert!(free.contains(1));
        assert!(free.contains(2));
        assert!(!free.contains(3));
        assert!(palette.all_colors().contains(3));
    }
}
