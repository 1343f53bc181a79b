//! RGBA8 raster with PNG decode/encode and the few pixel operations the
//! engine needs: cropping, integer upscaling and overlaying.

use std::io::Cursor;

use canvas_palette::Srgb;

use crate::error::RasterError;

/// A straight-alpha RGBA8 image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// One RGBA8 pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub fn rgb(self) -> Srgb {
        Srgb::from_u8(self.r, self.g, self.b)
    }

    /// Packed `0xAARRGGBB`, used as a per-pass memoization key.
    #[inline]
    pub fn key(self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }
}

impl RgbaImage {
    /// A fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RasterError::BufferSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decode any 8-bit or 16-bit PNG into RGBA8.
    pub fn decode_png(bytes: &[u8]) -> Result<Self, RasterError> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder
            .read_info()
            .map_err(|e| RasterError::Decode(e.to_string()))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| RasterError::Decode(e.to_string()))?;
        buf.truncate(info.buffer_size());

        let pixels = match info.color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&v| [v, v, v, 255]).collect(),
            png::ColorType::Indexed => {
                return Err(RasterError::Unsupported(
                    "indexed output after expansion".to_string(),
                ))
            }
        };

        Self::from_raw(info.width, info.height, pixels)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RasterError> {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(png::Compression::Fast);
            let mut writer = encoder
                .write_header()
                .map_err(|e| RasterError::Encode(e.to_string()))?;
            writer
                .write_image_data(&self.pixels)
                .map_err(|e| RasterError::Encode(e.to_string()))?;
        }
        Ok(buf)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Pixel at `(x, y)`; out-of-bounds reads are transparent.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgba {
        if x >= self.width || y >= self.height {
            return Rgba::TRANSPARENT;
        }
        let i = self.offset(x, y);
        let p = &self.pixels[i..i + 4];
        Rgba::new(p[0], p[1], p[2], p[3])
    }

    /// Out-of-bounds writes are ignored.
    #[inline]
    pub fn put(&mut self, x: u32, y: u32, px: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.offset(x, y);
        self.pixels[i..i + 4].copy_from_slice(&[px.r, px.g, px.b, px.a]);
    }

    /// Copy of the `width`×`height` region at `(x, y)`; the part outside
    /// this image reads as transparent.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let mut out = Self::new(width, height);
        for dy in 0..height {
            for dx in 0..width {
                out.put(dx, dy, self.get(x + dx, y + dy));
            }
        }
        out
    }

    /// Nearest-neighbour upscale: every pixel becomes a `factor`×`factor` block.
    pub fn upscale(&self, factor: u32) -> Self {
        if factor <= 1 {
            return self.clone();
        }
        let mut out = Self::new(self.width * factor, self.height * factor);
        for y in 0..out.height {
            for x in 0..out.width {
                out.put(x, y, self.get(x / factor, y / factor));
            }
        }
        out
    }

    /// Inverse of [`upscale`](Self::upscale): keeps the centre pixel of every
    /// `factor`×`factor` block.
    pub fn downscale(&self, factor: u32) -> Self {
        if factor <= 1 {
            return self.clone();
        }
        let centre = factor / 2;
        let mut out = Self::new(self.width / factor, self.height / factor);
        for y in 0..out.height {
            for x in 0..out.width {
                out.put(x, y, self.get(x * factor + centre, y * factor + centre));
            }
        }
        out
    }

    /// Draw `src` with its top-left corner at `(x, y)`.
    ///
    /// Any source pixel with non-zero alpha replaces the destination pixel,
    /// so later layers win where they are painted and leave gaps untouched.
    pub fn overlay(&mut self, src: &RgbaImage, x: u32, y: u32) {
        for sy in 0..src.height {
            for sx in 0..src.width {
                let px = src.get(sx, sy);
                if px.a > 0 {
                    self.put(x + sx, y + sy, px);
                }
            }
        }
    }

    /// Number of pixels with alpha at or above `threshold`.
    pub fn count_opaque(&self, threshold: u8) -> usize {
        self.pixels
            .chunks_exact(4)
            .filter(|p| p[3] >= threshold)
            .count()
    }
}
