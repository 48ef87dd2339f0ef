//! Texture store: every texture lives in one shared byte buffer, addressed by a small
//! metadata record. Lookups use repeat wrapping and bilinear filtering.

use bytemuck::{Pod, Zeroable};

use crate::{Float, Point2f, SceneError};
use crate::spectrum::Spectrum;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct TextureMetadata {
    pub format: u32,
    pub width: u32,
    pub height: u32,
    pub data_offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum TextureFormat {
    Luminance8 = 0,
    Rgb8 = 1,
    Rgba8 = 2,
    Luminance32F = 3,
    Rgb32F = 4,
    Rgba32F = 5,
}

impl TextureFormat {
    pub fn channels(self) -> usize {
        match self {
            TextureFormat::Luminance8 | TextureFormat::Luminance32F => 1,
            TextureFormat::Rgb8 | TextureFormat::Rgb32F => 3,
            TextureFormat::Rgba8 | TextureFormat::Rgba32F => 4,
        }
    }

    pub fn bytes_per_channel(self) -> usize {
        match self {
            TextureFormat::Luminance8 | TextureFormat::Rgb8 | TextureFormat::Rgba8 => 1,
            _ => 4,
        }
    }

    pub fn bytes_per_texel(self) -> usize {
        self.channels() * self.bytes_per_channel()
    }
}

impl TryFrom<u32> for TextureFormat {
    type Error = SceneError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TextureFormat::Luminance8,
            1 => TextureFormat::Rgb8,
            2 => TextureFormat::Rgba8,
            3 => TextureFormat::Luminance32F,
            4 => TextureFormat::Rgb32F,
            5 => TextureFormat::Rgba32F,
            _ => return Err(SceneError::UnknownTextureFormat(value)),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct TextureStore {
    data: Vec<u8>,
    metadata: Vec<TextureMetadata>,
    // decoded once so lookups don't re-validate the format
    formats: Vec<TextureFormat>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from its packed buffers, validating every record.
    pub fn from_parts(data: Vec<u8>, metadata: Vec<TextureMetadata>) -> Result<Self, SceneError> {
        let formats = metadata.iter()
            .map(|meta| {
                let format = TextureFormat::try_from(meta.format)?;
                let expected = texture_size(format, meta.width, meta.height)?;
                let end = meta.data_offset as usize + expected;
                if end > data.len() {
                    return Err(SceneError::TextureDataSize { expected: end, actual: data.len() });
                }
                Ok(format)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { data, metadata, formats })
    }

    /// Append a texture and return its metadata index.
    pub fn add(&mut self, format: TextureFormat, width: u32, height: u32, bytes: &[u8]) -> Result<u32, SceneError> {
        let expected = texture_size(format, width, height)?;
        if bytes.len() != expected {
            return Err(SceneError::TextureDataSize { expected, actual: bytes.len() });
        }
        let data_offset = u32::try_from(self.data.len())
            .map_err(|_| SceneError::UnrepresentableIndex(self.data.len() as u64))?;
        let index = self.metadata.len() as u32;

        self.data.extend_from_slice(bytes);
        self.metadata.push(TextureMetadata { format: format as u32, width, height, data_offset });
        self.formats.push(format);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn metadata(&self) -> &[TextureMetadata] {
        &self.metadata
    }

    /// Bilinearly filtered lookup with repeat wrapping. An unknown index or a non-finite
    /// coordinate reads as black.
    pub fn sample(&self, index: u32, uv: Point2f) -> Spectrum {
        let (meta, format) = match (self.metadata.get(index as usize), self.formats.get(index as usize)) {
            (Some(m), Some(f)) => (m, *f),
            _ => return Spectrum::default(),
        };

        let s = uv.x * meta.width as Float - 0.5;
        let t = uv.y * meta.height as Float - 0.5;
        if !(s.is_finite() && t.is_finite()) {
            return Spectrum::default();
        }
        let s0 = s.floor();
        let t0 = t.floor();
        let ds = s - s0;
        let dt = t - t0;
        // wrap before stepping to the neighbour; huge coordinates saturate the cast
        let s0 = (s0 as i64).rem_euclid(meta.width as i64);
        let t0 = (t0 as i64).rem_euclid(meta.height as i64);

        let texel = |s, t| self.texel(meta, format, s, t);
        texel(s0, t0) * ((1.0 - ds) * (1.0 - dt))
            + texel(s0, t0 + 1) * ((1.0 - ds) * dt)
            + texel(s0 + 1, t0) * (ds * (1.0 - dt))
            + texel(s0 + 1, t0 + 1) * (ds * dt)
    }

    fn texel(&self, meta: &TextureMetadata, format: TextureFormat, s: i64, t: i64) -> Spectrum {
        let s = s.rem_euclid(meta.width as i64) as usize;
        let t = t.rem_euclid(meta.height as i64) as usize;
        let stride = format.bytes_per_texel();
        let start = meta.data_offset as usize + (t * meta.width as usize + s) * stride;
        let bytes = &self.data[start..start + stride];

        let channel = |c: usize| -> Float {
            match format.bytes_per_channel() {
                1 => bytes[c] as Float / 255.0,
                _ => {
                    let b = &bytes[4 * c..4 * c + 4];
                    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
                }
            }
        };

        match format.channels() {
            1 => Spectrum::uniform(channel(0)),
            _ => Spectrum::rgb(channel(0), channel(1), channel(2)),
        }
    }
}

fn texture_size(format: TextureFormat, width: u32, height: u32) -> Result<usize, SceneError> {
    if width == 0 || height == 0 {
        return Err(SceneError::InvalidGeometry("textures must be at least 1x1"));
    }
    Ok(width as usize * height as usize * format.bytes_per_texel())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_add_validates_size() {
        let mut store = TextureStore::new();
        let err = store.add(TextureFormat::Rgb8, 2, 2, &[0; 11]).unwrap_err();
        assert_eq!(err, SceneError::TextureDataSize { expected: 12, actual: 11 });

        assert_eq!(store.add(TextureFormat::Luminance8, 1, 1, &[7]), Ok(0));
        assert_eq!(store.add(TextureFormat::Rgba8, 1, 1, &[1, 2, 3, 4]), Ok(1));
        assert_eq!(store.metadata()[1].data_offset, 1);
    }

    #[test]
    fn test_unknown_format() {
        let meta = TextureMetadata { format: 9, width: 1, height: 1, data_offset: 0 };
        assert!(matches!(TextureStore::from_parts(vec![0; 4], vec![meta]), Err(SceneError::UnknownTextureFormat(9))));
    }

    #[test]
    fn test_constant_texture() {
        let mut store = TextureStore::new();
        let idx = store.add(TextureFormat::Rgb8, 2, 2, &[255u8, 0, 51].repeat(4)).unwrap();
        for uv in [point2f!(0, 0), point2f!(0.3, 0.9), point2f!(-4.2, 17.5)] {
            let c = store.sample(idx, uv);
            assert_abs_diff_eq!(c[0], 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(c[1], 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(c[2], 0.2, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_luminance_float_replicates() {
        let mut store = TextureStore::new();
        let bytes: Vec<u8> = 0.25f32.to_le_bytes().to_vec();
        let idx = store.add(TextureFormat::Luminance32F, 1, 1, &bytes).unwrap();
        assert_eq!(store.sample(idx, point2f!(0.5, 0.5)), Spectrum::uniform(0.25));
    }

    #[test]
    fn test_bilinear_between_texels() {
        let mut store = TextureStore::new();
        // two texels wide, black then white
        let idx = store.add(TextureFormat::Luminance8, 2, 1, &[0, 255]).unwrap();
        // texel centers sit at u = 0.25 and u = 0.75
        assert_abs_diff_eq!(store.sample(idx, point2f!(0.25, 0.5))[0], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(store.sample(idx, point2f!(0.75, 0.5))[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(store.sample(idx, point2f!(0.5, 0.5))[0], 0.5, epsilon = 1e-5);
        // repeat wrapping blends the last texel with the first
        assert_abs_diff_eq!(store.sample(idx, point2f!(1.0, 0.5))[0], 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_extreme_coordinates() {
        let mut store = TextureStore::new();
        let idx = store.add(TextureFormat::Luminance8, 2, 2, &[10, 20, 30, 40]).unwrap();
        for uv in [point2f!(1.0e20, 0.5), point2f!(0.5, -1.0e20), point2f!(-3.0e15, 7.0e18)] {
            let c = store.sample(idx, uv);
            assert!(c.is_finite());
            assert!(c[0] >= 10.0 / 255.0 - 1e-5 && c[0] <= 40.0 / 255.0 + 1e-5, "{:?} -> {:?}", uv, c);
        }
        for uv in [point2f!(Float::INFINITY, 0.5), point2f!(0.5, Float::NEG_INFINITY), point2f!(Float::NAN, 0.5), point2f!(Float::MAX, 0.5)] {
            assert!(store.sample(idx, uv).is_black());
        }
    }

    #[test]
    fn test_missing_texture_is_black() {
        assert!(TextureStore::new().sample(3, point2f!(0.5, 0.5)).is_black());
    }
}
