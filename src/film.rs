use crate::Float;
use crate::spectrum::{spectrum_into_rgb8, Spectrum};

/// Running radiance sum of one pixel. Kept linear; exposure is only applied on read-out.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pixel {
    pub sum: Spectrum,
    pub samples: u32,
}

impl Pixel {
    pub fn add_sample(&mut self, radiance: Spectrum) {
        self.sum += radiance;
        self.samples += 1;
    }

    pub fn average(&self) -> Spectrum {
        if self.samples == 0 {
            Spectrum::default()
        } else {
            self.sum / self.samples as Float
        }
    }
}

/// Progressive accumulator plus the RGBA8 frame buffer it is tone mapped into.
pub struct Film {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
    frame_buffer: Vec<[u8; 4]>,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![Pixel::default(); n],
            frame_buffer: vec![[0, 0, 0, 255]; n],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&Pixel> {
        if !self.contains(x, y) {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize)
    }

    pub fn average(&self, x: u32, y: u32) -> Spectrum {
        self.pixel(x, y).map(Pixel::average).unwrap_or_default()
    }

    /// Accumulator rows `[y0, y1)` as one contiguous slice.
    pub fn rows_mut(&mut self, y0: u32, y1: u32) -> &mut [Pixel] {
        let w = self.width as usize;
        let y1 = y1.min(self.height);
        let y0 = y0.min(y1);
        &mut self.pixels[y0 as usize * w..y1 as usize * w]
    }

    /// Linear per-pixel averages scaled by `exposure`, row major.
    pub fn resolve(&self, exposure: Float) -> Vec<Spectrum> {
        self.pixels.iter().map(|p| p.average() * exposure).collect()
    }

    /// Refresh the frame buffer for rows `[y0, y1)`: exposure, clamp to `[0, 1]`, then gamma.
    pub fn tonemap_rows(&mut self, y0: u32, y1: u32, exposure: Float) {
        let w = self.width as usize;
        let y1 = y1.min(self.height) as usize;
        let y0 = (y0 as usize).min(y1);
        let range = y0 * w..y1 * w;
        for (out, pixel) in self.frame_buffer[range.clone()].iter_mut().zip(&self.pixels[range]) {
            let [r, g, b] = spectrum_into_rgb8(pixel.average() * exposure);
            *out = [r, g, b, 255];
        }
    }

    pub fn frame_buffer(&self) -> &[[u8; 4]] {
        &self.frame_buffer
    }

    /// Start progressive refinement over.
    pub fn clear(&mut self) {
        self.pixels.iter_mut().for_each(|p| *p = Pixel::default());
        self.frame_buffer.iter_mut().for_each(|p| *p = [0, 0, 0, 255]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let film = Film::new(4, 3);
        assert!(film.contains(3, 2));
        assert!(!film.contains(4, 0));
        assert!(!film.contains(0, 3));
        assert!(film.pixel(4, 0).is_none());
    }

    #[test]
    fn test_exposure_applied_on_readout() {
        let mut film = Film::new(2, 2);
        film.rows_mut(0, 1)[1].add_sample(Spectrum::uniform(0.25));
        film.rows_mut(0, 1)[1].add_sample(Spectrum::uniform(0.75));
        assert_eq!(film.average(1, 0), Spectrum::uniform(0.5));
        assert_eq!(film.resolve(2.0)[1], Spectrum::uniform(1.0));
        // accumulation itself is untouched by exposure
        assert_eq!(film.pixel(1, 0).unwrap().sum, Spectrum::uniform(1.0));

        film.tonemap_rows(0, 2, 2.0);
        assert_eq!(film.frame_buffer()[1], [255, 255, 255, 255]);
        assert_eq!(film.frame_buffer()[0], [0, 0, 0, 255]);

        film.clear();
        assert_eq!(film.pixel(1, 0).unwrap().samples, 0);
    }

    #[test]
    fn test_rows_out_of_range_are_empty() {
        let mut film = Film::new(2, 2);
        assert!(film.rows_mut(5, 9).is_empty());
        assert_eq!(film.rows_mut(1, 9).len(), 2);
        film.tonemap_rows(7, 9, 1.0);
    }
}
