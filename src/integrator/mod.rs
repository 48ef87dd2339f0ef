//! Frame dispatch. A frame is split into horizontal bands of `block_height` rows; each call
//! to [`Integrator::render_frame`] renders one band in parallel, one rayon task per row.

use rayon::prelude::*;
use tracing::{info_span, warn};

use crate::{Float, Point2f};
use crate::film::{Film, Pixel};
use crate::sampler::{RandomSampler, Sampler};
use crate::scene::Scene;
use crate::spectrum::Spectrum;

pub mod path;

pub use path::*;

/// Knobs for a render session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    /// Number of scattering events after which a path is cut off.
    pub max_depth: u32,
    /// Russian roulette kicks in once the largest throughput component drops below this.
    pub rr_threshold: Float,
    /// Bounces before Russian roulette is considered.
    pub rr_min_bounces: u32,
    pub block_height: u32,
    pub seed: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: 5,
            rr_threshold: 1.0,
            rr_min_bounces: 3,
            block_height: 16,
            seed: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub rows: u32,
    pub samples: u64,
    /// Samples whose radiance was NaN or infinite and got replaced by zero.
    pub discarded: u64,
}

pub struct Integrator {
    options: RenderOptions,
    path: PathIntegrator,
}

impl Integrator {
    pub fn new(options: RenderOptions) -> Self {
        let path = PathIntegrator::new(options.max_depth, options.rr_threshold, options.rr_min_bounces);
        Self { options, path }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Number of bands needed to cover an image `height` rows tall.
    pub fn block_count(&self, height: u32) -> u32 {
        height.div_ceil(self.options.block_height.max(1))
    }

    /// One radiance estimate for pixel `(x, y)`. Pixels outside the frame are rejected
    /// before any work is done.
    pub fn radiance_sample(&self, scene: &Scene, width: u32, height: u32, x: u32, y: u32, sample_index: u64) -> Option<Spectrum> {
        if x >= width || y >= height {
            return None;
        }
        let pixel_index = y as u64 * width as u64 + x as u64;
        let mut sampler = RandomSampler::for_sample(self.options.seed, pixel_index, sample_index);

        let jitter = sampler.get_2d();
        let p_film = Point2f::new(x as Float + jitter.x, y as Float + jitter.y);
        let ray = scene.camera().generate_ray(p_film, width, height);
        Some(self.path.incident_radiance(ray, scene, &mut sampler))
    }

    /// Add `samples_per_pixel` samples to every pixel of band `block_y`, then refresh the
    /// band in the frame buffer with `exposure`. Bands past the bottom of the image are
    /// ignored.
    pub fn render_frame(&self, scene: &Scene, film: &mut Film, block_y: u32, samples_per_pixel: u32, exposure: Float) -> FrameStats {
        let (width, height) = (film.width(), film.height());
        let bh = self.options.block_height.max(1);
        let y0 = match block_y.checked_mul(bh) {
            Some(y0) if y0 < height && width > 0 => y0,
            _ => return FrameStats::default(),
        };
        let y1 = y0.saturating_add(bh).min(height);

        let _span = info_span!("render_frame", block_y, y0, y1, spp = samples_per_pixel).entered();

        let discarded: u64 = film.rows_mut(y0, y1)
            .par_chunks_mut(width as usize)
            .enumerate()
            .map(|(dy, row)| {
                let y = y0 + dy as u32;
                row.iter_mut()
                    .enumerate()
                    .map(|(x, pixel)| self.render_pixel(scene, pixel, width, height, x as u32, y, samples_per_pixel))
                    .sum::<u64>()
            })
            .sum();

        if discarded > 0 {
            warn!(discarded, block_y, "replaced non-finite radiance samples with zero");
        }

        film.tonemap_rows(y0, y1, exposure);

        FrameStats {
            rows: y1 - y0,
            samples: (y1 - y0) as u64 * width as u64 * samples_per_pixel as u64,
            discarded,
        }
    }

    /// Render every band of the frame once.
    pub fn render(&self, scene: &Scene, film: &mut Film, samples_per_pixel: u32, exposure: Float) -> FrameStats {
        (0..self.block_count(film.height())).fold(FrameStats::default(), |acc, block_y| {
            let s = self.render_frame(scene, film, block_y, samples_per_pixel, exposure);
            FrameStats {
                rows: acc.rows + s.rows,
                samples: acc.samples + s.samples,
                discarded: acc.discarded + s.discarded,
            }
        })
    }

    /// Returns the number of discarded samples.
    fn render_pixel(&self, scene: &Scene, pixel: &mut Pixel, width: u32, height: u32, x: u32, y: u32, spp: u32) -> u64 {
        let mut discarded = 0;
        let mut sum = Spectrum::default();
        for s in 0..spp {
            let sample_index = pixel.samples as u64 + s as u64;
            let l = match self.radiance_sample(scene, width, height, x, y, sample_index) {
                Some(l) => l,
                None => return 0,
            };
            if l.is_finite() {
                sum += l;
            } else {
                discarded += 1;
            }
        }
        pixel.sum += sum;
        pixel.samples += spp;
        discarded
    }
}
