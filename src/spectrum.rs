use crate::Float;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub};

#[inline]
pub fn zip<F: Fn(Float, Float) -> Float, const N: usize>(a: [Float; N], b: [Float; N], f: F) -> [Float; N] {
    std::array::from_fn(|i| f(a[i], b[i]))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoefficientSpectrum<const N: usize>([Float; N]);

/// Linear RGB radiance or reflectance.
pub type Spectrum = CoefficientSpectrum<3>;

impl<const N: usize> CoefficientSpectrum<N> {

    #[inline]
    pub fn new_with<F: FnMut(usize) -> Float>(init: F) -> Self {
        Self(std::array::from_fn(init))
    }

    #[inline]
    pub fn zip<F: Fn(Float, Float) -> Float>(&self, other: &Self, f: F) -> Self {
        Self(zip(self.0, other.0, f))
    }

    pub fn uniform(val: Float) -> Self {
        Self::new_with(|_| val)
    }

    pub fn map<F: Fn(Float) -> Float>(&self, f: F) -> Self {
        Self::new_with(|i| f(self[i]))
    }

    pub fn is_black(&self) -> bool {
        self.0.iter().all(|&x| x == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }

    pub fn max_component_value(&self) -> Float {
        self.0.iter().copied().fold(Float::NEG_INFINITY, Float::max)
    }

    pub fn lerp(t: Float, s1: Self, s2: Self) -> Self {
        (1.0 - t) * s1 + t * s2
    }

    pub fn clamp(self, low: Float, high: Float) -> Self {
        self.map(|x| x.clamp(low, high))
    }
}

impl CoefficientSpectrum<3> {
    pub const fn rgb(r: Float, g: Float, b: Float) -> Self {
        Self([r, g, b])
    }

    pub fn from_rgba(c: [Float; 4]) -> Self {
        Self([c[0], c[1], c[2]])
    }

    pub fn to_rgb(self) -> [Float; 3] {
        self.0
    }

    pub fn luminance(&self) -> Float {
        0.212671 * self[0] + 0.715160 * self[1] + 0.072169 * self[2]
    }
}

impl<const N: usize> Default for CoefficientSpectrum<N> {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

pub fn spectrum_from_rgb8(rgb8: [u8; 3]) -> Spectrum {
    CoefficientSpectrum([
        rgb8[0] as Float / 255.0,
        rgb8[1] as Float / 255.0,
        rgb8[2] as Float / 255.0,
    ])
}

/// Clamp to `[0, 1]`, gamma encode and quantize.
pub fn spectrum_into_rgb8(s: Spectrum) -> [u8; 3] {
    let encode = |c: Float| Float::round(c.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0) as u8;
    [encode(s[0]), encode(s[1]), encode(s[2])]
}

impl<const N: usize> Index<usize> for CoefficientSpectrum<N> {
    type Output = Float;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<const N: usize> IndexMut<usize> for CoefficientSpectrum<N> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const N: usize> Add for CoefficientSpectrum<N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip(&rhs, |a, b| a + b)
    }
}

impl<const N: usize> AddAssign for CoefficientSpectrum<N> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const N: usize> Sub for CoefficientSpectrum<N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.zip(&rhs, |a, b| a - b)
    }
}

impl<const N: usize> Mul for CoefficientSpectrum<N> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.zip(&rhs, |a, b| a * b)
    }
}

impl<const N: usize> MulAssign for CoefficientSpectrum<N> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<const N: usize> Mul<Float> for CoefficientSpectrum<N> {
    type Output = Self;

    fn mul(self, rhs: Float) -> Self {
        self.map(|a| a * rhs)
    }
}

impl<const N: usize> Mul<CoefficientSpectrum<N>> for Float {
    type Output = CoefficientSpectrum<N>;

    fn mul(self, rhs: CoefficientSpectrum<N>) -> CoefficientSpectrum<N> {
        rhs * self
    }
}

impl<const N: usize> MulAssign<Float> for CoefficientSpectrum<N> {
    fn mul_assign(&mut self, rhs: Float) {
        *self = *self * rhs;
    }
}

impl<const N: usize> Div<Float> for CoefficientSpectrum<N> {
    type Output = Self;

    fn div(self, rhs: Float) -> Self {
        self.map(|a| a / rhs)
    }
}

impl<const N: usize> DivAssign<Float> for CoefficientSpectrum<N> {
    fn div_assign(&mut self, rhs: Float) {
        *self = *self / rhs;
    }
}
