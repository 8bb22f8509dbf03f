//! Five-dimensional size and index vectors.
//!
//! Every vector in this crate is an [ImageSize] with named `c, t, z, y, x` fields.
//! Flat conversions use the canonical `[c, t, z, y, x]` order;
//! the KLB-native `[t, c, z, y, x]` order only appears at the reader boundary.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A single axis of a 5D image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    C,
    T,
    Z,
    Y,
    X,
}

impl Axis {
    /// All axes in canonical order, outermost first.
    pub const CANONICAL: [Axis; 5] = [Axis::C, Axis::T, Axis::Z, Axis::Y, Axis::X];

    pub fn name(self) -> char {
        match self {
            Axis::C => 'c',
            Axis::T => 't',
            Axis::Z => 'z',
            Axis::Y => 'y',
            Axis::X => 'x',
        }
    }
}

impl TryFrom<char> for Axis {
    type Error = Error;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase() {
            'c' => Ok(Axis::C),
            't' => Ok(Axis::T),
            'z' => Ok(Axis::Z),
            'y' => Ok(Axis::Y),
            'x' => Ok(Axis::X),
            a => Err(Error::invalid_argument(format!("unknown axis '{a}'"))),
        }
    }
}

/// Extent (or index) along each of the five axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageSize {
    pub c: u64,
    pub t: u64,
    pub z: u64,
    pub y: u64,
    pub x: u64,
}

/// Position of a block in a [BlockGrid](crate::grid::BlockGrid).
pub type BlockIndex = ImageSize;

impl ImageSize {
    pub const fn new(c: u64, t: u64, z: u64, y: u64, x: u64) -> Self {
        Self { c, t, z, y, x }
    }

    /// The same value along every axis.
    pub const fn splat(n: u64) -> Self {
        Self::new(n, n, n, n, n)
    }

    pub fn from_array(values: [u64; 5]) -> Self {
        let [c, t, z, y, x] = values;
        Self { c, t, z, y, x }
    }

    /// Canonical `[c, t, z, y, x]` order.
    pub fn to_array(self) -> [u64; 5] {
        [self.c, self.t, self.z, self.y, self.x]
    }

    /// Build from the KLB header order, `[t, c, z, y, x]`.
    pub fn from_tczyx(values: [u64; 5]) -> Self {
        let [t, c, z, y, x] = values;
        Self { c, t, z, y, x }
    }

    pub fn to_tczyx(self) -> [u64; 5] {
        [self.t, self.c, self.z, self.y, self.x]
    }

    pub fn get(&self, axis: Axis) -> u64 {
        match axis {
            Axis::C => self.c,
            Axis::T => self.t,
            Axis::Z => self.z,
            Axis::Y => self.y,
            Axis::X => self.x,
        }
    }

    pub fn set(&mut self, axis: Axis, value: u64) {
        match axis {
            Axis::C => self.c = value,
            Axis::T => self.t = value,
            Axis::Z => self.z = value,
            Axis::Y => self.y = value,
            Axis::X => self.x = value,
        }
    }

    fn zip_with(self, other: Self, f: impl Fn(u64, u64) -> u64) -> Self {
        Self {
            c: f(self.c, other.c),
            t: f(self.t, other.t),
            z: f(self.z, other.z),
            y: f(self.y, other.y),
            x: f(self.x, other.x),
        }
    }

    fn nonzero_divisor(&self, op: &str) -> crate::Result<()> {
        match Axis::CANONICAL.into_iter().find(|a| self.get(*a) == 0) {
            Some(a) => Err(Error::invalid_argument(format!(
                "{op}: divisor is zero along axis {}",
                a.name()
            ))),
            None => Ok(()),
        }
    }

    /// Element-wise remainder.
    pub fn checked_rem(self, divisor: Self) -> crate::Result<Self> {
        divisor.nonzero_divisor("remainder")?;
        Ok(self.zip_with(divisor, |a, b| a % b))
    }

    /// Element-wise division, rounding up.
    pub fn ceil_div(self, divisor: Self) -> crate::Result<Self> {
        divisor.nonzero_divisor("ceiling division")?;
        Ok(self.zip_with(divisor, u64::div_ceil))
    }

    /// Element-wise minimum.
    pub fn min(self, other: Self) -> Self {
        self.zip_with(other, std::cmp::min)
    }

    /// Number of elements spanned by this extent.
    pub fn volume(&self) -> u64 {
        self.to_array().iter().product()
    }

    /// True if every component is at least 1.
    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|&n| n >= 1)
    }

    /// True if `other` fits inside this extent on every axis.
    pub fn contains(&self, other: &Self) -> bool {
        Axis::CANONICAL
            .into_iter()
            .all(|a| other.get(a) <= self.get(a))
    }

    /// Sum of the element-wise product; the flat offset of an index given per-axis strides.
    pub(crate) fn dot(&self, other: &Self) -> u64 {
        Axis::CANONICAL
            .into_iter()
            .map(|a| self.get(a) * other.get(a))
            .sum()
    }
}

impl Add for ImageSize {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Mul for ImageSize {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.zip_with(rhs, |a, b| a * b)
    }
}

/// Panics on underflow, like integer subtraction.
impl Sub for ImageSize {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl From<[u64; 5]> for ImageSize {
    fn from(value: [u64; 5]) -> Self {
        Self::from_array(value)
    }
}

impl From<ImageSize> for [u64; 5] {
    fn from(value: ImageSize) -> Self {
        value.to_array()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(c={}, t={}, z={}, y={}, x={})",
            self.c, self.t, self.z, self.y, self.x
        )
    }
}

/// Memory layout of a buffer: axes listed fastest-varying first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DimensionSequence([Axis; 5]);

impl DimensionSequence {
    /// The layout expected by Imaris: x fastest, t slowest.
    pub const XYZCT: Self = Self([Axis::X, Axis::Y, Axis::Z, Axis::C, Axis::T]);

    /// Row-major over the canonical axis order: x fastest, c slowest.
    pub const XYZTC: Self = Self([Axis::X, Axis::Y, Axis::Z, Axis::T, Axis::C]);

    pub fn new(axes: [Axis; 5]) -> crate::Result<Self> {
        for a in Axis::CANONICAL {
            if !axes.contains(&a) {
                return Err(Error::invalid_argument(format!(
                    "dimension sequence {axes:?} is missing axis {}",
                    a.name()
                )));
            }
        }
        Ok(Self(axes))
    }

    pub fn axes(&self) -> [Axis; 5] {
        self.0
    }

    /// Per-axis element strides for a buffer of the given shape.
    pub fn strides(&self, shape: &ImageSize) -> ImageSize {
        let mut strides = ImageSize::default();
        let mut acc = 1;
        for a in self.0 {
            strides.set(a, acc);
            acc *= shape.get(a);
        }
        strides
    }
}

impl Default for DimensionSequence {
    fn default() -> Self {
        Self::XYZCT
    }
}

impl fmt::Display for DimensionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in self.0 {
            write!(f, "{}", a.name())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DimensionSequence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let axes: Vec<Axis> = s
            .chars()
            .filter(|c| !matches!(c, ',' | ' '))
            .map(Axis::try_from)
            .collect::<crate::Result<_>>()?;
        let axes: [Axis; 5] = axes.try_into().map_err(|v: Vec<Axis>| {
            Error::invalid_argument(format!("expected 5 axes, got {}", v.len()))
        })?;
        Self::new(axes)
    }
}

impl TryFrom<String> for DimensionSequence {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DimensionSequence> for String {
    fn from(value: DimensionSequence) -> Self {
        value.to_string()
    }
}
