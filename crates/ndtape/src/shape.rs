//! Fixed-rank shape descriptors.
//!
//! The rank `R` is part of the type; extents are values. Axes whose extent is
//! known when the program is written can be fixed in a `const` shape and
//! joined with extents only known at construction time:
//!
//! ```text
//! Shape<R> = concat(Shape<P> /* const prefix */, [usize; S] /* runtime suffix */)
//!            where P + S == R (checked at compile time)
//! ```

use crate::error::Result;
use crate::strides::{
    cartesian_to_linear, checked_len, compute_strides, element_count, increment_index,
    linear_to_cartesian,
};

/// Row-major shape of compile-time rank `R`.
///
/// `Shape<0>` is the scalar shape: no indices and exactly one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape<const R: usize> {
    extents: [usize; R],
    strides: [usize; R],
}

impl<const R: usize> Shape<R> {
    /// Create a shape from its extents.
    ///
    /// Usable in `const` context, so fully static shapes cost nothing at runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtape::Shape;
    ///
    /// const MATRIX: Shape<2> = Shape::new([2, 3]);
    /// assert_eq!(MATRIX.len(), 6);
    /// assert_eq!(MATRIX.strides(), &[3, 1]);
    /// ```
    pub const fn new(extents: [usize; R]) -> Self {
        let strides = compute_strides(&extents);
        Self { extents, strides }
    }

    /// Create a shape whose element count is known to fit in `usize`.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::CapacityOverflow` if the product of the extents
    /// overflows.
    pub fn try_new(extents: [usize; R]) -> Result<Self> {
        element_count::<u8>(&extents)?;
        Ok(Self::new(extents))
    }

    /// Join a compile-time prefix with a runtime suffix.
    ///
    /// Fails to compile unless `P + S == R`.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::CapacityOverflow` if the joined element count
    /// overflows.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtape::Shape;
    ///
    /// const BATCH: Shape<1> = Shape::new([4]);
    /// let features = 7;
    /// let shape: Shape<3> = Shape::concat(BATCH, [features, 2])?;
    /// assert_eq!(shape.extents(), &[4, 7, 2]);
    /// # Ok::<(), ndtape::TapeError>(())
    /// ```
    pub fn concat<const P: usize, const S: usize>(
        prefix: Shape<P>,
        suffix: [usize; S],
    ) -> Result<Self> {
        const { assert!(P + S == R, "prefix and suffix ranks must sum to the shape rank") };
        let mut extents = [0; R];
        extents[..P].copy_from_slice(&prefix.extents);
        extents[P..].copy_from_slice(&suffix);
        Self::try_new(extents)
    }

    /// Number of axes.
    #[inline]
    pub const fn rank(&self) -> usize {
        R
    }

    /// Per-axis extents.
    #[inline]
    pub fn extents(&self) -> &[usize; R] {
        &self.extents
    }

    /// Row-major strides.
    #[inline]
    pub fn strides(&self) -> &[usize; R] {
        &self.strides
    }

    /// Total number of elements (1 for the scalar shape).
    ///
    /// Saturates at `usize::MAX` when the product overflows; see
    /// [`checked_len`](Self::checked_len).
    pub const fn len(&self) -> usize {
        let mut len: usize = 1;
        let mut axis = 0;
        while axis < R {
            len = len.saturating_mul(self.extents[axis]);
            axis += 1;
        }
        len
    }

    /// Total number of elements, or `None` if it overflows `usize`.
    pub const fn checked_len(&self) -> Option<usize> {
        checked_len(&self.extents)
    }

    /// Whether some axis has extent zero.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `index` addresses an element of this shape.
    #[inline]
    pub fn contains(&self, index: &[usize; R]) -> bool {
        index.iter().zip(&self.extents).all(|(&i, &n)| i < n)
    }

    /// Linear offset of a multi-index.
    ///
    /// Out-of-range indices trip a debug assertion; release builds do not check.
    #[inline]
    pub fn linear(&self, index: &[usize; R]) -> usize {
        debug_assert!(
            self.contains(index),
            "index {index:?} out of bounds for extents {:?}",
            self.extents
        );
        cartesian_to_linear(index, &self.strides)
    }

    /// Multi-index of a linear offset.
    #[inline]
    pub fn cartesian(&self, linear: usize) -> [usize; R] {
        debug_assert!(linear < self.len(), "linear index {linear} out of bounds");
        linear_to_cartesian(linear, &self.extents)
    }

    /// Iterate every multi-index in row-major order.
    pub fn indices(&self) -> Indices<R> {
        Indices {
            extents: self.extents,
            next: (!self.is_empty()).then_some([0; R]),
        }
    }
}

impl Shape<0> {
    /// The scalar shape.
    pub const fn scalar() -> Self {
        Self::new([])
    }
}

impl<const R: usize> From<[usize; R]> for Shape<R> {
    fn from(extents: [usize; R]) -> Self {
        Self::new(extents)
    }
}

/// Row-major iterator over the multi-indices of a [`Shape`].
#[derive(Debug, Clone)]
pub struct Indices<const R: usize> {
    extents: [usize; R],
    next: Option<[usize; R]>,
}

impl<const R: usize> Iterator for Indices<R> {
    type Item = [usize; R];

    fn next(&mut self) -> Option<[usize; R]> {
        let current = self.next?;
        let mut advanced = current;
        self.next = increment_index(&mut advanced, &self.extents).then_some(advanced);
        Some(current)
    }
}
