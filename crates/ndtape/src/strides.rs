//! Stride computation utilities.
//!
//! Uses row-major (C) order: the last axis varies fastest.
//!
//! Strides saturate at `usize::MAX` instead of overflowing. A shape whose
//! element count overflows is rejected by [`element_count`] before any
//! storage is built for it, so saturated strides are never used to index.

use crate::error::{Result, TapeError};

/// Compute row-major strides for a fixed-rank shape.
///
/// For shape [d0, d1, d2], returns strides [d1*d2, d2, 1].
///
/// # Examples
///
/// ```
/// use ndtape::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), [20, 5, 1]);
/// assert_eq!(compute_strides(&[2, 3]), [3, 1]);
/// assert_eq!(compute_strides(&[5]), [1]);
/// assert_eq!(compute_strides::<0>(&[]), [0usize; 0]);
/// ```
pub const fn compute_strides<const R: usize>(extents: &[usize; R]) -> [usize; R] {
    let mut strides = [0; R];
    let mut stride: usize = 1;
    let mut axis = R;
    while axis > 0 {
        axis -= 1;
        strides[axis] = stride;
        stride = stride.saturating_mul(extents[axis]);
    }
    strides
}

/// Compute row-major strides for a shape of any rank.
pub fn compute_strides_dyn(extents: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; extents.len()];
    let mut stride: usize = 1;
    for (s, &dim) in strides.iter_mut().zip(extents).rev() {
        *s = stride;
        stride = stride.saturating_mul(dim);
    }
    strides
}

/// Product of `extents`, or `None` if it overflows `usize`.
///
/// A zero extent makes the product zero whatever the other extents are.
///
/// # Examples
///
/// ```
/// use ndtape::strides::checked_len;
///
/// assert_eq!(checked_len(&[2, 3, 4]), Some(24));
/// assert_eq!(checked_len(&[]), Some(1));
/// assert_eq!(checked_len(&[1 << 32, 1 << 32]), None);
/// ```
pub const fn checked_len(extents: &[usize]) -> Option<usize> {
    let mut axis = 0;
    while axis < extents.len() {
        if extents[axis] == 0 {
            return Some(0);
        }
        axis += 1;
    }
    let mut len: usize = 1;
    axis = 0;
    while axis < extents.len() {
        len = match len.checked_mul(extents[axis]) {
            Some(len) => len,
            None => return None,
        };
        axis += 1;
    }
    Some(len)
}

/// Number of `T` elements a buffer for `extents` must hold.
///
/// # Errors
///
/// Returns `TapeError::CapacityOverflow` if the product of the extents does
/// not fit in `usize`.
pub(crate) fn element_count<T>(extents: &[usize]) -> Result<usize> {
    checked_len(extents).ok_or(TapeError::CapacityOverflow {
        len: extents.iter().fold(1, |acc: usize, &n| acc.saturating_mul(n)),
        elem_size: size_of::<T>(),
    })
}

/// Convert cartesian indices to a linear index.
///
/// # Arguments
///
/// * `indices` - Cartesian indices for each dimension
/// * `strides` - Strides for each dimension
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert a linear index to cartesian indices in row-major order.
///
/// # Arguments
///
/// * `linear` - Linear index
/// * `extents` - Extents of the tensor
pub fn linear_to_cartesian<const R: usize>(mut linear: usize, extents: &[usize; R]) -> [usize; R] {
    let mut indices = [0; R];
    for axis in (0..R).rev() {
        let dim = extents[axis];
        indices[axis] = linear % dim;
        linear /= dim;
    }
    indices
}

/// Advance a row-major multi-index by one position.
///
/// Returns `false` once the index wraps past the last element.
pub(crate) fn increment_index(index: &mut [usize], extents: &[usize]) -> bool {
    for axis in (0..index.len()).rev() {
        index[axis] += 1;
        if index[axis] < extents[axis] {
            return true;
        }
        index[axis] = 0;
    }
    false
}
