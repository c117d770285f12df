//! Dual numbers with a fixed number of tangent directions.

use crate::scalar::Scalar;
use std::array;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A value together with its derivatives along `N` directions.
///
/// Arithmetic follows the product rule on every tangent. With `N` seeded
/// inputs, a single evaluation yields a full gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<T, const N: usize> {
    primal: T,
    tangent: [T; N],
}

impl<T: Scalar, const N: usize> Dual<T, N> {
    /// Dual number with explicit tangents.
    pub fn new(primal: T, tangent: [T; N]) -> Self {
        Self { primal, tangent }
    }

    /// A value that does not vary along any direction.
    pub fn constant(primal: T) -> Self {
        Self {
            primal,
            tangent: [T::zero(); N],
        }
    }

    /// An input varying along `direction` only.
    ///
    /// # Panics
    ///
    /// Panics if `direction >= N`.
    pub fn variable(primal: T, direction: usize) -> Self {
        let mut tangent = [T::zero(); N];
        tangent[direction] = T::one();
        Self { primal, tangent }
    }

    /// The value.
    #[inline]
    pub fn primal(&self) -> T {
        self.primal
    }

    /// Derivative along direction `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= N`.
    #[inline]
    pub fn tangent(&self, i: usize) -> T {
        self.tangent[i]
    }

    /// All tangents.
    #[inline]
    pub fn tangents(&self) -> &[T; N] {
        &self.tangent
    }
}

impl<T: Scalar, const N: usize> Default for Dual<T, N> {
    fn default() -> Self {
        Self::constant(T::zero())
    }
}

impl<T: Scalar, const N: usize> From<T> for Dual<T, N> {
    fn from(primal: T) -> Self {
        Self::constant(primal)
    }
}

impl<T: Scalar, const N: usize> Add for Dual<T, N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            primal: self.primal + rhs.primal,
            tangent: array::from_fn(|i| self.tangent[i] + rhs.tangent[i]),
        }
    }
}

impl<T: Scalar, const N: usize> Sub for Dual<T, N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            primal: self.primal - rhs.primal,
            tangent: array::from_fn(|i| self.tangent[i] - rhs.tangent[i]),
        }
    }
}

impl<T: Scalar, const N: usize> Mul for Dual<T, N> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            primal: self.primal * rhs.primal,
            tangent: array::from_fn(|i| {
                self.tangent[i] * rhs.primal + self.primal * rhs.tangent[i]
            }),
        }
    }
}

/// Scaling by a constant.
impl<T: Scalar, const N: usize> Mul<T> for Dual<T, N> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        Self {
            primal: self.primal * rhs,
            tangent: self.tangent.map(|d| d * rhs),
        }
    }
}

impl<T: Scalar, const N: usize> Neg for Dual<T, N> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            primal: -self.primal,
            tangent: self.tangent.map(|d| -d),
        }
    }
}

impl<T: Scalar, const N: usize> AddAssign for Dual<T, N> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<T: Scalar, const N: usize> SubAssign for Dual<T, N> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

/// Value and derivative of `f` at `x`.
///
/// ```
/// use ndtape::forward::diff;
///
/// let (y, dy) = diff(|x| x * x * x, 3.0);
/// assert_eq!((y, dy), (27.0, 27.0));
/// ```
pub fn diff<T, F>(f: F, x: T) -> (T, T)
where
    T: Scalar,
    F: FnOnce(Dual<T, 1>) -> Dual<T, 1>,
{
    let y = f(Dual::variable(x, 0));
    (y.primal, y.tangent[0])
}

/// Value and gradient of `f` at `x`, in one forward evaluation.
///
/// Input `i` is seeded along direction `i`.
///
/// ```
/// use ndtape::forward::gradient;
///
/// // f(x, y) = x * y + y
/// let (f, g) = gradient(|[x, y]| x * y + y, [2.0, 5.0]);
/// assert_eq!(f, 15.0);
/// assert_eq!(g, [5.0, 3.0]);
/// ```
pub fn gradient<T, F, const N: usize>(f: F, x: [T; N]) -> (T, [T; N])
where
    T: Scalar,
    F: FnOnce([Dual<T, N>; N]) -> Dual<T, N>,
{
    let inputs = array::from_fn(|i| Dual::variable(x[i], i));
    let y = f(inputs);
    (y.primal, y.tangent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c64;

    #[test]
    fn test_repeated_squaring() {
        let (y, dy) = diff(
            |x| {
                let y = x * x;
                let z = y * y;
                let w = z * z;
                w * w
            },
            2.0,
        );
        assert_eq!(y, 65536.0);
        assert_eq!(dy, 524288.0);
    }

    #[test]
    fn test_constants_do_not_vary() {
        let c: Dual<f64, 2> = 4.0.into();
        assert_eq!(c.tangents(), &[0.0, 0.0]);

        let (y, dy) = diff(|x| x * Dual::constant(3.0) - Dual::constant(1.0), 2.0);
        assert_eq!((y, dy), (5.0, 3.0));
    }

    #[test]
    fn test_gradient_of_polynomial() {
        // f(x, y, z) = x^2 y - 3 z
        let (f, g) = gradient(|[x, y, z]| x * x * y - z * 3.0, [1.5, -2.0, 4.0]);
        assert_eq!(f, 1.5 * 1.5 * -2.0 - 12.0);
        assert_eq!(g, [2.0 * 1.5 * -2.0, 1.5 * 1.5, -3.0]);
    }

    #[test]
    fn test_assign_ops() {
        let mut acc = Dual::<f64, 2>::default();
        acc += Dual::variable(2.0, 0);
        acc += Dual::variable(3.0, 1);
        acc -= Dual::variable(1.0, 1);
        assert_eq!(acc.primal(), 4.0);
        assert_eq!(acc.tangents(), &[1.0, 0.0]);
        assert_eq!((-acc).tangent(0), -1.0);
    }

    #[test]
    fn test_complex_is_holomorphic() {
        // d/dz z^2 = 2z
        let z = c64::new(1.0, 2.0);
        let (y, dy) = diff(|z| z * z, z);
        assert_eq!(y, z * z);
        assert_eq!(dy, z * c64::new(2.0, 0.0));
    }

    #[test]
    #[should_panic]
    fn test_direction_out_of_range() {
        let _ = Dual::<f64, 2>::variable(1.0, 2);
    }
}
