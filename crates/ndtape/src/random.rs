//! Random store construction.
//!
//! Every scalar is a fixed number of real components (one for `f64`, two for
//! `c64`). Sampling draws each component independently from a real
//! distribution, so any `rand_distr` distribution over `f64` can fill a store
//! of either element type.

use rand::Rng;
use rand::distr::{Distribution, StandardUniform};
use rand_distr::StandardNormal;

use crate::error::Result;
use crate::scalar::{Scalar, c64};
use crate::shape::Shape;
use crate::storage::Store;

/// Scalars that can be drawn component by component.
pub trait RandomScalar: Scalar {
    /// Number of real components.
    const COMPONENTS: usize;

    /// Draw one value, sampling every real component from `dist`.
    fn sample_components<D, G>(dist: &D, rng: &mut G) -> Self
    where
        D: Distribution<f64> + ?Sized,
        G: Rng + ?Sized;
}

impl RandomScalar for f64 {
    const COMPONENTS: usize = 1;

    fn sample_components<D, G>(dist: &D, rng: &mut G) -> Self
    where
        D: Distribution<f64> + ?Sized,
        G: Rng + ?Sized,
    {
        dist.sample(rng)
    }
}

impl RandomScalar for c64 {
    const COMPONENTS: usize = 2;

    fn sample_components<D, G>(dist: &D, rng: &mut G) -> Self
    where
        D: Distribution<f64> + ?Sized,
        G: Rng + ?Sized,
    {
        let re = dist.sample(rng);
        c64::new(re, dist.sample(rng))
    }
}

impl<T: RandomScalar, const R: usize> Store<T, R> {
    /// Fill a store by sampling every real component from `dist`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Store::filled`].
    ///
    /// # Example
    ///
    /// ```
    /// use ndtape::Store;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    /// use rand::distr::Uniform;
    ///
    /// let mut rng = StdRng::seed_from_u64(5);
    /// let dist = Uniform::new(-1.0, 1.0).unwrap();
    /// let s: Store<f64, 2> = Store::sample_with_rng([3, 4], &dist, &mut rng)?;
    /// assert!(s.as_slice().iter().all(|v| (-1.0..1.0).contains(v)));
    /// # Ok::<(), ndtape::TapeError>(())
    /// ```
    pub fn sample_with_rng<D, G>(
        shape: impl Into<Shape<R>>,
        dist: &D,
        rng: &mut G,
    ) -> Result<Self>
    where
        D: Distribution<f64> + ?Sized,
        G: Rng + ?Sized,
    {
        Self::from_fn(shape, |_| T::sample_components(dist, rng))
    }

    /// Components uniform in `[0, 1)`, from the thread-local generator.
    pub fn random(shape: impl Into<Shape<R>>) -> Result<Self> {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Components uniform in `[0, 1)`.
    ///
    /// Equal seeds give equal stores.
    pub fn random_with_rng<G: Rng + ?Sized>(
        shape: impl Into<Shape<R>>,
        rng: &mut G,
    ) -> Result<Self> {
        Self::sample_with_rng(shape, &StandardUniform, rng)
    }

    /// Standard normal values, from the thread-local generator.
    pub fn random_normal(shape: impl Into<Shape<R>>) -> Result<Self> {
        Self::random_normal_with_rng(shape, &mut rand::rng())
    }

    /// Standard normal values: mean zero, `E|x|^2 = 1`.
    ///
    /// Complex components are each drawn with variance 1/2.
    pub fn random_normal_with_rng<G: Rng + ?Sized>(
        shape: impl Into<Shape<R>>,
        rng: &mut G,
    ) -> Result<Self> {
        let scale = T::from_f64((T::COMPONENTS as f64).recip().sqrt());
        Self::from_fn(shape, |_| T::sample_components(&StandardNormal, rng) * scale)
    }
}
