//! Input types accepted by compiled functions.

use std::borrow::Cow;

/// A vector-like type holding parameter values.
///
/// Compiled functions evaluate on a contiguous `&[f64]`. Types that are
/// already contiguous hand out a borrowed slice; others are copied once.
///
/// ```rust
/// use scriptfn::prelude::Vector;
///
/// let point = vec![1.0, 2.0];
/// assert_eq!(point.values().as_ref(), &[1.0, 2.0]);
/// assert_eq!([3.0; 4].values().len(), 4);
/// ```
pub trait Vector {
    /// Parameter values in parameter order.
    fn values(&self) -> Cow<'_, [f64]>;
}

impl Vector for [f64] {
    fn values(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(self)
    }
}

impl Vector for Vec<f64> {
    fn values(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(self)
    }
}

impl<const N: usize> Vector for [f64; N] {
    fn values(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(self)
    }
}

/// Non-contiguous views (e.g. strided slices) are copied.
#[cfg(feature = "ndarray")]
impl Vector for ndarray::Array1<f64> {
    fn values(&self) -> Cow<'_, [f64]> {
        match self.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.to_vec()),
        }
    }
}

#[cfg(feature = "nalgebra")]
impl Vector for nalgebra::DVector<f64> {
    fn values(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(self.as_slice())
    }
}
