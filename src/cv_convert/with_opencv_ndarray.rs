use super::with_opencv::{MatExt as _, OpenCvElement};
use super::{TryFromCv, TryIntoCv};
use ndarray as nd;
use opencv::{core as cv_core, prelude::*};

impl<'a, A> TryFromCv<&'a cv_core::Mat> for nd::ArrayView2<'a, A>
where
    A: OpenCvElement,
{
    type Error = anyhow::Error;

    fn try_from_cv(from: &'a cv_core::Mat) -> Result<Self, Self::Error> {
        let shape = from.plane_dim()?;
        let array = nd::ArrayView2::from_shape(shape, from.as_slice()?)?;
        Ok(array)
    }
}

impl<A> TryFromCv<&cv_core::Mat> for nd::Array2<A>
where
    A: OpenCvElement + Clone,
{
    type Error = anyhow::Error;

    fn try_from_cv(from: &cv_core::Mat) -> Result<Self, Self::Error> {
        let view: nd::ArrayView2<A> = from.try_into_cv()?;
        Ok(view.to_owned())
    }
}

impl<A> TryFromCv<cv_core::Mat> for nd::Array2<A>
where
    A: OpenCvElement + Clone,
{
    type Error = anyhow::Error;

    fn try_from_cv(from: cv_core::Mat) -> Result<Self, Self::Error> {
        (&from).try_into_cv()
    }
}

impl<A, S> TryFromCv<&nd::ArrayBase<S, nd::Ix2>> for cv_core::Mat
where
    A: cv_core::DataType,
    S: nd::RawData<Elem = A> + nd::Data,
{
    type Error = anyhow::Error;

    fn try_from_cv(from: &nd::ArrayBase<S, nd::Ix2>) -> anyhow::Result<Self> {
        let (rows, cols) = from.dim();
        if rows == 0 || cols == 0 {
            return Ok(cv_core::Mat::default());
        }
        let array = from.as_standard_layout();
        let slice = array
            .as_slice()
            .ok_or_else(|| anyhow::anyhow!("array is not contiguous"))?;
        let mat = cv_core::Mat::from_slice(slice)?
            .reshape_nd(1, &[rows as i32, cols as i32])?
            .clone_pointee();
        Ok(mat)
    }
}

impl<A, S> TryFromCv<nd::ArrayBase<S, nd::Ix2>> for cv_core::Mat
where
    A: cv_core::DataType,
    S: nd::RawData<Elem = A> + nd::Data,
{
    type Error = anyhow::Error;

    fn try_from_cv(from: nd::ArrayBase<S, nd::Ix2>) -> anyhow::Result<Self> {
        (&from).try_into_cv()
    }
}
