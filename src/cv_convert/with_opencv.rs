use opencv::core::{self as cv, prelude::*};

pub use element_type::*;
mod element_type {
    use super::*;

    pub trait OpenCvElement {
        const DEPTH: i32;
    }

    impl OpenCvElement for u8 {
        const DEPTH: i32 = cv::CV_8U;
    }

    impl OpenCvElement for i32 {
        const DEPTH: i32 = cv::CV_32S;
    }

    impl OpenCvElement for f32 {
        const DEPTH: i32 = cv::CV_32F;
    }

    impl OpenCvElement for f64 {
        const DEPTH: i32 = cv::CV_64F;
    }
}

pub(crate) use mat_ext::*;
mod mat_ext {
    use anyhow::ensure;

    use super::*;

    pub trait MatExt {
        /// `(rows, cols)` of a single-channel 2-D mat.
        fn plane_dim(&self) -> anyhow::Result<(usize, usize)>;

        fn as_slice<T>(&self) -> anyhow::Result<&[T]>
        where
            T: OpenCvElement;
    }

    impl MatExt for cv::Mat {
        fn plane_dim(&self) -> anyhow::Result<(usize, usize)> {
            ensure!(self.dims() == 2, "expected a 2-D mat, got {} dims", self.dims());
            ensure!(
                self.channels() == 1,
                "expected a single-channel mat, got {} channels",
                self.channels()
            );
            Ok((self.rows() as usize, self.cols() as usize))
        }

        fn as_slice<T>(&self) -> anyhow::Result<&[T]>
        where
            T: OpenCvElement,
        {
            ensure!(self.depth() == T::DEPTH, "element type mismatch");
            ensure!(self.is_continuous(), "Mat data must be continuous");

            let (rows, cols) = self.plane_dim()?;
            let ptr = self.ptr(0)? as *const T;

            let slice = unsafe { std::slice::from_raw_parts(ptr, rows * cols) };
            Ok(slice)
        }
    }
}
