use crate::cv_convert::TryIntoCv;
use anyhow::{ensure, Result};
use ndarray as nd;
use opencv::{self as cv, core::MatTraitConst, imgproc};

pub fn plane_to_mat(plane: &nd::ArrayView2<f32>) -> Result<cv::core::Mat> {
    let mat: cv::core::Mat = plane.try_into_cv()?;
    ensure!(!mat.empty(), "plane is empty");
    Ok(mat)
}

pub fn mat_to_plane(mat: &cv::core::Mat) -> Result<nd::Array2<f32>> {
    if mat.depth() == cv::core::CV_32F && mat.is_continuous() {
        return mat.try_into_cv();
    }

    let mut converted = cv::core::Mat::default();
    mat.convert_to(&mut converted, cv::core::CV_32F, 1.0, 0.0)?;
    (&converted).try_into_cv()
}

/// Resamples one network plane to `size` (width x height) with bilinear
/// interpolation on pixel centres, the same policy for heatmaps and both
/// components of every affinity field.
pub fn resize_plane(plane: &nd::ArrayView2<f32>, size: cv::core::Size) -> Result<nd::Array2<f32>> {
    ensure!(
        size.width > 0 && size.height > 0,
        "target size is invalid: {}x{}",
        size.width,
        size.height
    );
    let (rows, cols) = plane.dim();
    if rows == size.height as usize && cols == size.width as usize {
        return Ok(plane.to_owned());
    }

    let src = plane_to_mat(plane)?;
    let mut resized = cv::core::Mat::default();
    imgproc::resize(&src, &mut resized, size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
    mat_to_plane(&resized)
}

/// Network input size for a frame, keeping its aspect ratio at a fixed
/// input height.
pub fn network_input_size(frame: cv::core::Size, in_height: i32) -> cv::core::Size {
    if frame.height <= 0 {
        return cv::core::Size::new(0, in_height);
    }
    let width = (in_height as f64 / frame.height as f64) * frame.width as f64;
    cv::core::Size::new(width as i32, in_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_plane_same_size_is_identity() {
        let plane = nd::Array2::from_shape_fn((4, 6), |(y, x)| (y + x) as f32);
        let res = resize_plane(&plane.view(), cv::core::Size::new(6, 4)).unwrap();
        assert_eq!(res, plane);
    }

    #[test]
    fn test_resize_plane_upsamples_constant() {
        let plane = nd::Array2::from_elem((5, 5), 0.5f32);
        let res = resize_plane(&plane.view(), cv::core::Size::new(20, 10)).unwrap();
        assert_eq!(res.dim(), (10, 20));
        assert!(res.iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_resize_plane_rejects_empty_target() {
        let plane = nd::Array2::from_elem((5, 5), 0.5f32);
        assert!(resize_plane(&plane.view(), cv::core::Size::new(0, 10)).is_err());
    }

    #[test]
    fn test_network_input_size_keeps_aspect() {
        let size = network_input_size(cv::core::Size::new(640, 480), 368);
        assert_eq!(size, cv::core::Size::new(490, 368));
    }
}
