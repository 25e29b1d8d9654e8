use anyhow::{ensure, Result};
use ndarray as nd;
use opencv::core as cv;
use opencv::imgproc;
use opencv::prelude::*;
use serde::Serialize;

use crate::convert::plane_to_mat;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointConfig {
    /// Smoothed confidence a pixel must exceed to belong to a blob.
    pub threshold: f64,
    /// Side of the square Gaussian kernel used to suppress single-pixel noise.
    pub blur_size: i32,
}

impl Default for KeypointConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            blur_size: 3,
        }
    }
}

impl KeypointConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.blur_size > 0 && self.blur_size % 2 == 1,
            "blur size must be a positive odd number, got {}",
            self.blur_size
        );
        ensure!(
            self.threshold.is_finite(),
            "keypoint threshold must be finite"
        );
        Ok(())
    }
}

/// A local maximum of one confidence map, before it gets an id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub x: i32,
    pub y: i32,
    pub confidence: f32,
}

/// A candidate joint. `id` is its index in the image's [`KeypointSet`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keypoint {
    pub id: usize,
    pub joint: usize,
    pub x: i32,
    pub y: i32,
    pub confidence: f32,
}

/// Finds one peak per blob of a confidence map already at frame resolution.
///
/// The map is smoothed, thresholded and split into blobs by their outer
/// contour. Within the convex fill of each contour the pixel with the highest
/// smoothed value wins; the reported confidence is the raw map value there.
pub fn extract_peaks(map: &nd::ArrayView2<f32>, config: &KeypointConfig) -> Result<Vec<Peak>> {
    let (rows, cols) = map.dim();
    if rows == 0 || cols == 0 {
        return Ok(Vec::new());
    }

    let src = plane_to_mat(map)?;
    let mut smooth = cv::Mat::default();
    imgproc::gaussian_blur_def(
        &src,
        &mut smooth,
        cv::Size::new(config.blur_size, config.blur_size),
        0.0,
    )?;

    let mut binary = cv::Mat::default();
    imgproc::threshold(
        &smooth,
        &mut binary,
        config.threshold,
        255.0,
        imgproc::THRESH_BINARY,
    )?;
    let mut mask = cv::Mat::default();
    binary.convert_to(&mut mask, cv::CV_8U, 1.0, 0.0)?;

    let mut contours = cv::Vector::<cv::Vector<cv::Point>>::new();
    imgproc::find_contours(
        &mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        cv::Point::default(),
    )?;

    let mut peaks = Vec::with_capacity(contours.len());
    for contour in contours.iter() {
        let mut blob = cv::Mat::zeros(mask.rows(), mask.cols(), cv::CV_8U)?.to_mat()?;
        imgproc::fill_convex_poly(
            &mut blob,
            &contour,
            cv::Scalar::all(255.0),
            imgproc::LINE_8,
            0,
        )?;

        let mut max_val = 0.0f64;
        let mut max_loc = cv::Point::default();
        cv::min_max_loc(
            &smooth,
            None,
            Some(&mut max_val),
            None,
            Some(&mut max_loc),
            &blob,
        )?;
        if max_loc.x < 0 || max_loc.y < 0 {
            continue;
        }

        peaks.push(Peak {
            x: max_loc.x,
            y: max_loc.y,
            confidence: map[[max_loc.y as usize, max_loc.x as usize]],
        });
    }

    Ok(peaks)
}

/// Arena of every candidate joint found in one image.
///
/// Joints are pushed in joint-type order, so the candidates of one joint type
/// occupy a contiguous id range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeypointSet {
    keypoints: Vec<Keypoint>,
    ranges: Vec<std::ops::Range<usize>>,
}

impl KeypointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the arena from per-joint peak lists, indexed by joint type.
    pub fn from_peaks<I, P>(per_joint: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: IntoIterator<Item = Peak>,
    {
        let mut set = Self::new();
        for peaks in per_joint {
            set.push_joint(peaks);
        }
        set
    }

    /// Appends the candidates of the next joint type and returns its index.
    pub fn push_joint(&mut self, peaks: impl IntoIterator<Item = Peak>) -> usize {
        let joint = self.ranges.len();
        let start = self.keypoints.len();
        for peak in peaks {
            self.keypoints.push(Keypoint {
                id: self.keypoints.len(),
                joint,
                x: peak.x,
                y: peak.y,
                confidence: peak.confidence,
            });
        }
        self.ranges.push(start..self.keypoints.len());
        joint
    }

    pub fn joint_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Keypoint> {
        self.keypoints.get(id)
    }

    /// Candidates of one joint type; empty for unknown joint types.
    pub fn candidates(&self, joint: usize) -> &[Keypoint] {
        match self.ranges.get(joint) {
            Some(range) => &self.keypoints[range.clone()],
            None => &[],
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Keypoint> {
        self.keypoints.iter()
    }
}

impl<'a> IntoIterator for &'a KeypointSet {
    type Item = &'a Keypoint;
    type IntoIter = std::slice::Iter<'a, Keypoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
