use std::sync::Arc;

use anyhow::Result;
use opencv::core as cv;
use rayon::prelude::*;
use serde::Serialize;

use crate::assemble::{assemble, Assembly, AssemblyConfig};
use crate::convert::resize_plane;
use crate::error::InputError;
use crate::keypoints::{extract_peaks, KeypointConfig, KeypointSet};
use crate::limbs::{match_limb, AffinityField, InvalidReason, LimbMatch, PafConfig};
use crate::model::BodyModel;
use crate::pose::Pose;
use crate::tensor::NetworkOutput;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParseConfig {
    pub keypoint: KeypointConfig,
    pub paf: PafConfig,
    pub assembly: AssemblyConfig,
}

impl ParseConfig {
    pub fn validate(&self) -> Result<()> {
        self.keypoint.validate()?;
        self.paf.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PoseParserBuilder {
    model: BodyModel,
    config: ParseConfig,
}

impl PoseParserBuilder {
    pub fn new(model: BodyModel) -> Self {
        Self {
            model,
            config: ParseConfig::default(),
        }
    }

    pub fn config(mut self, config: ParseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn keypoint_threshold(mut self, threshold: f64) -> Self {
        self.config.keypoint.threshold = threshold;
        self
    }

    pub fn blur_size(mut self, size: i32) -> Self {
        self.config.keypoint.blur_size = size;
        self
    }

    pub fn interp_samples(mut self, samples: usize) -> Self {
        self.config.paf.samples = samples;
        self
    }

    pub fn paf_score_threshold(mut self, threshold: f32) -> Self {
        self.config.paf.score_threshold = threshold;
        self
    }

    pub fn min_aligned_ratio(mut self, ratio: f32) -> Self {
        self.config.paf.min_aligned_ratio = ratio;
        self
    }

    pub fn max_missing_core(mut self, max: usize) -> Self {
        self.config.assembly.max_missing_core = max;
        self
    }

    pub fn build(self) -> Result<PoseParser> {
        PoseParser::new(self.model, self.config)
    }
}

/// Everything recovered from one image.
#[derive(Debug, Clone, Serialize)]
pub struct PoseFrame {
    pub poses: Vec<Pose>,
    /// Skeletons dropped for missing too many core joints.
    pub discarded: usize,
    #[serde(skip)]
    pub keypoints: KeypointSet,
    pub limbs: Vec<LimbMatch>,
}

/// Turns network output into per-person poses for one body model.
///
/// Holds no per-image state; the same parser can be shared across threads
/// and called repeatedly.
#[derive(Debug, Clone)]
pub struct PoseParser {
    model: BodyModel,
    config: ParseConfig,
    names: Arc<[String]>,
}

impl PoseParser {
    pub fn builder(model: BodyModel) -> PoseParserBuilder {
        PoseParserBuilder::new(model)
    }

    pub fn new(model: BodyModel, config: ParseConfig) -> Result<Self> {
        model.validate()?;
        config.validate()?;
        let names = model.joints.clone().into();
        Ok(Self {
            model,
            config,
            names,
        })
    }

    pub fn coco() -> Result<Self> {
        Self::new(BodyModel::coco(), ParseConfig::default())
    }

    pub fn model(&self) -> &BodyModel {
        &self.model
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Runs all three stages for a frame of `frame` size (width x height).
    pub fn parse(&self, output: &NetworkOutput, frame: cv::Size) -> Result<PoseFrame> {
        ensure_frame(frame)?;
        output.ensure_covers(&self.model)?;

        let keypoints = self.extract_keypoints(output, frame)?;
        let limbs = self.score_limbs(output, frame, &keypoints)?;
        let Assembly {
            skeletons,
            discarded,
        } = self.assemble(&limbs, &keypoints)?;

        let poses = skeletons
            .iter()
            .map(|s| Pose::resolve(s, &keypoints, self.names.clone()))
            .collect::<Vec<_>>();
        tracing::debug!(
            poses = poses.len(),
            discarded,
            width = frame.width,
            height = frame.height,
            "parsed frame"
        );

        Ok(PoseFrame {
            poses,
            discarded,
            keypoints,
            limbs,
        })
    }

    /// Resamples every joint's confidence map to the frame and extracts its
    /// peaks. Ids follow joint order regardless of scheduling.
    pub fn detect_keypoints(&self, output: &NetworkOutput, frame: cv::Size) -> Result<KeypointSet> {
        ensure_frame(frame)?;
        output.ensure_covers(&self.model)?;
        self.extract_keypoints(output, frame)
    }

    fn extract_keypoints(&self, output: &NetworkOutput, frame: cv::Size) -> Result<KeypointSet> {
        let per_joint = self
            .model
            .heatmaps
            .par_iter()
            .map(|&plane| -> Result<_> {
                let map = resize_plane(&output.plane(plane)?, frame)?;
                extract_peaks(&map.view(), &self.config.keypoint)
            })
            .collect::<Result<Vec<_>>>()?;

        let keypoints = KeypointSet::from_peaks(per_joint);
        tracing::debug!(keypoints = keypoints.len(), "detected keypoints");
        Ok(keypoints)
    }

    /// Scores candidate connections for every limb independently.
    pub fn match_limbs(
        &self,
        output: &NetworkOutput,
        frame: cv::Size,
        keypoints: &KeypointSet,
    ) -> Result<Vec<LimbMatch>> {
        ensure_frame(frame)?;
        output.ensure_covers(&self.model)?;
        if keypoints.joint_count() != self.model.joint_count() {
            return Err(InputError::JointCount {
                expected: self.model.joint_count(),
                actual: keypoints.joint_count(),
            }
            .into());
        }
        self.score_limbs(output, frame, keypoints)
    }

    fn score_limbs(
        &self,
        output: &NetworkOutput,
        frame: cv::Size,
        keypoints: &KeypointSet,
    ) -> Result<Vec<LimbMatch>> {
        let matches = self
            .model
            .limbs
            .par_iter()
            .enumerate()
            .map(|(k, limb)| -> Result<LimbMatch> {
                let from = keypoints.candidates(limb.from);
                let to = keypoints.candidates(limb.to);
                let res = if from.is_empty() || to.is_empty() {
                    LimbMatch::Invalid(InvalidReason::MissingCandidates)
                } else {
                    let field = AffinityField::resampled(
                        &output.plane(limb.paf[0])?,
                        &output.plane(limb.paf[1])?,
                        frame,
                    )?;
                    match_limb(&field, from, to, &self.config.paf)
                };
                tracing::trace!(limb = k, pairs = res.pairs().len(), "matched limb");
                Ok(res)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(matches)
    }

    pub fn assemble(&self, matches: &[LimbMatch], keypoints: &KeypointSet) -> Result<Assembly> {
        assemble(&self.model, matches, keypoints, &self.config.assembly)
    }
}

fn ensure_frame(frame: cv::Size) -> Result<()> {
    if frame.width <= 0 || frame.height <= 0 {
        return Err(InputError::InvalidFrame {
            width: frame.width,
            height: frame.height,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::Peak;
    use ndarray as nd;

    #[test]
    fn test_builder_overrides_defaults() {
        let parser = PoseParser::builder(BodyModel::coco())
            .keypoint_threshold(0.2)
            .interp_samples(12)
            .max_missing_core(5)
            .build()
            .unwrap();
        assert_eq!(parser.config().keypoint.threshold, 0.2);
        assert_eq!(parser.config().paf.samples, 12);
        assert_eq!(parser.config().assembly.max_missing_core, 5);
        assert_eq!(parser.config().keypoint.blur_size, 3);
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        assert!(PoseParser::builder(BodyModel::coco())
            .blur_size(2)
            .build()
            .is_err());
        assert!(PoseParser::builder(BodyModel::coco())
            .interp_samples(1)
            .build()
            .is_err());
    }

    #[test]
    fn test_empty_output_yields_no_poses() {
        let parser = PoseParser::coco().unwrap();
        let output = NetworkOutput::new(nd::Array3::zeros((57, 23, 31))).unwrap();
        let frame = parser.parse(&output, cv::Size::new(62, 46)).unwrap();
        assert!(frame.poses.is_empty());
        assert_eq!(frame.discarded, 0);
        assert!(frame.keypoints.is_empty());
        assert_eq!(frame.limbs.len(), 19);
        assert!(frame.limbs.iter().all(|l| !l.is_valid()));
    }

    #[test]
    fn test_stages_compose_to_parse() {
        let parser = PoseParser::coco().unwrap();
        let mut planes = nd::Array3::<f32>::zeros((57, 20, 20));
        planes[[1, 10, 10]] = 1.0;
        planes[[2, 10, 6]] = 1.0;
        let output = NetworkOutput::new(planes).unwrap();
        let size = cv::Size::new(40, 40);

        let frame = parser.parse(&output, size).unwrap();
        let keypoints = parser.detect_keypoints(&output, size).unwrap();
        let limbs = parser.match_limbs(&output, size, &keypoints).unwrap();
        assert_eq!(frame.keypoints, keypoints);
        assert_eq!(frame.limbs, limbs);
        assert_eq!(keypoints.len(), 2);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let parser = PoseParser::coco().unwrap();
        let output = NetworkOutput::new(nd::Array3::zeros((44, 8, 8))).unwrap();
        let err = parser.parse(&output, cv::Size::new(8, 8)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InputError>(),
            Some(&InputError::MissingPlanes {
                required: 57,
                actual: 44
            })
        );

        let output = NetworkOutput::new(nd::Array3::zeros((57, 8, 8))).unwrap();
        let err = parser.parse(&output, cv::Size::new(0, 8)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::InvalidFrame { .. })
        ));

        let keypoints = KeypointSet::from_peaks(vec![Vec::<Peak>::new(); 3]);
        let err = parser
            .match_limbs(&output, cv::Size::new(8, 8), &keypoints)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::JointCount { .. })
        ));
    }
}
