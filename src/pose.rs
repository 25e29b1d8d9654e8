use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::assemble::Skeleton;
use crate::keypoints::KeypointSet;
use crate::model::Limb;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Joint {
    /// Keypoint id within the frame the pose came from.
    pub id: usize,
    pub x: i32,
    pub y: i32,
    pub confidence: f32,
}

impl Joint {
    pub fn distance(&self, other: &Joint) -> f64 {
        ((self.x - other.x) as f64).hypot((self.y - other.y) as f64)
    }
}

/// An accepted skeleton resolved to pixel coordinates.
///
/// Serializes as `{ "score": .., "joints": { name: joint | null, .. } }` with
/// joints in body-model order.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    names: Arc<[String]>,
    joints: Vec<Option<Joint>>,
    score: f32,
}

impl Pose {
    pub(crate) fn resolve(
        skeleton: &Skeleton,
        keypoints: &KeypointSet,
        names: Arc<[String]>,
    ) -> Self {
        let joints = skeleton
            .joints()
            .iter()
            .map(|slot| {
                slot.and_then(|id| keypoints.get(id)).map(|k| Joint {
                    id: k.id,
                    x: k.x,
                    y: k.y,
                    confidence: k.confidence,
                })
            })
            .collect();
        Self {
            names,
            joints,
            score: skeleton.score(),
        }
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn joints(&self) -> &[Option<Joint>] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index).and_then(Option::as_ref)
    }

    pub fn get(&self, name: &str) -> Option<&Joint> {
        let index = self.names.iter().position(|n| n == name)?;
        self.joint(index)
    }

    /// `(joint name, joint)` in body-model order, absent joints included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Joint>)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.joints.iter().map(Option::as_ref))
    }

    pub fn to_map(&self) -> BTreeMap<String, Option<(i32, i32)>> {
        self.iter()
            .map(|(name, joint)| (name.to_string(), joint.map(|j| (j.x, j.y))))
            .collect()
    }

    pub fn distance(&self, a: usize, b: usize) -> Option<f64> {
        Some(self.joint(a)?.distance(self.joint(b)?))
    }

    /// Distances from `pivot` to each of `targets` that is present, e.g. the
    /// neck-relative limb extents used as a posture descriptor.
    pub fn distances_from(&self, pivot: usize, targets: &[usize]) -> BTreeMap<usize, f64> {
        let Some(pivot) = self.joint(pivot) else {
            return BTreeMap::new();
        };
        targets
            .iter()
            .filter_map(|&t| self.joint(t).map(|j| (t, pivot.distance(j))))
            .collect()
    }

    /// Segments of the seeding limbs whose two ends are both present.
    pub fn segments(&self, limbs: &[Limb]) -> Vec<(Joint, Joint)> {
        limbs
            .iter()
            .filter(|l| l.seeds)
            .filter_map(|l| Some((*self.joint(l.from)?, *self.joint(l.to)?)))
            .collect()
    }
}

struct NamedJoints<'a>(&'a Pose);

impl Serialize for NamedJoints<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter())
    }
}

impl Serialize for Pose {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Pose", 2)?;
        state.serialize_field("score", &self.score)?;
        state.serialize_field("joints", &NamedJoints(self))?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble;
    use crate::keypoints::Peak;
    use crate::limbs::{LimbMatch, ValidPair};
    use crate::model::BodyModel;

    fn sample_pose() -> Pose {
        let model = BodyModel {
            name: "arm".to_string(),
            joints: vec!["shoulder".into(), "elbow".into(), "wrist".into()],
            heatmaps: vec![0, 1, 2],
            limbs: vec![Limb::new(0, 1, [3, 4], true), Limb::new(1, 2, [5, 6], false)],
            auxiliary: vec![],
        };
        let keypoints = KeypointSet::from_peaks(vec![
            vec![Peak {
                x: 0,
                y: 0,
                confidence: 0.9,
            }],
            vec![Peak {
                x: 3,
                y: 4,
                confidence: 0.8,
            }],
            vec![],
        ]);
        let matches = vec![
            LimbMatch::Valid(vec![ValidPair {
                from: 0,
                to: 1,
                score: 0.7,
            }]),
            LimbMatch::Invalid(crate::limbs::InvalidReason::MissingCandidates),
        ];
        let assembly = assemble(&model, &matches, &keypoints, &Default::default()).unwrap();
        let names: Arc<[String]> = model.joints.clone().into();
        Pose::resolve(&assembly.skeletons[0], &keypoints, names)
    }

    #[test]
    fn test_named_lookup() {
        let pose = sample_pose();
        assert_eq!(pose.get("elbow").map(|j| (j.x, j.y)), Some((3, 4)));
        assert!(pose.get("wrist").is_none());
        assert!(pose.get("knee").is_none());
        assert!((pose.score() - 2.4).abs() < 1e-5);

        let map = pose.to_map();
        assert_eq!(map["shoulder"], Some((0, 0)));
        assert_eq!(map["wrist"], None);
    }

    #[test]
    fn test_distances_skip_absent_joints() {
        let pose = sample_pose();
        assert_eq!(pose.distance(0, 1), Some(5.0));
        assert_eq!(pose.distance(0, 2), None);
        let distances = pose.distances_from(0, &[1, 2]);
        assert_eq!(distances.len(), 1);
        assert_eq!(distances[&1], 5.0);
        assert!(pose.distances_from(2, &[0, 1]).is_empty());
    }

    #[test]
    fn test_segments_use_seeding_limbs() {
        let pose = sample_pose();
        let limbs = [Limb::new(0, 1, [3, 4], true), Limb::new(0, 1, [5, 6], false)];
        let segments = pose.segments(&limbs);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].1.x, segments[0].1.y), (3, 4));
    }

    #[test]
    fn test_serializes_joints_by_name() {
        let pose = sample_pose();
        let json = serde_json::to_value(&pose).unwrap();
        let joints = json["joints"].as_object().unwrap();
        assert_eq!(joints.len(), 3);
        assert_eq!(json["joints"]["elbow"]["x"], 3);
        assert_eq!(json["joints"]["elbow"]["y"], 4);
        assert_eq!(json["joints"]["shoulder"]["id"], 0);
        assert!(json["joints"]["wrist"].is_null());
        assert!(json["score"].as_f64().unwrap() > 2.0);
    }
}
