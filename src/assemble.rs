use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use serde::Serialize;

use crate::error::InputError;
use crate::keypoints::KeypointSet;
use crate::limbs::LimbMatch;
use crate::model::BodyModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyConfig {
    /// Skeletons missing more core joints than this are discarded.
    pub max_missing_core: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_missing_core: 7,
        }
    }
}

/// One person's joint assignments: keypoint id per joint type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skeleton {
    joints: Vec<Option<usize>>,
    score: f32,
}

impl Skeleton {
    pub fn joints(&self) -> &[Option<usize>] {
        &self.joints
    }

    pub fn joint(&self, joint: usize) -> Option<usize> {
        self.joints.get(joint).copied().flatten()
    }

    /// Accumulated joint confidences and pair scores.
    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn missing_core(&self, model: &BodyModel) -> usize {
        model
            .core_joints()
            .filter(|&j| self.joint(j).is_none())
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Assembly {
    pub skeletons: Vec<Skeleton>,
    /// Skeletons dropped for missing too many core joints.
    pub discarded: usize,
}

/// Which skeletons currently hold a given keypoint in a given slot.
///
/// Lookups return the earliest skeleton, the same one a scan in creation
/// order would find.
#[derive(Debug, Default)]
struct SlotIndex {
    holders: HashMap<(usize, usize), BTreeSet<usize>>,
}

impl SlotIndex {
    fn find(&self, joint: usize, id: usize) -> Option<usize> {
        self.holders
            .get(&(joint, id))
            .and_then(|set| set.first().copied())
    }

    fn assign(&mut self, skeleton: usize, joint: usize, old: Option<usize>, new: usize) {
        if old == Some(new) {
            return;
        }
        if let Some(old) = old {
            if let Some(set) = self.holders.get_mut(&(joint, old)) {
                set.remove(&skeleton);
            }
        }
        self.holders.entry((joint, new)).or_default().insert(skeleton);
    }
}

/// Greedily joins limb pairs into skeletons, in limb order.
///
/// A pair extends the first skeleton already holding its `from` keypoint.
/// Otherwise it starts a new skeleton if its limb seeds, or is dropped.
/// The outcome depends on limb order and on pair order within a limb.
pub fn assemble(
    model: &BodyModel,
    matches: &[LimbMatch],
    keypoints: &KeypointSet,
    config: &AssemblyConfig,
) -> Result<Assembly> {
    model.validate()?;
    if matches.len() != model.limbs.len() {
        return Err(InputError::LimbCount {
            expected: model.limbs.len(),
            actual: matches.len(),
        }
        .into());
    }

    let confidence = |id: usize| -> Result<f32> {
        keypoints
            .get(id)
            .map(|k| k.confidence)
            .ok_or_else(|| InputError::UnknownKeypoint(id).into())
    };

    let mut skeletons: Vec<Skeleton> = Vec::new();
    let mut index = SlotIndex::default();
    let mut dropped = 0usize;

    for (k, (limb, limb_match)) in model.limbs.iter().zip(matches).enumerate() {
        let LimbMatch::Valid(pairs) = limb_match else {
            tracing::trace!(limb = k, ?limb_match, "skipping limb");
            continue;
        };

        for pair in pairs {
            let to_confidence = confidence(pair.to)?;
            match index.find(limb.from, pair.from) {
                Some(s) => {
                    let skeleton = &mut skeletons[s];
                    let old = skeleton.joints[limb.to].replace(pair.to);
                    skeleton.score += to_confidence + pair.score;
                    index.assign(s, limb.to, old, pair.to);
                }
                None if limb.seeds => {
                    let s = skeletons.len();
                    let mut joints = vec![None; model.joint_count()];
                    joints[limb.from] = Some(pair.from);
                    joints[limb.to] = Some(pair.to);
                    skeletons.push(Skeleton {
                        joints,
                        score: confidence(pair.from)? + to_confidence + pair.score,
                    });
                    index.assign(s, limb.from, None, pair.from);
                    index.assign(s, limb.to, None, pair.to);
                }
                None => dropped += 1,
            }
        }
    }

    let total = skeletons.len();
    skeletons.retain(|s| s.missing_core(model) <= config.max_missing_core);
    let discarded = total - skeletons.len();

    tracing::debug!(
        kept = skeletons.len(),
        discarded,
        dropped_pairs = dropped,
        "assembled skeletons"
    );

    Ok(Assembly {
        skeletons,
        discarded,
    })
}
