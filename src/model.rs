use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// A connection between two joint types, scored with the affinity field
/// stored in the `paf` planes (x component, y component).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limb {
    pub from: usize,
    pub to: usize,
    pub paf: [usize; 2],
    /// Whether a pair of this limb may start a new skeleton when its `from`
    /// joint is not part of one yet.
    #[serde(default = "default_seeds")]
    pub seeds: bool,
}

fn default_seeds() -> bool {
    true
}

impl Limb {
    pub const fn new(from: usize, to: usize, paf: [usize; 2], seeds: bool) -> Self {
        Self {
            from,
            to,
            paf,
            seeds,
        }
    }
}

/// Static description of what a network emits: joint names, the plane holding
/// each joint's confidence map, the limb list in assembly order, and the
/// auxiliary joints that do not count as evidence when pruning skeletons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyModel {
    pub name: String,
    pub joints: Vec<String>,
    pub heatmaps: Vec<usize>,
    pub limbs: Vec<Limb>,
    #[serde(default)]
    pub auxiliary: Vec<usize>,
}

const COCO_JOINTS: [&str; 18] = [
    "Nose", "Neck", "R-Sho", "R-Elb", "R-Wr", "L-Sho", "L-Elb", "L-Wr", "R-Hip", "R-Knee",
    "R-Ank", "L-Hip", "L-Knee", "L-Ank", "R-Eye", "L-Eye", "R-Ear", "L-Ear",
];

const COCO_LIMBS: [Limb; 19] = [
    Limb::new(1, 2, [31, 32], true),
    Limb::new(1, 5, [39, 40], true),
    Limb::new(2, 3, [33, 34], true),
    Limb::new(3, 4, [35, 36], true),
    Limb::new(5, 6, [41, 42], true),
    Limb::new(6, 7, [43, 44], true),
    Limb::new(1, 8, [19, 20], true),
    Limb::new(8, 9, [21, 22], true),
    Limb::new(9, 10, [23, 24], true),
    Limb::new(1, 11, [25, 26], true),
    Limb::new(11, 12, [27, 28], true),
    Limb::new(12, 13, [29, 30], true),
    Limb::new(1, 0, [47, 48], true),
    Limb::new(0, 14, [49, 50], true),
    Limb::new(14, 16, [53, 54], true),
    Limb::new(0, 15, [51, 52], true),
    Limb::new(15, 17, [55, 56], true),
    // Cross-body connections only ever extend an existing skeleton.
    Limb::new(2, 17, [37, 38], false),
    Limb::new(5, 16, [45, 46], false),
];

impl BodyModel {
    /// The 18-joint COCO layout of the OpenPose body network.
    pub fn coco() -> Self {
        Self {
            name: "coco".to_string(),
            joints: COCO_JOINTS.iter().map(|s| s.to_string()).collect(),
            heatmaps: (0..COCO_JOINTS.len()).collect(),
            limbs: COCO_LIMBS.to_vec(),
            auxiliary: vec![0, 14, 15, 16, 17],
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json).context("failed to parse body model")?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> anyhow::Error { InputError::BodyModel(msg).into() };

        let n = self.joints.len();
        if n == 0 {
            return Err(invalid("no joints".to_string()));
        }
        if self.heatmaps.len() != n {
            return Err(invalid(format!(
                "{} heatmap planes for {} joints",
                self.heatmaps.len(),
                n
            )));
        }
        for (k, limb) in self.limbs.iter().enumerate() {
            if limb.from >= n || limb.to >= n {
                return Err(invalid(format!("limb {k} refers to a joint out of range")));
            }
            if limb.from == limb.to {
                return Err(invalid(format!("limb {k} connects joint {} to itself", limb.from)));
            }
            if limb.paf[0] == limb.paf[1] {
                return Err(invalid(format!("limb {k} uses plane {} twice", limb.paf[0])));
            }
        }
        if let Some(&joint) = self.auxiliary.iter().find(|&&j| j >= n) {
            return Err(invalid(format!("auxiliary joint {joint} out of range")));
        }
        Ok(())
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j == name)
    }

    /// Number of planes a network output must carry for this model.
    pub fn required_planes(&self) -> usize {
        self.heatmaps
            .iter()
            .chain(self.limbs.iter().flat_map(|l| l.paf.iter()))
            .max()
            .map_or(0, |&max| max + 1)
    }

    pub fn is_core(&self, joint: usize) -> bool {
        !self.auxiliary.contains(&joint)
    }

    /// Joints that count towards a skeleton's evidence when pruning.
    pub fn core_joints(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.joints.len()).filter(|&j| self.is_core(j))
    }
}

impl Default for BodyModel {
    fn default() -> Self {
        Self::coco()
    }
}
