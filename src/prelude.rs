pub use crate::cv_convert::{TryFromCv, TryIntoCv};
pub use crate::error::InputError;
pub use crate::keypoints::{Keypoint, KeypointConfig, KeypointSet};
pub use crate::limbs::{LimbMatch, PafConfig, ValidPair};
pub use crate::model::{BodyModel, Limb};
pub use crate::pose::{Joint, Pose};
pub use crate::tensor::NetworkOutput;
pub use crate::{ParseConfig, PoseFrame, PoseParser, PoseParserBuilder};
