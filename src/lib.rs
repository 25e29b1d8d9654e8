//! Multi-person skeleton assembly from OpenPose-style network output.
//!
//! A [`PoseParser`] takes the per-joint confidence maps and per-limb part
//! affinity fields of one image and returns the people found in it. The three
//! stages it runs are available separately in [`keypoints`], [`limbs`] and
//! [`assemble`].

pub mod assemble;
pub mod convert;
pub mod cv_convert;
pub mod error;
pub mod keypoints;
pub mod limbs;
pub mod model;
pub mod pose;
pub mod prelude;
pub mod tensor;

mod parser;
pub use parser::*;
