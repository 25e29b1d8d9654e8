mod traits;
pub use traits::*;

pub mod with_opencv;
pub mod with_opencv_ndarray;
