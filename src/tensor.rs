use anyhow::Result;
use half::f16;
use ndarray as nd;

use crate::error::InputError;
use crate::model::BodyModel;

/// One image's worth of network output, laid out as `[planes, height, width]`
/// at network resolution.
#[derive(Debug, Clone)]
pub struct NetworkOutput {
    planes: nd::Array3<f32>,
}

impl NetworkOutput {
    pub fn new(planes: nd::Array3<f32>) -> Result<Self> {
        if planes.is_empty() {
            return Err(InputError::EmptyOutput.into());
        }
        Ok(Self { planes })
    }

    /// Takes item `index` out of a `[batch, planes, height, width]` blob.
    pub fn from_batch(batch: nd::ArrayView4<f32>, index: usize) -> Result<Self> {
        let len = batch.len_of(nd::Axis(0));
        if index >= len {
            return Err(InputError::BatchIndex { index, len }.into());
        }
        Self::new(batch.index_axis(nd::Axis(0), index).to_owned())
    }

    /// Half-precision outputs are widened to `f32` up front.
    pub fn from_f16(planes: nd::ArrayView3<f16>) -> Result<Self> {
        Self::new(planes.mapv(f16::to_f32))
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len_of(nd::Axis(0))
    }

    pub fn height(&self) -> usize {
        self.planes.len_of(nd::Axis(1))
    }

    pub fn width(&self) -> usize {
        self.planes.len_of(nd::Axis(2))
    }

    pub fn plane(&self, index: usize) -> Result<nd::ArrayView2<f32>> {
        if index >= self.plane_count() {
            return Err(InputError::MissingPlanes {
                required: index + 1,
                actual: self.plane_count(),
            }
            .into());
        }
        Ok(self.planes.index_axis(nd::Axis(0), index))
    }

    pub fn ensure_covers(&self, model: &BodyModel) -> Result<()> {
        let required = model.required_planes();
        if self.plane_count() < required {
            return Err(InputError::MissingPlanes {
                required,
                actual: self.plane_count(),
            }
            .into());
        }
        Ok(())
    }

    pub fn planes(&self) -> nd::ArrayView3<f32> {
        self.planes.view()
    }
}
