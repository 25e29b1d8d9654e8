use anyhow::Result;
use ndarray as nd;
use opencv::core as cv;
use serde::Serialize;

use crate::convert::resize_plane;
use crate::error::InputError;
use crate::keypoints::Keypoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PafConfig {
    /// Points sampled along each candidate connection, endpoints included.
    pub samples: usize,
    /// Minimum projected field value for a sample to count as aligned. The
    /// mean over all samples must exceed it too.
    pub score_threshold: f32,
    /// Fraction of aligned samples a connection must strictly exceed.
    pub min_aligned_ratio: f32,
}

impl Default for PafConfig {
    fn default() -> Self {
        Self {
            samples: 10,
            score_threshold: 0.1,
            min_aligned_ratio: 0.7,
        }
    }
}

impl PafConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.samples >= 2, "at least two samples per connection are needed");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.min_aligned_ratio),
            "aligned ratio must be within [0, 1], got {}",
            self.min_aligned_ratio
        );
        Ok(())
    }
}

/// The two components of one limb's part affinity field at frame resolution.
#[derive(Debug, Clone)]
pub struct AffinityField {
    x: nd::Array2<f32>,
    y: nd::Array2<f32>,
}

impl AffinityField {
    pub fn new(x: nd::Array2<f32>, y: nd::Array2<f32>) -> Result<Self> {
        if x.dim() != y.dim() {
            return Err(InputError::FieldShape {
                x: x.dim(),
                y: y.dim(),
            }
            .into());
        }
        if x.is_empty() {
            return Err(InputError::EmptyOutput.into());
        }
        Ok(Self { x, y })
    }

    /// Resamples both network planes to the frame with the same policy.
    pub fn resampled(
        x: &nd::ArrayView2<f32>,
        y: &nd::ArrayView2<f32>,
        frame: cv::Size,
    ) -> Result<Self> {
        Self::new(resize_plane(x, frame)?, resize_plane(y, frame)?)
    }

    pub fn width(&self) -> usize {
        self.x.ncols()
    }

    pub fn height(&self) -> usize {
        self.x.nrows()
    }

    /// Field vector at the pixel nearest to `(x, y)`, clamped to the frame.
    pub fn at(&self, x: f64, y: f64) -> (f32, f32) {
        let col = (x.round_ties_even().max(0.0) as usize).min(self.width() - 1);
        let row = (y.round_ties_even().max(0.0) as usize).min(self.height() - 1);
        (self.x[[row, col]], self.y[[row, col]])
    }
}

/// A proposed connection between two candidates of one limb.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidPair {
    pub from: usize,
    pub to: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvalidReason {
    /// One of the limb's joint types has no candidates.
    MissingCandidates,
    /// Candidates exist but no pair is consistent with the field.
    NoConnection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LimbMatch {
    Valid(Vec<ValidPair>),
    Invalid(InvalidReason),
}

impl LimbMatch {
    pub fn is_valid(&self) -> bool {
        matches!(self, LimbMatch::Valid(_))
    }

    pub fn pairs(&self) -> &[ValidPair] {
        match self {
            LimbMatch::Valid(pairs) => pairs,
            LimbMatch::Invalid(_) => &[],
        }
    }
}

/// Pairs every `from` candidate with its best-aligned `to` candidate.
///
/// Selection is greedy per `from` candidate: two of them may pick the same
/// `to` candidate. Ties keep the first `to` candidate seen.
pub fn match_limb(
    field: &AffinityField,
    from: &[Keypoint],
    to: &[Keypoint],
    config: &PafConfig,
) -> LimbMatch {
    if from.is_empty() || to.is_empty() {
        return LimbMatch::Invalid(InvalidReason::MissingCandidates);
    }

    let pairs = from
        .iter()
        .filter_map(|a| {
            let mut best: Option<ValidPair> = None;
            for b in to {
                let Some(score) = connection_score(field, a, b, config) else {
                    continue;
                };
                if best.map_or(true, |p| score > p.score) {
                    best = Some(ValidPair {
                        from: a.id,
                        to: b.id,
                        score,
                    });
                }
            }
            best
        })
        .collect::<Vec<_>>();

    if pairs.is_empty() {
        LimbMatch::Invalid(InvalidReason::NoConnection)
    } else {
        LimbMatch::Valid(pairs)
    }
}

/// Mean alignment of the field with the segment `a -> b`, or `None` when the
/// segment is degenerate or not aligned enough. Fewer than two samples never
/// connect.
pub fn connection_score(
    field: &AffinityField,
    a: &Keypoint,
    b: &Keypoint,
    config: &PafConfig,
) -> Option<f32> {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    let norm = dx.hypot(dy);
    if norm == 0.0 || config.samples < 2 {
        return None;
    }
    let (ux, uy) = ((dx / norm) as f32, (dy / norm) as f32);

    let n = config.samples;
    let last = (n - 1) as f64;
    let mut total = 0.0f32;
    let mut aligned = 0usize;
    for i in 0..n {
        let (px, py) = if i + 1 == n {
            (b.x as f64, b.y as f64)
        } else {
            let t = i as f64 / last;
            (a.x as f64 + t * dx, a.y as f64 + t * dy)
        };
        let (fx, fy) = field.at(px, py);
        let score = fx * ux + fy * uy;
        total += score;
        if score > config.score_threshold {
            aligned += 1;
        }
    }

    let mean = total / n as f32;
    let ratio = aligned as f32 / n as f32;
    (ratio > config.min_aligned_ratio && mean > config.score_threshold).then_some(mean)
}
