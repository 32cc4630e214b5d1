use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::model::{LabeledDataset, LabeledSample};

// ---------------------------------------------------------------------------
// Train / holdout split
// ---------------------------------------------------------------------------

/// Row indices for the two halves of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

/// Shuffle `0..n_rows` with a fixed seed and cut off the holdout.
///
/// The holdout gets `ceil(n_rows * holdout_fraction)` rows, so any non-zero
/// fraction holds out at least one row. The same seed always yields the
/// same split.
pub fn split_indices(n_rows: usize, holdout_fraction: f64, seed: u64) -> SplitIndices {
    let fraction = holdout_fraction.clamp(0.0, 1.0);
    let n_holdout = ((n_rows as f64) * fraction).ceil() as usize;

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_holdout.min(n_rows));
    SplitIndices {
        train,
        holdout: indices,
    }
}

/// Borrow the samples of a dataset according to a split.
pub fn partition<'a>(
    dataset: &'a LabeledDataset,
    split: &SplitIndices,
) -> (Vec<&'a LabeledSample>, Vec<&'a LabeledSample>) {
    let pick = |idx: &[usize]| idx.iter().map(|&i| &dataset.samples[i]).collect::<Vec<_>>();
    (pick(&split.train), pick(&split.holdout))
}
