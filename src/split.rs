use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::types::{Image, Split};

/// How images are assigned to train/val/test.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitMode {
    /// Use the split label attached to each image; unlabelled images train.
    FromInput,
    /// Split by position: `[0, n*train_frac)` train, `[n*train_frac, n*val_frac)`
    /// val, the rest test. `shuffle` permutes the resulting labels.
    Fractions {
        train_frac: f64,
        val_frac: f64,
        shuffle: bool,
        seed: u64,
    },
}

/// One split value per image (0 = train, 1 = val, 2 = test) and per-split totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    pub splits: Vec<i32>,
    pub counts: [usize; 3],
}

impl SplitAssignment {
    fn from_splits(splits: Vec<Split>) -> Self {
        let mut counts = [0usize; 3];
        for &split in &splits {
            counts[split as usize] += 1;
        }
        Self {
            splits: splits.into_iter().map(|s| s as i32).collect(),
            counts,
        }
    }

    pub fn print_summary(&self) {
        info!(
            "assigned {}/{}/{} to train/val/test split",
            self.counts[0], self.counts[1], self.counts[2]
        );
    }
}

/// Positions at which the val and test splits begin for `num_images` images.
pub fn split_thresholds(num_images: usize, train_frac: f64, val_frac: f64) -> (usize, usize) {
    let val_begin = (num_images as f64 * train_frac).floor() as usize;
    let test_begin = (num_images as f64 * val_frac).floor() as usize;
    (val_begin, test_begin)
}

/// Assign every image to a split.
pub fn assign_splits(images: &[Image], mode: &SplitMode) -> SplitAssignment {
    let splits: Vec<Split> = match mode {
        SplitMode::FromInput => images
            .iter()
            .map(|image| image.split.unwrap_or(Split::Train))
            .collect(),
        SplitMode::Fractions {
            train_frac,
            val_frac,
            shuffle,
            seed,
        } => {
            let (val_begin, test_begin) = split_thresholds(images.len(), *train_frac, *val_frac);
            let mut splits: Vec<Split> = (0..images.len())
                .map(|i| {
                    if i >= test_begin {
                        Split::Test
                    } else if i >= val_begin {
                        Split::Val
                    } else {
                        Split::Train
                    }
                })
                .collect();
            if *shuffle {
                let mut rng = StdRng::seed_from_u64(*seed);
                splits.shuffle(&mut rng);
            }
            splits
        }
    };
    SplitAssignment::from_splits(splits)
}
