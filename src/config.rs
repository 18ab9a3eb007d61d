use clap::Parser;
use log::warn;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{PreprocessError, Result};
use crate::split::SplitMode;
use crate::text::AliasMap;

/// Smallest target long side for which encoded boxes are guaranteed non-empty.
pub const MIN_LONG_SIDE: u32 = 4;

/// Command-line arguments for encoding scene-graph annotations into a roidb.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Image metadata JSON (image_id, width, height, optional split)
    #[arg(long = "image_data", default_value = "VG/image_data.json")]
    pub image_data: PathBuf,

    /// Per-image object annotations JSON
    #[arg(long = "objects", default_value = "VG/objects.json")]
    pub objects: PathBuf,

    /// Per-image relationship annotations JSON
    #[arg(long = "relationships", default_value = "VG/relationships.json")]
    pub relationships: PathBuf,

    /// Directory receiving the encoded arrays
    #[arg(long = "output_dir", default_value = "VG-roidb")]
    pub output_dir: PathBuf,

    /// Output JSON file for the label and predicate dictionaries
    #[arg(long = "json_file", default_value = "VG-dicts.json")]
    pub json_file: PathBuf,

    /// Object alias file, one comma-separated alias group per line
    #[arg(long = "object_alias")]
    pub object_alias: Option<PathBuf>,

    /// Predicate alias file, one comma-separated alias group per line
    #[arg(long = "pred_alias")]
    pub pred_alias: Option<PathBuf>,

    /// Allowed object names, one per line
    #[arg(long = "object_list")]
    pub object_list: Option<PathBuf>,

    /// Allowed predicates, one per line
    #[arg(long = "pred_list")]
    pub pred_list: Option<PathBuf>,

    /// Keep only the N most frequent object names (0 keeps all)
    #[arg(long = "num_objects", default_value_t = 0)]
    pub num_objects: usize,

    /// Keep only the N most frequent predicates (0 keeps all)
    #[arg(long = "num_predicates", default_value_t = 0)]
    pub num_predicates: usize,

    /// Drop boxes whose area is not above this fraction of the image area
    #[arg(long = "min_box_area_frac", default_value_t = 0.002, value_parser = validate_fraction)]
    pub min_box_area_frac: f64,

    /// Fraction of the images to load
    #[arg(long = "load_frac", default_value_t = 1.0, value_parser = validate_fraction)]
    pub load_frac: f64,

    /// Use the split labels from the image metadata instead of fractions
    #[arg(long = "use_input_split")]
    pub use_input_split: bool,

    /// Fraction of images before the validation split begins
    #[arg(long = "train_frac", default_value_t = 0.7, value_parser = validate_fraction)]
    pub train_frac: f64,

    /// Fraction of images before the test split begins
    #[arg(long = "val_frac", default_value_t = 0.85, value_parser = validate_fraction)]
    pub val_frac: f64,

    /// Shuffle the split labels
    #[arg(long = "shuffle")]
    pub shuffle: bool,

    /// Seed for split shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Target long sides of the encoded boxes
    #[arg(
        long = "image_long_sizes",
        value_delimiter = ',',
        default_values_t = [512u32, 1024u32],
        value_parser = validate_long_side
    )]
    pub image_long_sizes: Vec<u32>,

    /// Skip merging of duplicate boxes
    #[arg(long = "no_merge")]
    pub no_merge: bool,
}

/// Optional label vocabularies and aliases, loaded from files.
#[derive(Debug, Clone, Default)]
pub struct LabelFilters {
    pub object_aliases: Option<AliasMap>,
    pub predicate_aliases: Option<AliasMap>,
    pub object_list: Option<HashSet<String>>,
    pub predicate_list: Option<HashSet<String>>,
}

/// Validated options driving the encoding pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub long_sides: Vec<u32>,
    pub min_box_area_frac: f64,
    pub load_frac: f64,
    pub merge_boxes: bool,
    pub num_objects: Option<usize>,
    pub num_predicates: Option<usize>,
    pub split_mode: SplitMode,
    pub filters: LabelFilters,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            long_sides: vec![512, 1024],
            min_box_area_frac: 0.002,
            load_frac: 1.0,
            merge_boxes: true,
            num_objects: None,
            num_predicates: None,
            split_mode: SplitMode::Fractions {
                train_frac: 0.7,
                val_frac: 0.85,
                shuffle: false,
                seed: 42,
            },
            filters: LabelFilters::default(),
        }
    }
}

impl Args {
    /// Validate the arguments and convert them into pipeline options. Label
    /// filters are left empty; they are loaded from disk separately.
    pub fn to_options(&self) -> Result<PipelineOptions> {
        let mut long_sides: Vec<u32> = Vec::with_capacity(self.image_long_sizes.len());
        for &size in &self.image_long_sizes {
            if !long_sides.contains(&size) {
                long_sides.push(size);
            }
        }
        if long_sides.is_empty() {
            return Err(PreprocessError::InvalidConfig(
                "at least one image long side is required".to_string(),
            ));
        }

        let split_mode = if self.use_input_split {
            SplitMode::FromInput
        } else {
            if self.val_frac < self.train_frac {
                return Err(PreprocessError::InvalidConfig(format!(
                    "val_frac ({}) must not be smaller than train_frac ({})",
                    self.val_frac, self.train_frac
                )));
            }
            if self.val_frac == self.train_frac {
                warn!(
                    "val_frac equals train_frac ({}); the validation split will be empty",
                    self.train_frac
                );
            }
            SplitMode::Fractions {
                train_frac: self.train_frac,
                val_frac: self.val_frac,
                shuffle: self.shuffle,
                seed: self.seed,
            }
        };

        Ok(PipelineOptions {
            long_sides,
            min_box_area_frac: self.min_box_area_frac,
            load_frac: self.load_frac,
            merge_boxes: !self.no_merge,
            num_objects: Some(self.num_objects).filter(|&n| n > 0),
            num_predicates: Some(self.num_predicates).filter(|&n| n > 0),
            split_mode,
            filters: LabelFilters::default(),
        })
    }
}

// Validate that the fraction is between 0.0 and 1.0
pub fn validate_fraction(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("FRACTION must be between 0.0 and 1.0".to_string()),
    }
}

// Long sides below MIN_LONG_SIDE cannot hold a clamped box
pub fn validate_long_side(s: &str) -> std::result::Result<u32, String> {
    match u32::from_str(s) {
        Ok(val) if val >= MIN_LONG_SIDE => Ok(val),
        _ => Err(format!("SIZE must be an integer of at least {}", MIN_LONG_SIDE)),
    }
}
