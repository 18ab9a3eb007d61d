//! Scene-graph annotations to ROI database encoder
//!
//! This library merges duplicate object boxes, builds label and predicate
//! vocabularies, and encodes objects and relationships into flat int32 arrays
//! with per-image ranges for fast random access.

pub mod config;
pub mod corpus;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod io;
pub mod merge;
pub mod objects;
pub mod relationships;
pub mod split;
pub mod text;
pub mod types;
pub mod utils;
pub mod vocab;

// Re-export commonly used types and functions
pub use config::{Args, LabelFilters, PipelineOptions};
pub use corpus::Corpus;
pub use dataset::{build_roidb, process_dataset, Roidb, RunStats};
pub use error::{PreprocessError, Result};
pub use objects::{encode_objects, IdToIndex, ObjectEncoding};
pub use relationships::{encode_relationships, RelationshipEncoding};
pub use split::{assign_splits, SplitAssignment, SplitMode};
pub use types::{BBox, CsrRanges, Image, Object, Relationship, Split};
pub use vocab::Vocabulary;
