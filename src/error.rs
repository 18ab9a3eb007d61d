use thiserror::Error;

/// Errors that abort a preprocessing run.
///
/// Out-of-vocabulary objects and predicates are not errors; they are counted in
/// the per-stage statistics instead.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The parallel image/object/relationship collections do not line up.
    #[error("corpus misaligned at position {position}: {detail}")]
    Misaligned { position: usize, detail: String },

    /// An encoded box ended up with a non-positive width or height.
    #[error("degenerate box for image {image_id} at long side {long_side}: {encoded:?}")]
    DegenerateBox {
        image_id: i64,
        long_side: u32,
        encoded: [i32; 4],
    },

    #[error("flat {what} array exceeds the int32 index range")]
    IndexOverflow { what: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PreprocessError>;
