//! Object label and box encoding.
//!
//! Encoding runs in two passes so that images can be processed in parallel
//! while the flat output keeps image order: every image is first encoded with
//! image-local row numbers, then prefix sums over the per-image counts give
//! each image its offset into the flat arrays.

use log::info;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

use crate::error::{PreprocessError, Result};
use crate::geometry::{encode_box, is_valid, EncodedBox};
use crate::types::{CsrRanges, Image, Object};
use crate::vocab::Vocabulary;

/// Maps every original object id of an image, including ids absorbed by
/// merging, to the row of the encoded object that represents it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdToIndex {
    tables: Vec<HashMap<i64, i32>>,
}

impl IdToIndex {
    pub fn get(&self, image: usize, object_id: i64) -> Option<i32> {
        self.tables.get(image)?.get(&object_id).copied()
    }

    pub fn image(&self, image: usize) -> Option<&HashMap<i64, i32>> {
        self.tables.get(image)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Flat object arrays for the whole corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectEncoding {
    pub labels: Vec<i32>,
    /// Encoded boxes keyed by target long side.
    pub boxes: BTreeMap<u32, Vec<EncodedBox>>,
    pub ranges: CsrRanges,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStats {
    pub kept: usize,
    pub dropped_out_of_vocabulary: usize,
    pub images_with_objects: usize,
    pub images: usize,
}

impl ObjectStats {
    pub fn print_summary(&self) {
        info!("{} objects encoded", self.kept);
        info!(
            "{} objects dropped (no name in vocabulary)",
            self.dropped_out_of_vocabulary
        );
        info!(
            "{} out of {} images have objects",
            self.images_with_objects, self.images
        );
    }
}

/// Pick the name with the highest corpus frequency among the names that are
/// in the vocabulary. The earliest name wins a tie.
pub fn resolve_label<'a>(names: &'a [String], vocab: &Vocabulary) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for name in names {
        if !vocab.contains(name) {
            continue;
        }
        let count = vocab.count(name);
        if best.map_or(true, |(_, max_occur)| count > max_occur) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name)
}

// Encoded objects of one image, rows numbered from zero
struct ImageObjects {
    labels: Vec<i32>,
    boxes: Vec<Vec<EncodedBox>>,
    // (original object id, local row)
    ids: Vec<(i64, usize)>,
    dropped: usize,
}

fn encode_image(
    image: &Image,
    objects: &[Object],
    vocab: &Vocabulary,
    long_sides: &[u32],
) -> Result<ImageObjects> {
    let mut encoded = ImageObjects {
        labels: Vec::with_capacity(objects.len()),
        boxes: vec![Vec::with_capacity(objects.len()); long_sides.len()],
        ids: Vec::new(),
        dropped: 0,
    };

    for obj in objects {
        let Some(label) = resolve_label(&obj.names, vocab).and_then(|l| vocab.index(l)) else {
            encoded.dropped += 1;
            continue;
        };

        for (size_boxes, &long_side) in encoded.boxes.iter_mut().zip(long_sides) {
            let b = encode_box(&obj.bbox, image.height, image.width, long_side);
            if !is_valid(&b) {
                return Err(PreprocessError::DegenerateBox {
                    image_id: image.image_id,
                    long_side,
                    encoded: b,
                });
            }
            size_boxes.push(b);
        }

        let row = encoded.labels.len();
        encoded.labels.push(label);
        // Merged objects share one row
        encoded.ids.extend(obj.ids.iter().map(|&id| (id, row)));
    }

    Ok(encoded)
}

/// Convert per-image entry counts into flat offsets, failing if the total
/// does not fit the int32 index range.
pub(crate) fn prefix_offsets(
    counts: impl IntoIterator<Item = usize>,
    what: &'static str,
) -> Result<(Vec<i32>, usize)> {
    let mut offsets = Vec::new();
    let mut total = 0usize;
    for count in counts {
        offsets.push(i32::try_from(total).map_err(|_| PreprocessError::IndexOverflow { what })?);
        total += count;
    }
    if i32::try_from(total).is_err() {
        return Err(PreprocessError::IndexOverflow { what });
    }
    Ok((offsets, total))
}

/// Encode every object of every image.
///
/// Returns the flat arrays, the id-to-index table consumed by relationship
/// encoding, and filtering statistics.
pub fn encode_objects(
    images: &[Image],
    objects: &[Vec<Object>],
    vocab: &Vocabulary,
    long_sides: &[u32],
) -> Result<(ObjectEncoding, IdToIndex, ObjectStats)> {
    if images.len() != objects.len() {
        return Err(PreprocessError::Misaligned {
            position: images.len().min(objects.len()),
            detail: format!(
                "{} images but {} object collections",
                images.len(),
                objects.len()
            ),
        });
    }

    // Pass 1: encode each image independently
    let per_image: Vec<ImageObjects> = images
        .par_iter()
        .zip(objects.par_iter())
        .map(|(image, objs)| encode_image(image, objs, vocab, long_sides))
        .collect::<Result<_>>()?;

    // Pass 2: offsets of each image in the flat arrays
    let (offsets, total) = prefix_offsets(per_image.iter().map(|e| e.labels.len()), "object")?;

    // Pass 3: id tables with global rows, filled per image in parallel
    let tables: Vec<HashMap<i64, i32>> = per_image
        .par_iter()
        .zip(offsets.par_iter())
        .map(|(encoded, &offset)| {
            encoded
                .ids
                .iter()
                .map(|&(id, row)| (id, offset + row as i32))
                .collect()
        })
        .collect();

    let mut encoding = ObjectEncoding {
        labels: Vec::with_capacity(total),
        boxes: long_sides
            .iter()
            .map(|&size| (size, Vec::with_capacity(total)))
            .collect(),
        ranges: CsrRanges::with_capacity(images.len()),
    };
    let mut stats = ObjectStats {
        images: images.len(),
        ..ObjectStats::default()
    };

    for (encoded, &offset) in per_image.into_iter().zip(&offsets) {
        let count = encoded.labels.len();
        encoding.ranges.push_group(offset, count as i32);
        encoding.labels.extend(encoded.labels);
        for (size_boxes, &size) in encoded.boxes.into_iter().zip(long_sides) {
            if let Some(flat) = encoding.boxes.get_mut(&size) {
                flat.extend(size_boxes);
            }
        }
        stats.kept += count;
        stats.dropped_out_of_vocabulary += encoded.dropped;
        if count > 0 {
            stats.images_with_objects += 1;
        }
    }

    Ok((encoding, IdToIndex { tables }, stats))
}
