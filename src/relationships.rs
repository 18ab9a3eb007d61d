//! Relationship encoding. Must run after [`crate::objects::encode_objects`],
//! whose id-to-index table resolves relationship endpoints to object rows.

use log::info;
use rayon::prelude::*;

use crate::error::{PreprocessError, Result};
use crate::objects::{prefix_offsets, IdToIndex};
use crate::types::{CsrRanges, Relationship};
use crate::vocab::Vocabulary;

/// Flat relationship arrays for the whole corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipEncoding {
    pub predicates: Vec<i32>,
    /// `[subject_row, object_row]` into the flat object arrays.
    pub pairs: Vec<[i32; 2]>,
    pub ranges: CsrRanges,
}

/// Why a relationship was left out of the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// An endpoint does not resolve to an encoded object.
    Object,
    /// The predicate is not in the predicate vocabulary.
    Predicate,
    /// Subject and object resolve to the same encoded object.
    Duplicate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipStats {
    pub filtered_by_object: usize,
    pub filtered_by_predicate: usize,
    pub filtered_by_duplicate: usize,
    pub kept: usize,
    pub images_with_relationships: usize,
    pub images: usize,
}

impl RelationshipStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Object => self.filtered_by_object += 1,
            Rejection::Predicate => self.filtered_by_predicate += 1,
            Rejection::Duplicate => self.filtered_by_duplicate += 1,
        }
    }

    pub fn print_summary(&self) {
        info!("{} rel is filtered by object", self.filtered_by_object);
        info!("{} rel is filtered by predicate", self.filtered_by_predicate);
        info!("{} rel is filtered by duplicate", self.filtered_by_duplicate);
        info!("{} rel remains", self.kept);
        info!(
            "{} out of {} valid images have relationships",
            self.images_with_relationships, self.images
        );
    }
}

/// Resolve one relationship of image `image` to its predicate index and
/// `[subject_row, object_row]` pair.
pub fn resolve_relationship(
    rel: &Relationship,
    image: usize,
    ids: &IdToIndex,
    vocab: &Vocabulary,
) -> std::result::Result<(i32, [i32; 2]), Rejection> {
    let (Some(subject), Some(object)) = (ids.get(image, rel.subject_id), ids.get(image, rel.object_id))
    else {
        return Err(Rejection::Object);
    };
    let predicate = vocab.index(&rel.predicate).ok_or(Rejection::Predicate)?;
    if subject == object {
        return Err(Rejection::Duplicate);
    }
    Ok((predicate, [subject, object]))
}

// Encoded relationships of one image; rows already refer to global object rows
#[derive(Default)]
struct ImageRelationships {
    predicates: Vec<i32>,
    pairs: Vec<[i32; 2]>,
    stats: RelationshipStats,
}

/// Encode every relationship of every image against the object id table.
pub fn encode_relationships(
    relationships: &[Vec<Relationship>],
    ids: &IdToIndex,
    vocab: &Vocabulary,
) -> Result<(RelationshipEncoding, RelationshipStats)> {
    if relationships.len() != ids.len() {
        return Err(PreprocessError::Misaligned {
            position: relationships.len().min(ids.len()),
            detail: format!(
                "{} relationship collections but {} encoded images",
                relationships.len(),
                ids.len()
            ),
        });
    }

    // Pass 1: resolve each image independently
    let per_image: Vec<ImageRelationships> = relationships
        .par_iter()
        .enumerate()
        .map(|(i, rels)| {
            let mut encoded = ImageRelationships::default();
            for rel in rels {
                match resolve_relationship(rel, i, ids, vocab) {
                    Ok((predicate, pair)) => {
                        encoded.predicates.push(predicate);
                        encoded.pairs.push(pair);
                    }
                    Err(rejection) => encoded.stats.record(rejection),
                }
            }
            encoded
        })
        .collect();

    // Pass 2: offsets and concatenation in image order
    let (offsets, total) =
        prefix_offsets(per_image.iter().map(|e| e.predicates.len()), "relationship")?;

    let mut encoding = RelationshipEncoding {
        predicates: Vec::with_capacity(total),
        pairs: Vec::with_capacity(total),
        ranges: CsrRanges::with_capacity(relationships.len()),
    };
    let mut stats = RelationshipStats {
        images: relationships.len(),
        ..RelationshipStats::default()
    };

    for (encoded, &offset) in per_image.into_iter().zip(&offsets) {
        let count = encoded.predicates.len();
        encoding.ranges.push_group(offset, count as i32);
        encoding.predicates.extend(encoded.predicates);
        encoding.pairs.extend(encoded.pairs);

        stats.filtered_by_object += encoded.stats.filtered_by_object;
        stats.filtered_by_predicate += encoded.stats.filtered_by_predicate;
        stats.filtered_by_duplicate += encoded.stats.filtered_by_duplicate;
        stats.kept += count;
        if count > 0 {
            stats.images_with_relationships += 1;
        }
    }

    Ok((encoding, stats))
}
