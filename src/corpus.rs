//! The in-memory corpus and the sanitation passes that run before merging.

use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashSet;

use crate::error::{PreprocessError, Result};
use crate::text::{canonicalize, AliasMap};
use crate::types::{
    Image, ImageObjectsRecord, ImageRecord, ImageRelationshipsRecord, Object, Relationship,
};

/// Images with their objects and relationships, aligned by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    pub images: Vec<Image>,
    pub objects: Vec<Vec<Object>>,
    pub relationships: Vec<Vec<Relationship>>,
}

impl Corpus {
    /// Build a corpus from the three parallel record lists.
    ///
    /// Fails if the lists differ in length or disagree on the image id at any
    /// position. Relationship endpoints that are missing from the image's
    /// objects but carry their own box and name are added as objects.
    pub fn from_records(
        images: Vec<ImageRecord>,
        objects: Vec<ImageObjectsRecord>,
        relationships: Vec<ImageRelationshipsRecord>,
    ) -> Result<Self> {
        if images.len() != objects.len() || images.len() != relationships.len() {
            return Err(PreprocessError::Misaligned {
                position: images.len().min(objects.len()).min(relationships.len()),
                detail: format!(
                    "{} images, {} object collections, {} relationship collections",
                    images.len(),
                    objects.len(),
                    relationships.len()
                ),
            });
        }
        for (position, ((image, objs), rels)) in
            images.iter().zip(&objects).zip(&relationships).enumerate()
        {
            if image.image_id != objs.image_id || image.image_id != rels.image_id {
                return Err(PreprocessError::Misaligned {
                    position,
                    detail: format!(
                        "image_id {} vs objects {} vs relationships {}",
                        image.image_id, objs.image_id, rels.image_id
                    ),
                });
            }
        }

        let mut synced = 0usize;
        let mut corpus = Corpus {
            images: images.iter().map(Image::from).collect(),
            objects: Vec::with_capacity(objects.len()),
            relationships: Vec::with_capacity(relationships.len()),
        };
        for (objs, rels) in objects.into_iter().zip(relationships) {
            let mut image_objects: Vec<Object> = objs.objects.into_iter().map(Object::from).collect();
            let mut known: HashSet<i64> = image_objects.iter().map(Object::object_id).collect();

            // Sync relationship endpoints into the object list
            for rel in &rels.relationships {
                for endpoint in [&rel.subject, &rel.object] {
                    if known.contains(&endpoint.object_id) {
                        continue;
                    }
                    if let Some(obj) = endpoint.to_object() {
                        known.insert(endpoint.object_id);
                        image_objects.push(obj);
                        synced += 1;
                    }
                }
            }

            corpus.objects.push(image_objects);
            corpus
                .relationships
                .push(rels.relationships.iter().map(Relationship::from).collect());
        }
        debug!("Synced {} relationship endpoints into objects", synced);

        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Keep only the first `floor(len * load_frac)` images.
    pub fn truncate_fraction(&mut self, load_frac: f64) {
        if load_frac >= 1.0 {
            return;
        }
        let num_im = (self.len() as f64 * load_frac).floor() as usize;
        self.images.truncate(num_im);
        self.objects.truncate(num_im);
        self.relationships.truncate(num_im);
    }

    /// Normalize every object name and predicate, then apply alias maps.
    pub fn normalize_labels(
        &mut self,
        object_aliases: Option<&AliasMap>,
        predicate_aliases: Option<&AliasMap>,
    ) {
        self.objects.par_iter_mut().flatten().for_each(|obj| {
            for name in obj.names.iter_mut() {
                *name = canonicalize(name, object_aliases);
            }
        });
        self.relationships.par_iter_mut().flatten().for_each(|rel| {
            rel.predicate = canonicalize(&rel.predicate, predicate_aliases);
        });
    }

    /// Count relationships whose endpoints both exist among the image's
    /// objects. Returns `(consistent, total)`.
    pub fn cross_check(&self) -> (usize, usize) {
        let (consistent, total) = self
            .objects
            .par_iter()
            .zip(self.relationships.par_iter())
            .map(|(objs, rels)| {
                let ids: HashSet<i64> = objs.iter().flat_map(|o| o.ids.iter().copied()).collect();
                let consistent = rels
                    .iter()
                    .filter(|r| ids.contains(&r.subject_id) && ids.contains(&r.object_id))
                    .count();
                (consistent, rels.len())
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
        info!(
            "cross check: {}/{} relationship are correct",
            consistent, total
        );
        (consistent, total)
    }

    /// Drop unnamed objects, objects with a non-positive extent, and objects
    /// whose area is not larger than `min_area_frac` of the image area.
    /// Returns `(kept, total)`.
    pub fn filter_small_boxes(&mut self, min_area_frac: f64) -> (usize, usize) {
        let (kept, total) = self
            .objects
            .par_iter_mut()
            .zip(self.images.par_iter())
            .map(|(objs, image)| {
                let image_area = image.height as f64 * image.width as f64;
                let before = objs.len();
                objs.retain(|obj| {
                    !obj.names.is_empty()
                        && obj.bbox.w > 0
                        && obj.bbox.h > 0
                        && obj.bbox.area() as f64 > image_area * min_area_frac
                });
                (objs.len(), before)
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
        info!("box threshold: keeping {}/{} boxes", kept, total);
        (kept, total)
    }
}
