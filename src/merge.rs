//! Duplicate box merging.
//!
//! Visual Genome style annotations frequently describe the same physical
//! object several times. Within each image, pairs of objects are classified
//! by [`classify`] and every overlapping pair is folded into the earlier
//! object (the seed), which then carries the ids and names of everything it
//! absorbed.

use indicatif::ProgressBar;
use log::debug;
use rayon::prelude::*;
use std::ops::{Add, AddAssign};

use crate::types::{BBox, Corners, Object};

/// Above this IoU two boxes are the same box regardless of their labels.
pub const IDENTICAL_IOU: f64 = 0.9;
/// Above this IoU two boxes with the same primary name are merged.
pub const SAME_LABEL_IOU: f64 = 0.6;

/// Overlap category of a pair of objects, ordered by merge priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Overlap {
    None = 0,
    Identical = 1,
    Containment = 2,
    HighOverlap = 3,
}

/// Intersection area over the area of the smallest rectangle enclosing both
/// boxes. Boxes that only touch, or do not overlap at all, score 0.
pub fn iou(a: &Corners, b: &Corners) -> f64 {
    if a.x2 <= b.x1 || a.y2 <= b.y1 || a.x1 >= b.x2 || a.y1 >= b.y2 {
        return 0.0;
    }
    let enclosing = Corners {
        x1: a.x1.min(b.x1),
        y1: a.y1.min(b.y1),
        x2: a.x2.max(b.x2),
        y2: a.y2.max(b.y2),
    };
    let intersection = Corners {
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
        x2: a.x2.min(b.x2),
        y2: a.y2.min(b.y2),
    };
    let union_area = enclosing.area();
    if union_area <= 0 {
        return 0.0;
    }
    intersection.area() as f64 / union_area as f64
}

// Whether `inner` lies entirely within `outer`
fn inside(inner: &Corners, outer: &Corners) -> bool {
    inner.x1 >= outer.x1 && inner.y1 >= outer.y1 && inner.x2 <= outer.x2 && inner.y2 <= outer.y2
}

/// Classify a pair of objects. Categories are tested in priority order:
/// identical boxes first, then containment and high overlap, both of which
/// require the same primary name.
pub fn classify(a: &Object, b: &Object) -> Overlap {
    let ca = a.bbox.corners();
    let cb = b.bbox.corners();
    let overlap = iou(&ca, &cb);
    if ca == cb || overlap > IDENTICAL_IOU {
        return Overlap::Identical;
    }

    let same_name = matches!(
        (a.primary_name(), b.primary_name()),
        (Some(x), Some(y)) if x == y
    );
    if !same_name {
        Overlap::None
    } else if inside(&ca, &cb) || inside(&cb, &ca) {
        Overlap::Containment
    } else if overlap > SAME_LABEL_IOU {
        Overlap::HighOverlap
    } else {
        Overlap::None
    }
}

// Per-slot merge bookkeeping over the image's object arena
#[derive(Debug, Clone)]
enum Slot {
    Seed { absorbed: Vec<usize> },
    Absorbed { overlap: Overlap },
}

/// Number of absorbed objects per merge category, plus object totals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub objects_before: usize,
    pub objects_after: usize,
    pub identical: usize,
    pub containment: usize,
    pub high_overlap: usize,
}

impl MergeStats {
    fn record(&mut self, overlap: Overlap, count: usize) {
        match overlap {
            Overlap::Identical => self.identical += count,
            Overlap::Containment => self.containment += count,
            Overlap::HighOverlap => self.high_overlap += count,
            Overlap::None => {}
        }
    }

    pub fn merged(&self) -> usize {
        self.identical + self.containment + self.high_overlap
    }

    pub fn print_summary(&self) {
        log::info!(
            "Merged boxes: {} -> {} objects",
            self.objects_before,
            self.objects_after
        );
        log::info!(
            "Merged boxes per type: identical {}, containment {}, high overlap {}",
            self.identical,
            self.containment,
            self.high_overlap
        );
    }
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, other: Self) {
        self.objects_before += other.objects_before;
        self.objects_after += other.objects_after;
        self.identical += other.identical;
        self.containment += other.containment;
        self.high_overlap += other.high_overlap;
    }
}

impl Add for MergeStats {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

/// Merge duplicate boxes of a single image.
///
/// The first object of every merge group in iteration order survives. Its box
/// becomes the bounding union of the group when any partner was absorbed by
/// containment or high overlap, and the coordinate-wise mean otherwise.
pub fn merge_image_objects(objects: Vec<Object>) -> (Vec<Object>, MergeStats) {
    let num_obj = objects.len();
    let ids_before: usize = objects.iter().map(|o| o.ids.len()).sum();
    let mut slots: Vec<Slot> = (0..num_obj)
        .map(|_| Slot::Seed {
            absorbed: Vec::new(),
        })
        .collect();

    // Mark objects to be merged, always comparing against the seed's own box
    for i in 0..num_obj {
        if matches!(slots[i], Slot::Absorbed { .. }) {
            continue;
        }
        let mut absorbed = Vec::new();
        for j in (i + 1)..num_obj {
            if matches!(slots[j], Slot::Absorbed { .. }) {
                continue;
            }
            let overlap = classify(&objects[i], &objects[j]);
            if overlap != Overlap::None {
                slots[j] = Slot::Absorbed { overlap };
                absorbed.push(j);
            }
        }
        slots[i] = Slot::Seed { absorbed };
    }

    let mut stats = MergeStats {
        objects_before: num_obj,
        ..MergeStats::default()
    };
    let mut arena: Vec<Option<Object>> = objects.into_iter().map(Some).collect();
    let mut merged = Vec::new();

    for (i, slot) in slots.iter().enumerate() {
        let Slot::Seed { absorbed } = slot else {
            continue;
        };
        let Some(mut seed) = arena[i].take() else {
            continue;
        };

        let mut dims = vec![seed.bbox.corners()];
        let mut prominent = Overlap::Identical;
        for &j in absorbed {
            let Some(partner) = arena[j].take() else {
                continue;
            };
            if let Slot::Absorbed { overlap } = slots[j] {
                prominent = prominent.max(overlap);
            }
            seed.ids.extend(partner.ids);
            seed.names.extend(partner.names);
            dims.push(partner.bbox.corners());
        }

        if !absorbed.is_empty() {
            seed.bbox = if prominent > Overlap::Identical {
                bounding_union(&dims)
            } else {
                mean_box(&dims)
            };
            stats.record(prominent, absorbed.len());
        }
        dedup_names(&mut seed.names);
        merged.push(seed);
    }

    debug_assert_eq!(
        merged.iter().map(|o| o.ids.len()).sum::<usize>(),
        ids_before,
        "every object must survive as a seed or be absorbed exactly once"
    );
    stats.objects_after = merged.len();
    (merged, stats)
}

fn bounding_union(dims: &[Corners]) -> BBox {
    let mut union = dims[0];
    for c in &dims[1..] {
        union.x1 = union.x1.min(c.x1);
        union.y1 = union.y1.min(c.y1);
        union.x2 = union.x2.max(c.x2);
        union.y2 = union.y2.max(c.y2);
    }
    union.to_bbox()
}

// Mean of the corner coordinates; position and extent are truncated separately
fn mean_box(dims: &[Corners]) -> BBox {
    let n = dims.len() as f64;
    let (mut x1, mut y1, mut x2, mut y2) = (0.0, 0.0, 0.0, 0.0);
    for c in dims {
        x1 += c.x1 as f64;
        y1 += c.y1 as f64;
        x2 += c.x2 as f64;
        y2 += c.y2 as f64;
    }
    let (x1, y1, x2, y2) = (x1 / n, y1 / n, x2 / n, y2 / n);
    BBox {
        x: x1 as i32,
        y: y1 as i32,
        w: (x2 - x1) as i32,
        h: (y2 - y1) as i32,
    }
}

// Remove repeated names, keeping the first occurrence
fn dedup_names(names: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::with_capacity(names.len());
    names.retain(|name| seen.insert(name.clone()));
}

/// Merge duplicate boxes for every image in parallel.
pub fn merge_duplicate_boxes(objects: &mut [Vec<Object>], pb: &ProgressBar) -> MergeStats {
    let stats = objects
        .par_iter_mut()
        .map(|image_objects| {
            let (merged, stats) = merge_image_objects(std::mem::take(image_objects));
            *image_objects = merged;
            pb.inc(1);
            stats
        })
        .reduce(MergeStats::default, |a, b| a + b);
    debug!("Merged {} boxes in total", stats.merged());
    stats
}
