use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::text::decode_lossy;

// Free-text label read as raw bytes so that invalid UTF-8 and lone surrogate
// escapes are dropped instead of failing the whole file
struct LossyText(String);

impl<'de> Deserialize<'de> for LossyText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LossyVisitor;

        impl<'de> Visitor<'de> for LossyVisitor {
            type Value = LossyText;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a label string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<LossyText, E> {
                Ok(LossyText(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<LossyText, E> {
                Ok(LossyText(v))
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<LossyText, E> {
                Ok(LossyText(decode_lossy(v)))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<LossyText, E> {
                Ok(LossyText(decode_lossy(&v)))
            }
        }

        deserializer.deserialize_bytes(LossyVisitor)
    }
}

fn lossy_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    LossyText::deserialize(deserializer).map(|text| text.0)
}

fn lossy_text_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<LossyText>::deserialize(deserializer).map(|text| text.map(|t| t.0))
}

fn lossy_text_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Vec::<LossyText>::deserialize(deserializer)
        .map(|texts| texts.into_iter().map(|t| t.0).collect())
}

// Image metadata record as found in image_data.json
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageRecord {
    pub image_id: i64,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
}

// An annotated object. objects.json uses `names`, relationship endpoints use `name`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObjectRecord {
    pub object_id: i64,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    #[serde(default, deserialize_with = "lossy_text_vec")]
    pub names: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lossy_text_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
}

// All objects of one image
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageObjectsRecord {
    pub image_id: i64,
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
}

/// A relationship endpoint. Only `object_id` is required; when the box and a
/// name are present the endpoint can stand in for a missing object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndpointRecord {
    pub object_id: i64,
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub w: Option<i32>,
    #[serde(default)]
    pub h: Option<i32>,
    #[serde(default, deserialize_with = "lossy_text_vec")]
    pub names: Vec<String>,
    #[serde(default, deserialize_with = "lossy_text_opt")]
    pub name: Option<String>,
}

impl EndpointRecord {
    /// Build a standalone object from the endpoint, if it carries a box and a name.
    pub fn to_object(&self) -> Option<Object> {
        let (x, y, w, h) = (self.x?, self.y?, self.w?, self.h?);
        let names = match &self.name {
            Some(name) => vec![name.clone()],
            None if !self.names.is_empty() => self.names.clone(),
            None => return None,
        };
        Some(Object::new(self.object_id, BBox { x, y, w, h }, names))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelationshipRecord {
    #[serde(deserialize_with = "lossy_text")]
    pub predicate: String,
    pub subject: EndpointRecord,
    pub object: EndpointRecord,
}

// All relationships of one image
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageRelationshipsRecord {
    pub image_id: i64,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

/// Box in original pixel space, (x, y) being the 1-indexed top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn corners(&self) -> Corners {
        Corners {
            x1: self.x,
            y1: self.y,
            x2: self.x + self.w,
            y2: self.y + self.h,
        }
    }

    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }
}

/// Corner form (x1, y1, x2, y2) of a [`BBox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corners {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Corners {
    pub fn to_bbox(self) -> BBox {
        BBox {
            x: self.x1,
            y: self.y1,
            w: self.x2 - self.x1,
            h: self.y2 - self.y1,
        }
    }

    pub fn area(&self) -> i64 {
        (self.x2 - self.x1) as i64 * (self.y2 - self.y1) as i64
    }
}

/// An object of one image. `ids` starts as `[object_id]` and collects the ids
/// of every object absorbed into it by the merge engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub ids: Vec<i64>,
    pub bbox: BBox,
    pub names: Vec<String>,
}

impl Object {
    pub fn new(object_id: i64, bbox: BBox, names: Vec<String>) -> Self {
        Self {
            ids: vec![object_id],
            bbox,
            names,
        }
    }

    /// The object's own id. `ids` always starts with it: objects are built
    /// through [`Object::new`] and merging only appends absorbed ids.
    pub fn object_id(&self) -> i64 {
        self.ids[0]
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }
}

impl From<ObjectRecord> for Object {
    fn from(record: ObjectRecord) -> Self {
        let mut names = record.names;
        if names.is_empty() {
            names.extend(record.name);
        }
        Object::new(
            record.object_id,
            BBox::new(record.x, record.y, record.w, record.h),
            names,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub subject_id: i64,
    pub object_id: i64,
    pub predicate: String,
}

impl From<&RelationshipRecord> for Relationship {
    fn from(record: &RelationshipRecord) -> Self {
        Self {
            subject_id: record.subject.object_id,
            object_id: record.object.object_id,
            predicate: record.predicate.clone(),
        }
    }
}

/// Dataset split, encoded as 0 / 1 / 2 in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train = 0,
    Val = 1,
    Test = 2,
}

impl Split {
    /// Parse a split label; anything other than `val` or `test` is training data.
    pub fn from_label(label: &str) -> Self {
        match label {
            "val" => Split::Val,
            "test" => Split::Test,
            _ => Split::Train,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub image_id: i64,
    pub height: u32,
    pub width: u32,
    pub split: Option<Split>,
}

impl From<&ImageRecord> for Image {
    fn from(record: &ImageRecord) -> Self {
        Self {
            image_id: record.image_id,
            height: record.height,
            width: record.width,
            split: record.split.as_deref().map(Split::from_label),
        }
    }
}

/// Per-image inclusive ranges into a flat array; `(-1, -1)` marks an image
/// without entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrRanges {
    pub first: Vec<i32>,
    pub last: Vec<i32>,
}

impl CsrRanges {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            first: Vec::with_capacity(capacity),
            last: Vec::with_capacity(capacity),
        }
    }

    /// Append the range for the next image, given its offset and entry count.
    pub fn push_group(&mut self, start: i32, count: i32) {
        if count == 0 {
            self.first.push(-1);
            self.last.push(-1);
        } else {
            self.first.push(start);
            self.last.push(start + count - 1);
        }
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// Inclusive range of image `i`, or `None` if it has no entries.
    pub fn range(&self, i: usize) -> Option<(usize, usize)> {
        match (self.first[i], self.last[i]) {
            (first, last) if first < 0 || last < 0 => None,
            (first, last) => Some((first as usize, last as usize)),
        }
    }

    /// Whether the ranges cover `0..total` exactly once, in order.
    pub fn partitions(&self, total: usize) -> bool {
        if self.first.len() != self.last.len() {
            return false;
        }
        let mut next = 0i64;
        for (&first, &last) in self.first.iter().zip(&self.last) {
            match (first, last) {
                (-1, -1) => continue,
                (first, last) if first as i64 == next && last >= first => next = last as i64 + 1,
                _ => return false,
            }
        }
        next == total as i64
    }
}
