use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::{Args, LabelFilters};
use crate::corpus::Corpus;
use crate::dataset::Roidb;
use crate::error::Result;
use crate::text::{decode_lossy, normalize, AliasMap};
use crate::types::{ImageObjectsRecord, ImageRecord, ImageRelationshipsRecord};
use crate::utils::{create_output_directory, read_json};

pub const MANIFEST_FILE: &str = "manifest.json";
const DTYPE_I32: &str = "<i4";

/// Read the three annotation files and build an aligned corpus.
pub fn read_corpus(args: &Args) -> Result<Corpus> {
    info!("Loading image metadata from {}", args.image_data.display());
    let images: Vec<ImageRecord> = read_json(&args.image_data)?;
    info!("Loading objects from {}", args.objects.display());
    let objects: Vec<ImageObjectsRecord> = read_json(&args.objects)?;
    info!("Loading relationships from {}", args.relationships.display());
    let relationships: Vec<ImageRelationshipsRecord> = read_json(&args.relationships)?;
    info!("Read {} images.", images.len());
    Corpus::from_records(images, objects, relationships)
}

// Label files are free text; undecodable bytes are dropped like in annotations
fn read_text_lossy(path: &Path) -> Result<String> {
    Ok(decode_lossy(&fs::read(path)?))
}

/// Read an alias file, one comma-separated alias group per line.
pub fn read_alias_map(path: &Path) -> Result<AliasMap> {
    Ok(AliasMap::parse(&read_text_lossy(path)?))
}

/// Read an allow-list, one token per line. Entries are normalized the same way
/// annotation labels are.
pub fn read_list(path: &Path) -> Result<HashSet<String>> {
    let content = read_text_lossy(path)?;
    Ok(content
        .lines()
        .map(normalize)
        .filter(|token| !token.is_empty())
        .collect())
}

/// Load whichever alias files and allow-lists were given on the command line.
pub fn load_label_filters(args: &Args) -> Result<LabelFilters> {
    Ok(LabelFilters {
        object_aliases: args.object_alias.as_deref().map(read_alias_map).transpose()?,
        predicate_aliases: args.pred_alias.as_deref().map(read_alias_map).transpose()?,
        object_list: args.object_list.as_deref().map(read_list).transpose()?,
        predicate_list: args.pred_list.as_deref().map(read_list).transpose()?,
    })
}

/// One array of the on-disk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayEntry {
    pub name: String,
    pub file: String,
    pub dtype: String,
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub arrays: Vec<ArrayEntry>,
}

impl Manifest {
    pub fn get(&self, name: &str) -> Option<&ArrayEntry> {
        self.arrays.iter().find(|entry| entry.name == name)
    }
}

// Write `values` as raw little-endian int32 into `<dir>/<name>.bin`
fn write_array<I>(dir: &Path, name: &str, shape: Vec<usize>, values: I) -> Result<ArrayEntry>
where
    I: IntoIterator<Item = i32>,
{
    let file = format!("{}.bin", name);
    let mut writer = BufWriter::new(File::create(dir.join(&file))?);
    for value in values {
        writer.write_i32::<LittleEndian>(value)?;
    }
    writer.flush()?;
    Ok(ArrayEntry {
        name: name.to_string(),
        file,
        dtype: DTYPE_I32.to_string(),
        shape,
    })
}

/// Write every encoded array plus a manifest describing them into `dir`.
pub fn write_roidb(dir: &Path, roidb: &Roidb) -> Result<Manifest> {
    let dir = create_output_directory(dir)?;
    let objects = &roidb.objects;
    let relationships = &roidb.relationships;
    let num_images = objects.ranges.len();
    let mut manifest = Manifest::default();

    manifest.arrays.push(write_array(
        &dir,
        "labels",
        vec![objects.labels.len(), 1],
        objects.labels.iter().copied(),
    )?);
    for (size, boxes) in &objects.boxes {
        manifest.arrays.push(write_array(
            &dir,
            &format!("boxes_{}", size),
            vec![boxes.len(), 4],
            boxes.iter().flatten().copied(),
        )?);
    }
    manifest.arrays.push(write_array(
        &dir,
        "img_to_first_box",
        vec![num_images],
        objects.ranges.first.iter().copied(),
    )?);
    manifest.arrays.push(write_array(
        &dir,
        "img_to_last_box",
        vec![num_images],
        objects.ranges.last.iter().copied(),
    )?);

    manifest.arrays.push(write_array(
        &dir,
        "predicates",
        vec![relationships.predicates.len(), 1],
        relationships.predicates.iter().copied(),
    )?);
    manifest.arrays.push(write_array(
        &dir,
        "relationships",
        vec![relationships.pairs.len(), 2],
        relationships.pairs.iter().flatten().copied(),
    )?);
    manifest.arrays.push(write_array(
        &dir,
        "img_to_first_rel",
        vec![num_images],
        relationships.ranges.first.iter().copied(),
    )?);
    manifest.arrays.push(write_array(
        &dir,
        "img_to_last_rel",
        vec![num_images],
        relationships.ranges.last.iter().copied(),
    )?);

    manifest.arrays.push(write_array(
        &dir,
        "split",
        vec![roidb.split.splits.len()],
        roidb.split.splits.iter().copied(),
    )?);

    let manifest_file = BufWriter::new(File::create(dir.join(MANIFEST_FILE))?);
    serde_json::to_writer_pretty(manifest_file, &manifest)?;
    info!("Wrote {} arrays to {}", manifest.arrays.len(), dir.display());
    Ok(manifest)
}

/// Read one array back from a store written by [`write_roidb`].
pub fn read_array(dir: &Path, entry: &ArrayEntry) -> Result<Vec<i32>> {
    let len: usize = entry.shape.iter().product();
    let mut reader = BufReader::new(File::open(dir.join(&entry.file))?);
    let mut values = vec![0i32; len];
    reader.read_i32_into::<LittleEndian>(&mut values)?;
    Ok(values)
}

pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    read_json(&dir.join(MANIFEST_FILE))
}

/// Label and predicate dictionaries with their corpus counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionaries {
    pub label_to_idx: BTreeMap<String, i32>,
    pub idx_to_label: BTreeMap<i32, String>,
    pub predicate_to_idx: BTreeMap<String, i32>,
    pub idx_to_predicate: BTreeMap<i32, String>,
    pub predicate_count: BTreeMap<String, usize>,
    pub object_count: BTreeMap<String, usize>,
}

impl Dictionaries {
    pub fn from_roidb(roidb: &Roidb) -> Self {
        Self {
            label_to_idx: roidb.object_vocab.token_to_idx().clone(),
            idx_to_label: roidb.object_vocab.idx_to_token(),
            predicate_to_idx: roidb.predicate_vocab.token_to_idx().clone(),
            idx_to_predicate: roidb.predicate_vocab.idx_to_token(),
            predicate_count: roidb.predicate_vocab.counts().clone(),
            object_count: roidb.object_vocab.counts().clone(),
        }
    }
}

/// Write the dictionary JSON file.
pub fn write_dictionaries(path: &Path, roidb: &Roidb) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &Dictionaries::from_roidb(roidb))?;
    info!("Wrote {}", path.display());
    Ok(())
}
