use log::{debug, info};

use crate::config::{Args, PipelineOptions};
use crate::corpus::Corpus;
use crate::error::Result;
use crate::io::{load_label_filters, read_corpus, write_dictionaries, write_roidb};
use crate::merge::{merge_duplicate_boxes, MergeStats};
use crate::objects::{encode_objects, ObjectEncoding, ObjectStats};
use crate::relationships::{encode_relationships, RelationshipEncoding, RelationshipStats};
use crate::split::{assign_splits, SplitAssignment};
use crate::utils::create_progress_bar;
use crate::vocab::Vocabulary;

/// Diagnostics collected over one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub consistent_relationships: usize,
    pub total_relationships: usize,
    pub boxes_kept: usize,
    pub boxes_total: usize,
    pub merge: MergeStats,
    pub objects: ObjectStats,
    pub relationships: RelationshipStats,
}

/// The encoded dataset: flat arrays, split labels and both vocabularies.
#[derive(Debug, Clone)]
pub struct Roidb {
    pub objects: ObjectEncoding,
    pub relationships: RelationshipEncoding,
    pub split: SplitAssignment,
    pub object_vocab: Vocabulary,
    pub predicate_vocab: Vocabulary,
    pub stats: RunStats,
}

impl Roidb {
    pub fn num_images(&self) -> usize {
        self.split.splits.len()
    }
}

/// Run every encoding stage over an in-memory corpus.
///
/// Each stage finishes over the whole corpus before the next one starts:
/// vocabularies need global counts, and relationship encoding needs the id
/// table produced by object encoding.
pub fn build_roidb(mut corpus: Corpus, options: &PipelineOptions) -> Result<Roidb> {
    let filters = &options.filters;
    let mut stats = RunStats::default();

    corpus.truncate_fraction(options.load_frac);
    info!("processing {} images", corpus.len());

    corpus.normalize_labels(
        filters.object_aliases.as_ref(),
        filters.predicate_aliases.as_ref(),
    );

    (stats.consistent_relationships, stats.total_relationships) = corpus.cross_check();
    (stats.boxes_kept, stats.boxes_total) = corpus.filter_small_boxes(options.min_box_area_frac);

    if options.merge_boxes {
        info!("merging boxes..");
        let pb = create_progress_bar(corpus.len() as u64, "Merge");
        stats.merge = merge_duplicate_boxes(&mut corpus.objects, &pb);
        pb.finish_with_message("Merge complete");
        stats.merge.print_summary();
    }

    let object_vocab = Vocabulary::for_objects(
        &corpus.objects,
        filters.object_list.as_ref(),
        options.num_objects,
    );
    object_vocab.print_summary("objects");
    let predicate_vocab = Vocabulary::for_predicates(
        &corpus.relationships,
        filters.predicate_list.as_ref(),
        options.num_predicates,
    );
    predicate_vocab.print_summary("predicates with enough instances");
    debug!("objects: {:?}", object_vocab.counts());
    debug!("relationships: {:?}", predicate_vocab.counts());

    let (objects, id_to_index, object_stats) = encode_objects(
        &corpus.images,
        &corpus.objects,
        &object_vocab,
        &options.long_sides,
    )?;
    object_stats.print_summary();
    stats.objects = object_stats;

    let (relationships, relationship_stats) =
        encode_relationships(&corpus.relationships, &id_to_index, &predicate_vocab)?;
    relationship_stats.print_summary();
    stats.relationships = relationship_stats;
    // The id table is only needed while relationships are encoded
    drop(id_to_index);

    info!("num objects = {}", objects.labels.len());
    info!("num relationships = {}", relationships.predicates.len());

    let split = assign_splits(&corpus.images, &options.split_mode);
    split.print_summary();

    Ok(Roidb {
        objects,
        relationships,
        split,
        object_vocab,
        predicate_vocab,
        stats,
    })
}

/// Main processing pipeline: read the annotations, encode them and write the
/// array store and dictionary file. Nothing is written if any stage fails.
pub fn process_dataset(args: &Args) -> Result<Roidb> {
    let mut options = args.to_options()?;
    options.filters = load_label_filters(args)?;

    let corpus = read_corpus(args)?;
    let roidb = build_roidb(corpus, &options)?;

    info!("Writing encoded arrays...");
    write_roidb(&args.output_dir, &roidb)?;
    write_dictionaries(&args.json_file, &roidb)?;
    info!("Conversion process completed successfully.");

    Ok(roidb)
}
