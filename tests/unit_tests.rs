use std::collections::{HashMap, HashSet};

use indicatif::ProgressBar;
use vg2roidb::config::validate_fraction;
use vg2roidb::geometry::{encode_box, is_valid};
use vg2roidb::merge::{classify, iou, merge_duplicate_boxes, merge_image_objects, Overlap};
use vg2roidb::objects::resolve_label;
use vg2roidb::relationships::RelationshipStats;
use vg2roidb::split::split_thresholds;
use vg2roidb::text::{normalize, normalize_bytes, AliasMap};
use vg2roidb::utils::create_progress_bar;
use vg2roidb::types::{
    EndpointRecord, ImageObjectsRecord, ImageRecord, ImageRelationshipsRecord, ObjectRecord,
    RelationshipRecord,
};
use vg2roidb::{
    assign_splits, encode_objects, encode_relationships, BBox, Corpus, CsrRanges, Image, Object,
    PreprocessError, Relationship, Split, SplitMode, Vocabulary,
};

fn obj(id: i64, x: i32, y: i32, w: i32, h: i32, name: &str) -> Object {
    Object::new(id, BBox::new(x, y, w, h), vec![name.to_string()])
}

fn image(image_id: i64) -> Image {
    Image {
        image_id,
        height: 100,
        width: 100,
        split: None,
    }
}

fn rel(subject_id: i64, object_id: i64, predicate: &str) -> Relationship {
    Relationship {
        subject_id,
        object_id,
        predicate: predicate.to_string(),
    }
}

fn vocab_of(counts: &[(&str, usize)]) -> Vocabulary {
    let counts: HashMap<String, usize> = counts
        .iter()
        .map(|(token, count)| (token.to_string(), *count))
        .collect();
    Vocabulary::from_counts(counts, None)
}

#[test]
fn test_normalize() {
    assert_eq!(normalize("  Red Car! "), "red car");
    assert_eq!(normalize("café"), "cafe");
    assert_eq!(normalize("½ cup"), "half cup");
    assert_eq!(normalize("90°"), "90 degree");
    assert_eq!(normalize("T-Shirt"), "tshirt");
    assert_eq!(normalize("don't"), "dont");
    assert_eq!(normalize("a—b"), "ab");
    assert_eq!(normalize("Coke™…"), "coke");
    assert_eq!(normalize("5¢"), "5cent");
}

#[test]
fn test_normalize_is_idempotent() {
    for token in ["Man's Hat", "  wears ", "on top of", "façade"] {
        let once = normalize(token);
        assert_eq!(normalize(&once), once);
    }
}

#[test]
fn test_normalize_bytes_drops_invalid_sequences() {
    assert_eq!(normalize_bytes(b"ca\xfft"), "cat");
    assert_eq!(normalize_bytes(b"Dog\xe2\x82"), "dog");
    assert_eq!(normalize_bytes("Crème".as_bytes()), "creme");
    assert_eq!(normalize_bytes(b"\xff\xfe"), "");
}

#[test]
fn test_records_decode_labels_lossily() {
    let record: ObjectRecord = serde_json::from_slice(
        b"{\"object_id\": 1, \"x\": 0, \"y\": 0, \"w\": 5, \"h\": 5, \"names\": [\"ca\xfft\"]}",
    )
    .unwrap();
    assert_eq!(record.names, vec!["cat".to_string()]);

    let record: RelationshipRecord = serde_json::from_str(
        r#"{"predicate": "o\udc80n",
            "subject": {"object_id": 1, "name": "m\udfffan"},
            "object": {"object_id": 2, "names": ["hat"]}}"#,
    )
    .unwrap();
    assert_eq!(record.predicate, "on");
    assert_eq!(record.subject.name.as_deref(), Some("man"));
    assert_eq!(record.object.names, vec!["hat".to_string()]);
    assert_eq!(record.object.name, None);
}

#[test]
fn test_alias_map() {
    let aliases = AliasMap::parse("man,men,guy\nmen,gentleman\r\n\n");
    assert_eq!(aliases.resolve("men"), "man");
    assert_eq!(aliases.resolve("guy"), "man");
    assert_eq!(aliases.resolve("gentleman"), "man");
    assert_eq!(aliases.resolve("man"), "man");
    assert_eq!(aliases.resolve("dog"), "dog");
}

#[test]
fn test_iou() {
    let a = BBox::new(0, 0, 10, 10).corners();
    let b = BBox::new(5, 0, 10, 10).corners();
    let touching = BBox::new(10, 0, 10, 10).corners();

    assert_eq!(iou(&a, &a), 1.0);
    assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(iou(&a, &b), iou(&b, &a));
    assert_eq!(iou(&a, &touching), 0.0);
    assert_eq!(iou(&touching, &a), 0.0);
}

#[test]
fn test_iou_symmetric_over_grid() {
    let boxes: Vec<BBox> = (0..6)
        .flat_map(|i| (1..5).map(move |j| BBox::new(i * 3, i * 2, j * 4, j * 3 + i)))
        .collect();
    for a in &boxes {
        assert_eq!(iou(&a.corners(), &a.corners()), 1.0);
        for b in &boxes {
            assert_eq!(iou(&a.corners(), &b.corners()), iou(&b.corners(), &a.corners()));
        }
    }
}

#[test]
fn test_classify() {
    let cat = obj(1, 10, 10, 20, 20, "cat");
    let inner_cat = obj(2, 12, 12, 18, 18, "cat");
    let inner_dog = obj(3, 12, 12, 18, 18, "dog");
    assert_eq!(classify(&cat, &inner_cat), Overlap::Containment);
    assert_eq!(classify(&inner_cat, &cat), Overlap::Containment);
    assert_eq!(classify(&cat, &inner_dog), Overlap::None);

    // Identical boxes merge whatever their names
    let same_box = obj(4, 10, 10, 20, 20, "kitten");
    assert_eq!(classify(&cat, &same_box), Overlap::Identical);

    let big = obj(5, 0, 0, 100, 100, "tree");
    let shifted = obj(6, 10, 10, 100, 100, "tree");
    let shifted_other = obj(7, 10, 10, 100, 100, "bush");
    assert_eq!(classify(&big, &shifted), Overlap::HighOverlap);
    assert_eq!(classify(&big, &shifted_other), Overlap::None);

    let far = obj(8, 500, 500, 10, 10, "cat");
    assert_eq!(classify(&cat, &far), Overlap::None);
}

#[test]
fn test_merge_containment_uses_bounding_union() {
    let objects = vec![
        obj(1, 10, 10, 20, 20, "cat"),
        obj(2, 12, 12, 18, 18, "cat"),
    ];
    let (merged, stats) = merge_image_objects(objects);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].bbox, BBox::new(10, 10, 20, 20));
    assert_eq!(merged[0].ids, vec![1, 2]);
    assert_eq!(merged[0].names, vec!["cat".to_string()]);
    assert_eq!(stats.containment, 1);
    assert_eq!(stats.objects_before, 2);
    assert_eq!(stats.objects_after, 1);
}

#[test]
fn test_merge_identical_uses_mean() {
    let objects = vec![
        obj(1, 0, 0, 100, 100, "cat"),
        obj(2, 2, 2, 100, 100, "kitty"),
    ];
    let (merged, stats) = merge_image_objects(objects);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].bbox, BBox::new(1, 1, 100, 100));
    assert_eq!(merged[0].names, vec!["cat".to_string(), "kitty".to_string()]);
    assert_eq!(stats.identical, 1);
}

#[test]
fn test_merge_prominent_type_wins() {
    let objects = vec![
        obj(1, 0, 0, 100, 100, "cat"),
        obj(2, 2, 2, 100, 100, "cat"),
        obj(3, 20, 20, 10, 10, "cat"),
    ];
    let (merged, stats) = merge_image_objects(objects);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].bbox, BBox::new(0, 0, 102, 102));
    assert_eq!(merged[0].ids, vec![1, 2, 3]);
    assert_eq!(merged[0].names, vec!["cat".to_string()]);
    // All partners are counted under the most prominent type
    assert_eq!(stats.containment, 2);
    assert_eq!(stats.identical, 0);
}

#[test]
fn test_merge_skips_absorbed_objects() {
    // The third box overlaps the second one, which is already absorbed
    let objects = vec![
        obj(1, 0, 0, 100, 100, "x"),
        obj(2, 2, 2, 100, 100, "y"),
        obj(3, 4, 4, 100, 100, "z"),
    ];
    let (merged, _) = merge_image_objects(objects);

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].ids, vec![1, 2]);
    assert_eq!(merged[1].ids, vec![3]);
    assert_eq!(merged[1].bbox, BBox::new(4, 4, 100, 100));
}

#[test]
fn test_merge_conserves_object_ids() {
    let names = ["cat", "dog", "cat", "tree"];
    let mut images: Vec<Vec<Object>> = (0..8)
        .map(|img| {
            (0..12)
                .map(|k| {
                    let id = img * 100 + k;
                    let x = ((k * 7 + img) % 5) as i32 * 4;
                    let y = ((k * 3) % 4) as i32 * 5;
                    let size = 20 + ((k + img) % 3) as i32 * 2;
                    obj(id, x, y, size, size, names[(k % 4) as usize])
                })
                .collect()
        })
        .collect();
    let original: Vec<HashSet<i64>> = images
        .iter()
        .map(|objs| objs.iter().map(|o| o.object_id()).collect())
        .collect();

    let stats = merge_duplicate_boxes(&mut images, &ProgressBar::hidden());

    assert_eq!(stats.objects_before, 96);
    assert_eq!(stats.objects_before - stats.objects_after, stats.merged());
    for (objs, ids) in images.iter().zip(&original) {
        let merged_ids: Vec<i64> = objs.iter().flat_map(|o| o.ids.iter().copied()).collect();
        assert_eq!(merged_ids.len(), ids.len());
        assert_eq!(merged_ids.into_iter().collect::<HashSet<_>>(), *ids);
    }
}

#[test]
fn test_merge_keeps_seed_id_first() {
    let objects = vec![
        obj(4, 10, 10, 20, 20, "cat"),
        obj(2, 12, 12, 18, 18, "cat"),
    ];
    let (merged, _) = merge_image_objects(objects);
    assert_eq!(merged[0].object_id(), 4);
    assert_eq!(merged[0].ids, vec![4, 2]);
}

#[test]
fn test_merge_advances_progress_per_image() {
    let mut images = vec![
        vec![obj(1, 0, 0, 10, 10, "cat")],
        vec![],
        vec![obj(2, 0, 0, 10, 10, "cat"), obj(3, 0, 0, 10, 10, "dog")],
    ];
    let pb = create_progress_bar(images.len() as u64, "Merge");

    merge_duplicate_boxes(&mut images, &pb);

    assert_eq!(pb.length(), 3);
    assert_eq!(pb.position(), 3);
    assert_eq!(images[2].len(), 1);
}

#[test]
fn test_vocabulary_is_lexicographic() {
    let tokens = ["zebra", "apple", "mango", "apple"];
    let vocab = Vocabulary::from_counts(vg2roidb::vocab::count_tokens(tokens, None), None);

    assert_eq!(vocab.len(), 3);
    assert_eq!(vocab.index("apple"), Some(1));
    assert_eq!(vocab.index("mango"), Some(2));
    assert_eq!(vocab.index("zebra"), Some(3));
    assert_eq!(vocab.token(1), Some("apple"));
    assert_eq!(vocab.token(0), None);
    assert_eq!(vocab.token(4), None);
    assert_eq!(vocab.count("apple"), 2);
    assert_eq!(vocab.count("kiwi"), 0);
}

#[test]
fn test_vocabulary_independent_of_order() {
    let forward = ["on", "has", "wearing", "on", "near", "has", "on"];
    let mut backward = forward;
    backward.reverse();

    let a = Vocabulary::from_counts(vg2roidb::vocab::count_tokens(forward, None), None);
    let b = Vocabulary::from_counts(vg2roidb::vocab::count_tokens(backward, None), None);
    assert_eq!(a, b);
    assert_eq!(a.idx_to_token(), b.idx_to_token());
}

#[test]
fn test_vocabulary_allow_list() {
    let allowed: HashSet<String> = ["apple", "zebra"].iter().map(|s| s.to_string()).collect();
    let tokens = ["zebra", "apple", "mango", "apple"];
    let vocab = Vocabulary::from_counts(
        vg2roidb::vocab::count_tokens(tokens, Some(&allowed)),
        None,
    );

    assert_eq!(vocab.len(), 2);
    assert_eq!(vocab.index("apple"), Some(1));
    assert_eq!(vocab.index("zebra"), Some(2));
    assert!(!vocab.contains("mango"));
}

#[test]
fn test_vocabulary_limit() {
    let counts = [("a", 3), ("b", 1), ("c", 3), ("d", 2)];
    let map = |pairs: &[(&str, usize)]| -> HashMap<String, usize> {
        pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
    };

    let top2 = Vocabulary::from_counts(map(&counts), Some(2));
    assert_eq!(top2.token_to_idx().keys().collect::<Vec<_>>(), vec!["a", "c"]);
    assert_eq!(top2.index("c"), Some(2));

    let top3 = Vocabulary::from_counts(map(&counts), Some(3));
    assert_eq!(top3.index("d"), Some(3));
    assert!(!top3.contains("b"));

    let unlimited = Vocabulary::from_counts(map(&counts), Some(0));
    assert_eq!(unlimited.len(), 4);
}

#[test]
fn test_encode_box() {
    // 200 wide, 100 high, scaled to 512: scale 2.56
    let encoded = encode_box(&BBox::new(1, 1, 100, 50), 100, 200, 512);
    assert_eq!(encoded, [128, 64, 256, 128]);

    // Box running off the right edge is shrunk to end at the border
    let encoded = encode_box(&BBox::new(200, 100, 50, 50), 100, 200, 512);
    assert_eq!(encoded, [510, 317, 3, 128]);
}

#[test]
fn test_encode_box_always_positive() {
    for long_side in [4u32, 5, 16, 512, 1024] {
        for (x, y, w, h) in [
            (1, 1, 1, 1),
            (0, 0, 1, 1),
            (-5, -5, 3, 3),
            (640, 480, 1, 1),
            (900, 900, 500, 500),
            (1, 1, 640, 480),
            (320, 10, 2, 470),
        ] {
            let encoded = encode_box(&BBox::new(x, y, w, h), 480, 640, long_side);
            assert!(is_valid(&encoded), "{:?} at {}", encoded, long_side);
            assert!(encoded[2] <= long_side as i32);
            assert!(encoded[3] <= long_side as i32);
        }
    }
}

#[test]
fn test_encode_box_zero_sized_image() {
    let encoded = encode_box(&BBox::new(10, 10, 5, 5), 0, 0, 512);
    assert!(!is_valid(&encoded));

    // One missing side still leaves a usable scale
    let encoded = encode_box(&BBox::new(1, 1, 5, 5), 0, 100, 512);
    assert!(is_valid(&encoded));
}

#[test]
fn test_encode_box_degenerate_input() {
    let encoded = encode_box(&BBox::new(10, 10, 0, 10), 100, 100, 512);
    assert!(!is_valid(&encoded));
}

#[test]
fn test_resolve_label() {
    let vocab = vocab_of(&[("cat", 5), ("kitty", 2), ("animal", 5)]);
    let names = |n: &[&str]| n.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    assert_eq!(resolve_label(&names(&["kitty", "cat"]), &vocab), Some("cat"));
    assert_eq!(resolve_label(&names(&["dog", "kitty"]), &vocab), Some("kitty"));
    // First name wins a tie
    assert_eq!(resolve_label(&names(&["animal", "cat"]), &vocab), Some("animal"));
    assert_eq!(resolve_label(&names(&["dog"]), &vocab), None);
}

#[test]
fn test_csr_ranges() {
    let mut ranges = CsrRanges::default();
    ranges.push_group(0, 2);
    ranges.push_group(2, 0);
    ranges.push_group(2, 1);
    assert_eq!(ranges.first, vec![0, -1, 2]);
    assert_eq!(ranges.last, vec![1, -1, 2]);
    assert_eq!(ranges.range(1), None);
    assert_eq!(ranges.range(2), Some((2, 2)));
    assert!(ranges.partitions(3));
    assert!(!ranges.partitions(4));

    let gap = CsrRanges {
        first: vec![0, 3],
        last: vec![1, 3],
    };
    assert!(!gap.partitions(4));
}

fn encoding_fixture() -> (Vec<Image>, Vec<Vec<Object>>, Vocabulary) {
    let images = vec![image(10), image(11), image(12)];
    let mut merged = obj(3, 40, 40, 20, 20, "cat");
    merged.ids.push(4);
    let objects = vec![
        vec![
            obj(1, 1, 1, 10, 10, "cat"),
            obj(5, 50, 50, 10, 10, "cat"),
            obj(2, 20, 20, 10, 10, "dog"),
        ],
        vec![],
        vec![merged],
    ];
    (images, objects, vocab_of(&[("cat", 3)]))
}

#[test]
fn test_encode_objects() {
    let (images, objects, vocab) = encoding_fixture();
    let (encoding, ids, stats) = encode_objects(&images, &objects, &vocab, &[512, 1024]).unwrap();

    assert_eq!(encoding.labels, vec![1, 1, 1]);
    assert_eq!(encoding.ranges.first, vec![0, -1, 2]);
    assert_eq!(encoding.ranges.last, vec![1, -1, 2]);
    assert!(encoding.ranges.partitions(encoding.labels.len()));
    assert_eq!(encoding.boxes[&512].len(), 3);
    assert_eq!(encoding.boxes[&1024].len(), 3);

    assert_eq!(ids.get(0, 1), Some(0));
    assert_eq!(ids.get(0, 5), Some(1));
    assert_eq!(ids.get(0, 2), None);
    assert_eq!(ids.get(2, 3), Some(2));
    assert_eq!(ids.get(2, 4), Some(2));

    assert_eq!(stats.kept, 3);
    assert_eq!(stats.dropped_out_of_vocabulary, 1);
    assert_eq!(stats.images_with_objects, 2);
}

#[test]
fn test_encode_objects_rejects_degenerate_box() {
    let images = vec![image(1)];
    let objects = vec![vec![obj(1, 10, 10, 0, 10, "cat")]];
    let vocab = vocab_of(&[("cat", 1)]);

    let result = encode_objects(&images, &objects, &vocab, &[512]);
    assert!(matches!(
        result,
        Err(PreprocessError::DegenerateBox { image_id: 1, long_side: 512, .. })
    ));
}

#[test]
fn test_encode_objects_rejects_zero_sized_image() {
    let images = vec![Image {
        image_id: 9,
        height: 0,
        width: 0,
        split: None,
    }];
    let objects = vec![vec![obj(1, 10, 10, 5, 5, "cat")]];
    let vocab = vocab_of(&[("cat", 1)]);

    let result = encode_objects(&images, &objects, &vocab, &[512]);
    assert!(matches!(
        result,
        Err(PreprocessError::DegenerateBox { image_id: 9, .. })
    ));
}

#[test]
fn test_encode_objects_misaligned() {
    let images = vec![image(1), image(2)];
    let objects = vec![vec![]];
    let result = encode_objects(&images, &objects, &Vocabulary::default(), &[512]);
    assert!(matches!(result, Err(PreprocessError::Misaligned { .. })));
}

#[test]
fn test_encode_relationships() {
    let (images, objects, vocab) = encoding_fixture();
    let (_, ids, _) = encode_objects(&images, &objects, &vocab, &[512]).unwrap();
    let relationships = vec![
        vec![rel(1, 5, "on"), rel(1, 2, "on"), rel(1, 5, "flying")],
        vec![],
        vec![rel(3, 4, "on")],
    ];
    let predicates = vocab_of(&[("on", 3)]);

    let (encoding, stats) = encode_relationships(&relationships, &ids, &predicates).unwrap();

    assert_eq!(encoding.predicates, vec![1]);
    assert_eq!(encoding.pairs, vec![[0, 1]]);
    assert_eq!(encoding.ranges.first, vec![0, -1, -1]);
    assert_eq!(encoding.ranges.last, vec![0, -1, -1]);
    assert_eq!(
        stats,
        RelationshipStats {
            filtered_by_object: 1,
            filtered_by_predicate: 1,
            filtered_by_duplicate: 1,
            kept: 1,
            images_with_relationships: 1,
            images: 3,
        }
    );
    for pair in &encoding.pairs {
        assert_ne!(pair[0], pair[1]);
    }
}

#[test]
fn test_split_thresholds() {
    assert_eq!(split_thresholds(10, 0.7, 0.85), (7, 8));
    assert_eq!(split_thresholds(10, 0.7, 0.7), (7, 7));
    assert_eq!(split_thresholds(0, 0.7, 0.85), (0, 0));
}

#[test]
fn test_assign_splits_by_fraction() {
    let images: Vec<Image> = (0..10).map(image).collect();
    let mode = SplitMode::Fractions {
        train_frac: 0.7,
        val_frac: 0.85,
        shuffle: false,
        seed: 42,
    };
    let assignment = assign_splits(&images, &mode);

    assert_eq!(assignment.splits, vec![0, 0, 0, 0, 0, 0, 0, 1, 2, 2]);
    assert_eq!(assignment.counts, [7, 1, 2]);
    assert_eq!(assign_splits(&images, &mode), assignment);
}

#[test]
fn test_assign_splits_shuffled() {
    let images: Vec<Image> = (0..50).map(image).collect();
    let mode = SplitMode::Fractions {
        train_frac: 0.6,
        val_frac: 0.8,
        shuffle: true,
        seed: 7,
    };
    let first = assign_splits(&images, &mode);
    let second = assign_splits(&images, &mode);

    assert_eq!(first, second);
    assert_eq!(first.counts, [30, 10, 10]);
    assert_eq!(first.splits.len(), 50);
}

#[test]
fn test_assign_splits_from_input() {
    let mut images: Vec<Image> = (0..3).map(image).collect();
    images[0].split = Some(Split::Val);
    images[2].split = Some(Split::Test);

    let assignment = assign_splits(&images, &SplitMode::FromInput);
    assert_eq!(assignment.splits, vec![1, 0, 2]);
    assert_eq!(assignment.counts, [1, 1, 1]);
    assert_eq!(Split::from_label("train"), Split::Train);
    assert_eq!(Split::from_label("holdout"), Split::Train);
}

fn object_record(object_id: i64, x: i32, y: i32, w: i32, h: i32, name: &str) -> ObjectRecord {
    ObjectRecord {
        object_id,
        x,
        y,
        w,
        h,
        names: vec![name.to_string()],
        name: None,
    }
}

fn endpoint(object_id: i64) -> EndpointRecord {
    EndpointRecord {
        object_id,
        x: None,
        y: None,
        w: None,
        h: None,
        names: vec![],
        name: None,
    }
}

fn image_record(image_id: i64) -> ImageRecord {
    ImageRecord {
        image_id,
        width: 100,
        height: 100,
        split: None,
    }
}

#[test]
fn test_corpus_rejects_misaligned_ids() {
    let images = vec![image_record(1), image_record(2)];
    let objects = vec![
        ImageObjectsRecord { image_id: 1, objects: vec![] },
        ImageObjectsRecord { image_id: 3, objects: vec![] },
    ];
    let relationships = vec![
        ImageRelationshipsRecord { image_id: 1, relationships: vec![] },
        ImageRelationshipsRecord { image_id: 2, relationships: vec![] },
    ];

    let result = Corpus::from_records(images, objects, relationships);
    assert!(matches!(
        result,
        Err(PreprocessError::Misaligned { position: 1, .. })
    ));
}

#[test]
fn test_corpus_rejects_length_mismatch() {
    let result = Corpus::from_records(
        vec![image_record(1)],
        vec![],
        vec![ImageRelationshipsRecord { image_id: 1, relationships: vec![] }],
    );
    assert!(matches!(result, Err(PreprocessError::Misaligned { .. })));
}

#[test]
fn test_corpus_syncs_relationship_endpoints() {
    let mut subject = endpoint(7);
    subject.x = Some(5);
    subject.y = Some(5);
    subject.w = Some(30);
    subject.h = Some(30);
    subject.name = Some("Man".to_string());

    let corpus = Corpus::from_records(
        vec![image_record(1)],
        vec![ImageObjectsRecord {
            image_id: 1,
            objects: vec![object_record(1, 10, 10, 20, 20, "hat")],
        }],
        vec![ImageRelationshipsRecord {
            image_id: 1,
            relationships: vec![
                RelationshipRecord {
                    predicate: "wears".to_string(),
                    subject: subject.clone(),
                    object: endpoint(1),
                },
                RelationshipRecord {
                    predicate: "has".to_string(),
                    subject,
                    object: endpoint(99),
                },
            ],
        }],
    )
    .unwrap();

    // Endpoint 7 carries a box and is added once; endpoint 99 has no box
    assert_eq!(corpus.objects[0].len(), 2);
    assert_eq!(corpus.objects[0][1].ids, vec![7]);
    assert_eq!(corpus.objects[0][1].names, vec!["Man".to_string()]);
    assert_eq!(corpus.relationships[0][0], rel(7, 1, "wears"));
    assert_eq!(corpus.cross_check(), (1, 2));
}

#[test]
fn test_corpus_filters_small_boxes() {
    let mut corpus = Corpus {
        images: vec![image(1)],
        objects: vec![vec![
            obj(1, 0, 0, 10, 10, "a"),
            obj(2, 0, 0, 11, 10, "b"),
            obj(3, 0, 0, 0, 50, "c"),
            Object::new(4, BBox::new(0, 0, 50, 50), vec![]),
        ]],
        relationships: vec![vec![]],
    };

    let (kept, total) = corpus.filter_small_boxes(0.01);
    assert_eq!((kept, total), (1, 4));
    assert_eq!(corpus.objects[0][0].object_id(), 2);
}

#[test]
fn test_corpus_normalize_and_truncate() {
    let mut corpus = Corpus {
        images: vec![image(1), image(2), image(3)],
        objects: vec![vec![obj(1, 0, 0, 10, 10, " Men ")], vec![], vec![]],
        relationships: vec![vec![rel(1, 1, "Wearing.")], vec![], vec![]],
    };
    let aliases = AliasMap::parse("man,men");

    corpus.normalize_labels(Some(&aliases), None);
    assert_eq!(corpus.objects[0][0].names, vec!["man".to_string()]);
    assert_eq!(corpus.relationships[0][0].predicate, "wearing");

    corpus.truncate_fraction(0.5);
    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus.objects.len(), 1);
    assert_eq!(corpus.relationships.len(), 1);
}

#[test]
fn test_validate_fraction() {
    assert!(validate_fraction("0.5").is_ok());
    assert!(validate_fraction("1.0").is_ok());
    assert!(validate_fraction("0.0").is_ok());
    assert!(validate_fraction("-0.1").is_err());
    assert!(validate_fraction("1.1").is_err());
    assert!(validate_fraction("abc").is_err());
}
