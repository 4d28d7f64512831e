use index_core::persist::{self, IndexPaths};
use index_core::stemmer::StemmerKind;
use index_core::{build_blocks, merge_blocks, Document, Error, Pipeline, PipelineConfig, PostingsRecord, QueryEngine};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::default()).unwrap()
}

fn animals() -> Vec<Document> {
    vec![
        Document::new("1", "el gato come pescado"),
        Document::new("2", "el perro come carne"),
        Document::new("3", "el gato duerme"),
    ]
}

fn news() -> Vec<Document> {
    vec![
        Document::new("n1", "El gobierno anunció nuevas medidas económicas para la industria"),
        Document::new("n2", "La selección nacional ganó el partido de fútbol en la final"),
        Document::new("n3", "Nuevas medidas sanitarias en hospitales públicos del país"),
        Document::new("n4", "El partido de gobierno presentó su candidato presidencial"),
        Document::new("n5", "Los hospitales reciben nuevos equipos médicos del gobierno"),
        Document::new("n6", "La industria del fútbol mueve millones cada temporada"),
        Document::new("n7", "el de la y"),
    ]
}

fn build_index(dir: &Path, docs: Vec<Document>, block_size: usize) -> IndexPaths {
    let paths = IndexPaths::new(dir);
    build_blocks(&pipeline(), &paths, docs, block_size).unwrap();
    merge_blocks(&paths.blocks_dir(), &paths).unwrap();
    paths
}

fn read_records(paths: &IndexPaths) -> Vec<PostingsRecord> {
    fs::read_to_string(paths.postings())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn gato_ranks_matching_documents() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), animals(), 2);
    let engine = QueryEngine::open(&paths, pipeline()).unwrap();

    let out = engine.query("gato", 10).unwrap();
    let ids: Vec<&str> = out.results.iter().map(|d| d.doc_id.as_str()).collect();
    // doc 3 has fewer other terms, so its vector is closer to the query
    assert_eq!(ids, vec!["3", "1"]);
    assert!(out.results.iter().all(|d| d.score > 0.0 && d.score <= 1.0 + 1e-9));
}

#[test]
fn stopword_only_query_is_empty() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), animals(), 10);
    let engine = QueryEngine::open(&paths, pipeline()).unwrap();

    let out = engine.query("el", 10).unwrap();
    assert!(out.results.is_empty());
    assert_eq!(out.bytes_read, 0);
    assert_eq!(out.elapsed_s, 0.0);
}

#[test]
fn out_of_vocabulary_query_is_empty() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), animals(), 10);
    let engine = QueryEngine::open(&paths, pipeline()).unwrap();

    let out = engine.query("astronauta", 10).unwrap();
    assert!(out.results.is_empty());
    assert_eq!(out.bytes_read, 0);
}

#[test]
fn df_matches_distinct_documents_in_postings() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 2);
    let vocab = persist::load_vocab(&paths).unwrap();

    for record in read_records(&paths) {
        let distinct: HashSet<&str> = record.postings.iter().map(|p| p.doc_id.as_str()).collect();
        assert_eq!(record.df as usize, distinct.len(), "term {}", record.term);
        assert_eq!(vocab[&record.term].df, record.df);
    }
}

#[test]
fn norms_match_full_scan_of_postings() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 3);
    let norms = persist::load_doc_norms(&paths).unwrap();

    let mut sq: HashMap<String, f64> = HashMap::new();
    for record in read_records(&paths) {
        for p in record.postings {
            *sq.entry(p.doc_id).or_insert(0.0) += p.weight * p.weight;
        }
    }
    assert_eq!(sq.len(), norms.len());
    for (doc, sum) in sq {
        assert!((norms[&doc] - sum.sqrt()).abs() < 1e-9, "doc {doc}");
    }
}

#[test]
fn dictionary_offsets_locate_their_records() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 2);
    let vocab = persist::load_vocab(&paths).unwrap();
    let store = fs::read(paths.postings()).unwrap();

    let mut total = 0u64;
    for (term, entry) in &vocab {
        let start = entry.offset as usize;
        let slice = &store[start..start + entry.length as usize];
        assert_eq!(*slice.last().unwrap(), b'\n');
        let record: PostingsRecord = serde_json::from_slice(slice).unwrap();
        assert_eq!(&record.term, term);
        total += entry.length;
    }
    assert_eq!(total, store.len() as u64);
}

#[test]
fn terms_are_strictly_ascending() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 2);
    let terms: Vec<String> = read_records(&paths).into_iter().map(|r| r.term).collect();
    assert!(terms.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn merging_same_blocks_twice_is_byte_identical() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 2);
    let first = fs::read(paths.postings()).unwrap();
    let first_vocab = fs::read(paths.vocab()).unwrap();

    merge_blocks(&paths.blocks_dir(), &paths).unwrap();
    assert_eq!(first, fs::read(paths.postings()).unwrap());
    assert_eq!(first_vocab, fs::read(paths.vocab()).unwrap());
}

#[test]
fn block_size_does_not_change_the_index() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let pa = build_index(a.path(), news(), 1);
    let pb = build_index(b.path(), news(), 100);
    assert_eq!(fs::read(pa.postings()).unwrap(), fs::read(pb.postings()).unwrap());
}

#[test]
fn persisted_document_count_matches_norm_table() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 2);
    let meta = persist::load_meta(&paths).unwrap();
    // n7 is all stopwords and never indexed
    assert_eq!(meta.num_docs, 6);
    assert_eq!(persist::load_doc_norms(&paths).unwrap().len(), 6);

    let engine = QueryEngine::open(&paths, pipeline()).unwrap();
    assert_eq!(engine.num_docs(), 6);
}

#[test]
fn bytes_read_sums_touched_dictionary_lengths() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 2);
    let engine = QueryEngine::open(&paths, pipeline()).unwrap();
    let p = pipeline();

    let query = "gobierno hospitales gobierno dragones";
    let distinct: HashSet<String> = p.preprocess(query).into_iter().collect();
    let expected: u64 = distinct.iter().filter_map(|t| engine.vocab_entry(t)).map(|e| e.length).sum();

    let out = engine.query(query, 10).unwrap();
    assert!(expected > 0);
    assert_eq!(out.bytes_read, expected);
}

#[test]
fn results_are_capped_at_k_and_sorted() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 2);
    let engine = QueryEngine::open(&paths, pipeline()).unwrap();

    let all = engine.query("gobierno industria fútbol hospitales", 100).unwrap();
    assert_eq!(all.results.len(), all.candidates);
    assert!(all.candidates >= 3);

    let top = engine.query("gobierno industria fútbol hospitales", 2).unwrap();
    assert_eq!(top.results.len(), 2);
    assert_eq!(top.results, all.results[..2].to_vec());
    assert!(all.results.windows(2).all(|w| w[0].score >= w[1].score));

    assert!(engine.query("gobierno", 0).unwrap().results.is_empty());
}

#[test]
fn huge_k_returns_every_candidate() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), animals(), 2);
    let engine = QueryEngine::open(&paths, pipeline()).unwrap();

    let out = engine.query("gato", usize::MAX).unwrap();
    assert_eq!(out.results.len(), out.candidates);
    assert_eq!(out.results.len(), 2);
}

#[test]
fn corrupt_record_is_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), news(), 2);
    let p = pipeline();
    let gobierno = p.preprocess("gobierno").remove(0);
    let hospital = p.preprocess("hospitales").remove(0);

    let vocab = persist::load_vocab(&paths).unwrap();
    let entry = vocab[&gobierno];
    let mut store = fs::read(paths.postings()).unwrap();
    let start = entry.offset as usize;
    for b in &mut store[start..start + entry.length as usize - 1] {
        *b = b'#';
    }
    fs::write(paths.postings(), store).unwrap();

    let engine = QueryEngine::open(&paths, pipeline()).unwrap();
    let out = engine.query("gobierno hospitales", 10).unwrap();
    assert_eq!(out.bytes_read, entry.length + vocab[&hospital].length);
    let ids: HashSet<&str> = out.results.iter().map(|d| d.doc_id.as_str()).collect();
    assert_eq!(ids, HashSet::from(["n3", "n5"]));
}

#[test]
fn opening_unbuilt_index_fails() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    assert!(matches!(QueryEngine::open(&paths, pipeline()), Err(Error::IndexNotBuilt(_))));

    build_blocks(&pipeline(), &paths, animals(), 10).unwrap();
    assert!(matches!(QueryEngine::open(&paths, pipeline()), Err(Error::IndexNotBuilt(_))));
}

#[test]
fn query_pipeline_uses_stopwords_saved_at_build_time() {
    let dir = tempdir().unwrap();
    let list = dir.path().join("stop.txt");
    fs::write(&list, "gato\n").unwrap();
    let config = PipelineConfig { stopwords_path: Some(list.clone()), builtin_stopwords: false, ..Default::default() };
    let paths = IndexPaths::new(dir.path().join("index"));
    build_blocks(&Pipeline::new(config).unwrap(), &paths, news(), 3).unwrap();
    merge_blocks(&paths.blocks_dir(), &paths).unwrap();
    fs::remove_file(&list).unwrap();

    let restored = Pipeline::for_index(&paths).unwrap();
    assert_eq!(restored.stopwords(), &HashSet::from(["gato".to_string()]));
    let engine = QueryEngine::open(&paths, restored).unwrap();
    let ids: HashSet<String> = engine.query("el", 10).unwrap().results.into_iter().map(|d| d.doc_id).collect();
    assert_eq!(ids, HashSet::from(["n1", "n2", "n4", "n7"].map(String::from)));

    // the bundled list would drop "el" and silently diverge from the index
    assert!(matches!(QueryEngine::open(&paths, pipeline()), Err(Error::PipelineMismatch(_))));
}

#[test]
fn query_pipeline_with_other_stemmer_is_rejected() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), animals(), 2);
    let suffix = Pipeline::new(PipelineConfig { stemmer: StemmerKind::Suffix, ..Default::default() }).unwrap();
    assert!(matches!(QueryEngine::open(&paths, suffix), Err(Error::PipelineMismatch(_))));
}

#[test]
fn restoring_pipeline_of_unbuilt_index_fails() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    assert!(matches!(Pipeline::for_index(&paths), Err(Error::IndexNotBuilt(_))));

    persist::save_pipeline_config(&paths, &PipelineConfig::default()).unwrap();
    assert!(matches!(Pipeline::for_index(&paths), Err(Error::IndexNotBuilt(p)) if p == paths.stopwords()));
}

#[test]
fn mismatched_document_count_is_rejected() {
    let dir = tempdir().unwrap();
    let paths = build_index(dir.path(), animals(), 10);
    let mut meta = persist::load_meta(&paths).unwrap();
    meta.num_docs += 1;
    persist::write_json(&paths.meta(), &meta).unwrap();

    assert!(matches!(
        QueryEngine::open(&paths, pipeline()),
        Err(Error::Inconsistent { meta_docs: 4, norm_docs: 3 })
    ));
}

#[test]
fn empty_corpus_builds_a_block_but_cannot_merge() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let report = build_blocks(&pipeline(), &paths, vec![Document::new("x", "¿¡!?")], 10).unwrap();
    assert_eq!(report.blocks_written(), 1);
    assert!(matches!(merge_blocks(&paths.blocks_dir(), &paths), Err(Error::EmptyCorpus)));
}
