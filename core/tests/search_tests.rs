use docsift_core::{build, Document, Index, IndexConfig, IndexHandle, Query, ScoredResult};

fn guide_docs() -> Vec<Document> {
    vec![
        Document::new().with("filename", "a.md").with("content", "getting started guide"),
        Document::new().with("filename", "b.md").with("content", "advanced configuration"),
    ]
}

fn filenames(index: &Index, hits: &[ScoredResult]) -> Vec<String> {
    hits.iter()
        .map(|h| index.document(h.doc_id).and_then(|d| d.get("filename")).unwrap_or_default().to_string())
        .collect()
}

fn corpus() -> Vec<Document> {
    let texts = [
        "rust search engine with tf idf ranking",
        "python search scripts",
        "rust rust rust",
        "ranking documents by relevance in rust",
        "search search search engine",
        "unrelated cooking recipes",
        "rust search",
        "rust search",
    ];
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Document::new().with("filename", format!("{i}.md")).with("content", *t).with("lang", if i % 2 == 0 { "en" } else { "de" }))
        .collect()
}

#[test]
fn getting_started_ranks_the_guide_first() {
    let index = build(&guide_docs(), ["content"], ["filename"]).unwrap();
    let hits = index.search(&Query::new("getting started"));
    let names = filenames(&index, &hits);
    assert_eq!(names.first().map(String::as_str), Some("a.md"));
    let a = names.iter().position(|n| n == "a.md");
    let b = names.iter().position(|n| n == "b.md");
    assert!(b.map_or(true, |b| a.unwrap() < b));
}

#[test]
fn unknown_term_returns_nothing() {
    let index = build(&guide_docs(), ["content"], ["filename"]).unwrap();
    assert!(index.search(&Query::new("nonexistent")).is_empty());
}

#[test]
fn limit_one_returns_only_the_guide() {
    let index = build(&guide_docs(), ["content"], ["filename"]).unwrap();
    let hits = index.search(&Query::new("guide").limit(1));
    assert_eq!(filenames(&index, &hits), vec!["a.md"]);
}

#[test]
fn filter_restricts_candidates_even_without_score() {
    let index = build(&guide_docs(), ["content"], ["filename"]).unwrap();
    assert!(index.search(&Query::new("guide").filter("filename", "b.md")).is_empty());
    let hits = index.search(&Query::new("guide").filter("filename", "a.md"));
    assert_eq!(filenames(&index, &hits), vec!["a.md"]);
}

#[test]
fn unmatched_filter_value_is_empty_for_any_text() {
    let index = build(&corpus(), ["content"], ["filename", "lang"]).unwrap();
    for text in ["rust", "", "search engine", "zzz"] {
        assert!(index.search(&Query::new(text).filter("lang", "fr")).is_empty(), "{text}");
    }
}

#[test]
fn filters_are_and_combined() {
    let index = build(&corpus(), ["content"], ["filename", "lang"]).unwrap();
    let hits = index.search(&Query::new("rust").filter("lang", "en").filter("filename", "2.md"));
    assert_eq!(filenames(&index, &hits), vec!["2.md"]);
    assert!(index.search(&Query::new("rust").filter("lang", "de").filter("filename", "2.md")).is_empty());
}

#[test]
fn empty_query_lists_candidates_in_ingestion_order() {
    let index = build(&corpus(), ["content"], ["filename", "lang"]).unwrap();
    let hits = index.search(&Query::new("").filter("lang", "de").limit(3));
    assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![1, 3, 5]);
    assert!(hits.iter().all(|h| h.score == 0.0));

    let unfiltered = index.search(&Query::new("   "));
    assert_eq!(unfiltered.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn empty_corpus_answers_with_empty_results() {
    let index = build(&[], ["content"], ["filename"]).unwrap();
    assert!(index.search(&Query::new("anything")).is_empty());
    assert!(index.search(&Query::new("")).is_empty());
}

#[test]
fn ties_break_by_ordinal() {
    let index = build(&corpus(), ["content"], ["filename"]).unwrap();
    let hits = index.search(&Query::new("rust search").limit(10));
    let pos6 = hits.iter().position(|h| h.doc_id == 6).unwrap();
    let pos7 = hits.iter().position(|h| h.doc_id == 7).unwrap();
    assert_eq!(hits[pos6].score, hits[pos7].score);
    assert_eq!(pos7, pos6 + 1);
}

#[test]
fn scores_are_positive_and_descending() {
    let index = build(&corpus(), ["content"], ["filename"]).unwrap();
    let hits = index.search(&Query::new("rust search ranking").limit(10));
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.score > 0.0));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn raising_the_limit_only_appends() {
    let index = build(&corpus(), ["content"], ["filename"]).unwrap();
    let mut previous: Vec<ScoredResult> = Vec::new();
    for limit in 1..=10 {
        let hits = index.search(&Query::new("rust search engine").limit(limit));
        assert!(hits.len() <= limit);
        assert_eq!(&hits[..previous.len()], &previous[..]);
        previous = hits;
    }
}

#[test]
fn rebuilding_twice_answers_identically() {
    let handle = IndexHandle::new(&corpus(), IndexConfig::default()).unwrap();
    let queries = [Query::new("rust"), Query::new("search engine").limit(8), Query::new("").limit(3)];
    handle.rebuild(&corpus()).unwrap();
    let first: Vec<_> = queries.iter().map(|q| handle.search(q)).collect();
    handle.rebuild(&corpus()).unwrap();
    let second: Vec<_> = queries.iter().map(|q| handle.search(q)).collect();
    assert_eq!(first, second);
}

#[test]
fn failed_rebuild_keeps_serving_the_old_index() {
    let handle = IndexHandle::new(&guide_docs(), IndexConfig::default()).unwrap();
    let before = handle.current();
    let broken = IndexConfig::new(["content"], ["content"]);
    assert!(handle.reconfigure(&corpus(), &broken).is_err());
    assert!(std::sync::Arc::ptr_eq(&before, &handle.current()));
    assert_eq!(handle.search(&Query::new("guide")).len(), 1);
}

#[test]
fn concurrent_readers_see_whole_indexes() {
    use std::sync::Arc;
    use std::thread;

    let small = vec![Document::new().with("content", "rust")];
    let big: Vec<Document> = (0..50).map(|_| Document::new().with("content", "rust")).collect();
    let handle = Arc::new(IndexHandle::new(&small, IndexConfig::default()).unwrap());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let h = handle.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let n = h.search(&Query::new("rust").limit(100)).len();
                    assert!(n == 1 || n == 50, "saw partial index with {n} hits");
                }
            })
        })
        .collect();
    for i in 0..20 {
        handle.rebuild(if i % 2 == 0 { &big } else { &small }).unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }
}
