use askgate_core::{Corpus, CorpusError, CorpusRecord, Document, MetadataFilter};
use serde_json::json;
use std::io::Write;

fn record_line(document: &Document, texts: &[&str]) -> String {
    let chunks: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            json!({
                "ordinal": i,
                "text": text,
                "metadata": {"page": i + 1},
                "embedding": [1.0, i as f32, 0.5]
            })
        })
        .collect();
    json!({ "document": document, "chunks": chunks }).to_string()
}

#[test]
fn loads_jsonl_snapshot_and_propagates_document_metadata() {
    let doc = Document::new("s3://kb/benefits.pdf")
        .with_version(2)
        .with_metadata("department", json!("hr"));
    let mut file = tempfile::NamedTempFile::new().expect("tmp");
    writeln!(file, "{}", record_line(&doc, &["Dental cover", "Vision cover"])).unwrap();
    writeln!(file).unwrap();

    let corpus = Corpus::load_jsonl(file.path()).expect("load");
    let stats = corpus.stats();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.embedded_chunks, 2);
    assert_eq!(stats.dimension, Some(3));

    let chunks = corpus.chunks_of(&doc.id);
    assert_eq!(chunks[0].document_version, 2);
    let filter = MetadataFilter::new().eq("department", json!("hr"));
    assert!(chunks.iter().all(|c| filter.matches(c)));
}

#[test]
fn malformed_lines_report_their_position() {
    let mut file = tempfile::NamedTempFile::new().expect("tmp");
    let doc = Document::new("s3://kb/a.pdf");
    writeln!(file, "{}", record_line(&doc, &["ok"])).unwrap();
    writeln!(file, "{{not json").unwrap();

    let err = Corpus::load_jsonl(file.path()).unwrap_err();
    assert!(matches!(err, CorpusError::InvalidRecord { line: 2, .. }));
}

#[test]
fn record_round_trips_through_parts() {
    let doc = Document::new("s3://kb/b.pdf");
    let record: CorpusRecord =
        serde_json::from_str(&record_line(&doc, &["first", "second"])).unwrap();
    let (document, inputs) = record.into_parts();
    assert_eq!(document.id, doc.id);
    assert_eq!(inputs.len(), 2);
    assert!(inputs.iter().all(|i| i.chunk.document_id == doc.id));
}
