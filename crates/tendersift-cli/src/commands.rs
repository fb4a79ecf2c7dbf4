//! Command helpers: argument parsing, input loading, artifact layout.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;

use tendersift_core::{CanonicalRecord, CategoryTable};
use tendersift_ingest::{safe_stem, Document};
use tendersift_runtime::{validate_record, TenderAnalysis};
use tendersift_store::SqliteStore;

pub const EXTRACTION_FILE: &str = "extraction.json";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, PartialEq, Eq)]
pub struct ExtractArgs {
    pub files: Vec<PathBuf>,
    pub out_dir: PathBuf,
    pub db_dir: Option<PathBuf>,
}

impl ExtractArgs {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut files = Vec::new();
        let mut out_dir = PathBuf::from("output");
        let mut db_dir = None;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--out" => {
                    out_dir = iter
                        .next()
                        .map(PathBuf::from)
                        .ok_or("--out needs a directory")?;
                }
                "--db" => {
                    db_dir = Some(
                        iter.next()
                            .map(PathBuf::from)
                            .ok_or("--db needs a directory")?,
                    );
                }
                flag if flag.starts_with("--") => return Err(format!("Unknown option: {}", flag)),
                file => files.push(PathBuf::from(file)),
            }
        }

        if files.is_empty() {
            return Err("No input files given".into());
        }
        Ok(Self {
            files,
            out_dir,
            db_dir,
        })
    }
}

/// Read every path; unreadable files are logged and skipped.
pub fn read_documents(paths: &[PathBuf]) -> Vec<Document> {
    paths
        .iter()
        .filter_map(|path| match std::fs::read(path) {
            Ok(bytes) => {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Some(Document::new(filename, bytes))
            }
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Write `<out>/<stem>/extraction.json` and `metadata.json`. Returns the directory.
pub fn write_artifacts(out_dir: &Path, analysis: &TenderAnalysis) -> anyhow::Result<PathBuf> {
    let dir = out_dir.join(safe_stem(&analysis.filename));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let record = serde_json::to_string_pretty(&analysis.record)?;
    std::fs::write(dir.join(EXTRACTION_FILE), record)?;

    let metadata = serde_json::to_string_pretty(&analysis.metadata_json()?)?;
    std::fs::write(dir.join(METADATA_FILE), metadata)?;
    Ok(dir)
}

/// Load a record from disk and list its schema problems.
pub fn validate_file(path: &Path, categories: &CategoryTable) -> anyhow::Result<Vec<String>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let record: CanonicalRecord = match serde_json::from_str(&content) {
        Ok(record) => record,
        Err(e) => return Ok(vec![format!("not a canonical record: {}", e)]),
    };
    Ok(validate_record(&record, categories))
}

/// Store summary followed by one line per persisted record.
pub fn records_report(store: &SqliteStore) -> anyhow::Result<Vec<String>> {
    let stats = store.get_stats()?;
    let mut lines = vec![format!(
        "{}: {} records, {} documents, {} chunks, {:.2} MB",
        stats.db_path,
        stats.total_records,
        stats.total_documents,
        stats.total_chunks,
        stats.db_size_mb
    )];
    for stored in store.list_records()? {
        let status = match &stored.failure {
            Some(reason) => format!("FAILED ({})", reason),
            None => stored
                .evaluation
                .as_ref()
                .map(|e| format!("{} {}/10", e.recommendation, e.priority_score))
                .unwrap_or_else(|| "not evaluated".to_string()),
        };
        lines.push(format!(
            "{}  {}  tender_id={}  {}",
            stored.doc_key,
            stored.filename.as_deref().unwrap_or("-"),
            stored.record.tender_id,
            status
        ));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tendersift_core::PipelineConfig;
    use tendersift_runtime::TenderPipeline;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_extract_args() {
        let parsed =
            ExtractArgs::parse(&args(&["a.txt", "--out", "out", "b.docx", "--db", "db"])).unwrap();
        assert_eq!(parsed.files, vec![PathBuf::from("a.txt"), PathBuf::from("b.docx")]);
        assert_eq!(parsed.out_dir, PathBuf::from("out"));
        assert_eq!(parsed.db_dir, Some(PathBuf::from("db")));

        assert!(ExtractArgs::parse(&args(&["--out", "out"])).is_err());
        assert!(ExtractArgs::parse(&args(&["a.txt", "--db"])).is_err());
        assert!(ExtractArgs::parse(&args(&["a.txt", "--fast"])).is_err());
    }

    #[test]
    fn test_read_documents_skips_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let present = tmp.path().join("notice.txt");
        std::fs::write(&present, "Tender Ref: T-1").unwrap();
        let docs = read_documents(&[present, tmp.path().join("missing.txt")]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "notice.txt");
    }

    #[tokio::test]
    async fn test_artifacts_round_trip_through_validate() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pipeline = TenderPipeline::new(PipelineConfig {
            use_llm_extract: false,
            use_llm_eval: false,
            ..PipelineConfig::default()
        });
        let analysis = pipeline
            .process(&Document::new(
                "road notice.txt",
                b"Tender Ref: RD-9\nTitle: Construction of Highway\nEMD: Rs. 10,000".to_vec(),
            ))
            .await;

        let dir = write_artifacts(tmp.path(), &analysis).unwrap();
        assert!(dir.ends_with("road notice"));

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(METADATA_FILE)).unwrap())
                .unwrap();
        assert!(meta["extraction_meta"]["regex_candidates"].is_object());
        assert!(meta["extraction_meta"]["eval"]["priority_score"].is_number());

        let problems =
            validate_file(&dir.join(EXTRACTION_FILE), &pipeline.config().categories).unwrap();
        assert!(problems.is_empty(), "{:?}", problems);
    }

    #[tokio::test]
    async fn test_records_report_lists_persisted_runs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = std::sync::Arc::new(SqliteStore::open(tmp.path()).unwrap());
        let pipeline = TenderPipeline::new(PipelineConfig {
            use_llm_extract: false,
            use_llm_eval: false,
            ..PipelineConfig::default()
        })
        .with_store(std::sync::Arc::clone(&store));
        pipeline
            .process(&Document::new("nit.txt", b"Tender Ref: TEND-42".to_vec()))
            .await;
        pipeline
            .process(&Document::new("scan.pdf", b"%PDF-1.7".to_vec()))
            .await;

        let lines = records_report(&store).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("2 records"));
        assert!(lines
            .iter()
            .any(|l| l.contains("tender_id=TEND-42") && l.contains("REVIEW 6/10")));
        assert!(lines.iter().any(|l| l.contains("scan.pdf") && l.contains("FAILED")));
    }

    #[test]
    fn test_validate_reports_malformed_record() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(EXTRACTION_FILE);
        std::fs::write(&path, r#"{"tender_id": "X"}"#).unwrap();
        let problems = validate_file(&path, &CategoryTable::default()).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("not a canonical record"));
    }
}
