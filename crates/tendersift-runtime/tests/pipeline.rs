//! End-to-end pipeline runs with fake collaborators.

use std::sync::Arc;

use tendersift_core::{CanonicalRecord, Field, PipelineConfig, RagSettings};
use tendersift_ingest::extract::sanitize_amount;
use tendersift_ingest::{Document, DocumentText};
use tendersift_llm::{FailingCompletion, StaticCompletion};
use tendersift_resolve::{ContextMode, FailingRetriever, MemoryIndex};
use tendersift_runtime::{validate_record, TenderAnalysis, TenderPipeline};

const MINIMAL: &str = "Tender Ref: TEND-2026-001\n\
                       Title: Construction of Highway\n\
                       Publication Date: 20-01-2026\n\
                       EMD: Rs. 50,000";

fn pattern_only() -> PipelineConfig {
    PipelineConfig {
        use_llm_extract: false,
        use_llm_eval: false,
        ..PipelineConfig::default()
    }
}

fn with_llm_extract() -> PipelineConfig {
    PipelineConfig {
        use_llm_eval: false,
        ..PipelineConfig::default()
    }
}

async fn analyze(pipeline: &TenderPipeline, text: &str) -> TenderAnalysis {
    pipeline
        .analyze_text("doc", "doc.txt", &DocumentText::from_raw(text))
        .await
}

fn assert_complete(record: &CanonicalRecord) {
    let json = serde_json::to_value(record).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), 26);
    for field in Field::ALL {
        let value = &obj[field.name()];
        if field.is_list() {
            assert!(value.is_array(), "{} should be a list", field);
        } else {
            assert!(
                value.as_str().is_some_and(|s| !s.is_empty()),
                "{} should be a non-empty string",
                field
            );
        }
    }
}

fn assert_provenance(record: &CanonicalRecord, text: &str) {
    if record.tender_id != "N/A" {
        assert!(text.to_lowercase().contains(&record.tender_id.to_lowercase()));
    }
}

#[tokio::test]
async fn minimal_document_pattern_only() {
    let pipeline = TenderPipeline::new(pattern_only());
    let analysis = analyze(&pipeline, MINIMAL).await;
    let r = &analysis.record;

    assert_eq!(r.tender_id, "TEND-2026-001");
    assert_eq!(r.publication_date, "20-01-2026");
    assert_eq!(r.emd, "Rs. 50,000");
    assert!(r.title.contains("Construction of Highway"));
    assert_eq!(r.category, "Construction");
    assert!(r.short_summary.starts_with("This tender is for Construction of Highway."));

    for field in [
        Field::Location,
        Field::IssuingAuthority,
        Field::SubmissionDeadline,
        Field::BidOpeningDate,
        Field::BidOpeningTime,
        Field::TenderValue,
        Field::TenderFee,
        Field::PerformanceGuarantee,
        Field::ContractDuration,
        Field::ScopeOfWork,
        Field::EligibilitySummary,
        Field::Deliverables,
        Field::BiddingScope,
    ] {
        assert_eq!(r.text(field), Some("N/A"), "{}", field);
    }
    assert!(r.contact_emails.is_empty());
    assert!(r.contact_phones.is_empty());
    assert!(r.projects.is_empty());

    assert_complete(r);
    assert!(validate_record(r, &pipeline.config().categories).is_empty());
    assert!(analysis.metadata.summary_fallback_used);
    assert!(analysis.metadata.category_detected);
}

#[tokio::test]
async fn pattern_wins_over_generative_na() {
    let backend = Arc::new(StaticCompletion::new(
        r#"{"tender_id": "N/A", "scope_of_work": "Resurfacing of the ring road", "contact_emails": ["ee@pwd.gov.in"]}"#,
    ));
    let pipeline = TenderPipeline::new(with_llm_extract()).with_completion(backend.clone());
    let text = "Notice inviting tenders\nTender Ref: ABC/2024/001\nContact: ae@pwd.gov.in";
    let analysis = analyze(&pipeline, text).await;

    assert_eq!(backend.calls(), 1);
    assert_eq!(analysis.metadata.context_mode, ContextMode::Direct);
    assert!(analysis.metadata.generative_available);
    assert_eq!(analysis.record.tender_id, "ABC/2024/001");
    assert_eq!(analysis.record.scope_of_work, "Resurfacing of the ring road");
    assert_eq!(
        analysis.record.contact_emails,
        vec!["ae@pwd.gov.in".to_string(), "ee@pwd.gov.in".to_string()]
    );
}

#[tokio::test]
async fn amount_with_payment_instruction() {
    let pipeline = TenderPipeline::new(pattern_only());
    let analysis = analyze(
        &pipeline,
        "EMD: Rs. 50,000/- (Rupees Fifty Thousand Only) payable by DD",
    )
    .await;
    assert_eq!(analysis.record.emd, "Rs. 50,000");

    // The labelled value is rejected whole; the keyword window still finds the figure.
    let raw = "Rs. 50,000/- payable by DD/Banker's cheque";
    assert_eq!(sanitize_amount(raw), "");
    let analysis = analyze(&pipeline, &format!("EMD: {}", raw)).await;
    assert_eq!(analysis.record.emd, "Rs. 50,000");
}

#[tokio::test]
async fn deadline_year_follows_publication() {
    let pipeline = TenderPipeline::new(pattern_only());
    let analysis = analyze(
        &pipeline,
        "Publication Date: 10-01-2025\nLast Date of Submission: 10-01-2026",
    )
    .await;
    assert_eq!(analysis.record.publication_date, "10-01-2025");
    assert_eq!(analysis.record.submission_deadline, "10-01-2025");
    assert_eq!(analysis.metadata.year_corrections.len(), 1);
}

#[tokio::test]
async fn fabricated_tender_id_is_dropped() {
    let backend = Arc::new(StaticCompletion::new(
        r#"{"tender_id": "PWD/2025/99", "emd": "Rs. 7,500", "category": "Repair"}"#,
    ));
    let pipeline = TenderPipeline::new(with_llm_extract()).with_completion(backend);
    let text = "Notice inviting bids for repair of school roof.\nDeposit details in annexure.";
    let analysis = analyze(&pipeline, text).await;

    assert_eq!(analysis.record.tender_id, "N/A");
    assert_eq!(analysis.metadata.tender_id_reset.as_deref(), Some("PWD/2025/99"));
    assert_eq!(analysis.record.emd, "Rs. 7,500");
    assert_eq!(analysis.record.category, "Repair");
    assert_provenance(&analysis.record, text);
}

#[tokio::test]
async fn unavailable_generator_degrades_to_patterns() {
    let backend = Arc::new(FailingCompletion::new());
    let pipeline = TenderPipeline::new(with_llm_extract()).with_completion(backend.clone());
    let analysis = analyze(&pipeline, MINIMAL).await;

    assert_eq!(backend.calls(), 1);
    assert!(!analysis.metadata.generative_available);
    assert_eq!(analysis.record.tender_id, "TEND-2026-001");
    assert_eq!(analysis.record.emd, "Rs. 50,000");
    assert_complete(&analysis.record);
}

fn long_notice() -> String {
    let filler = "General conditions of contract apply to all bidders without exception. ".repeat(12);
    format!(
        "{filler}\n\nTender Ref: RD/44/2025 for road works.\n\n{filler}\n\n\
         Scope of Work: widening and strengthening of the district road.\n\n{filler}\n\n\
         Eligibility: Class A contractors registered with the department.\n\n{filler}"
    )
}

fn retrieval_config() -> PipelineConfig {
    PipelineConfig {
        use_llm_eval: false,
        direct_context_chars: 500,
        rag: RagSettings {
            chunk_chars: 600,
            chunk_overlap: 50,
            ..RagSettings::default()
        },
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn retrieval_mode_runs_one_call_per_group() {
    let backend = Arc::new(
        StaticCompletion::new("{}")
            .with_rule("(section = core)", r#"{"tender_id": "RD/44/2025"}"#)
            .with_rule(
                "(section = content)",
                r#"{"scope_of_work": "Widening and strengthening of the district road"}"#,
            )
            .with_rule(
                "(section = summary)",
                r#"{"short_summary": "Road widening tender for class A contractors."}"#,
            ),
    );
    let index = Arc::new(MemoryIndex::new());
    let pipeline = TenderPipeline::new(retrieval_config())
        .with_retriever(index.clone())
        .with_completion(backend.clone());

    let text = long_notice();
    let analysis = analyze(&pipeline, &text).await;

    assert_eq!(analysis.metadata.context_mode, ContextMode::Retrieval);
    assert_eq!(analysis.metadata.generative_calls, 3);
    assert!(index.chunk_count("doc") > 1);
    assert_eq!(analysis.record.tender_id, "RD/44/2025");
    assert_eq!(
        analysis.record.scope_of_work,
        "Widening and strengthening of the district road"
    );
    assert_eq!(
        analysis.record.short_summary,
        "Road widening tender for class A contractors."
    );
    assert_provenance(&analysis.record, &text);
}

#[tokio::test]
async fn retrieval_failure_falls_back_to_direct_context() {
    let backend = Arc::new(StaticCompletion::new("{}"));
    let pipeline = TenderPipeline::new(retrieval_config())
        .with_retriever(Arc::new(FailingRetriever::new("index offline")))
        .with_completion(backend.clone());
    let analysis = analyze(&pipeline, &long_notice()).await;

    assert_eq!(analysis.metadata.context_mode, ContextMode::Direct);
    assert!(analysis.metadata.context_degraded.is_some());
    assert_eq!(backend.calls(), 1);
    assert_eq!(analysis.record.tender_id, "RD/44/2025");
}

#[tokio::test]
async fn empty_document_still_yields_complete_record() {
    let pipeline = TenderPipeline::new(pattern_only());
    let analysis = pipeline.process(&Document::new("empty.txt", Vec::new())).await;
    assert!(!analysis.is_failed());
    assert_complete(&analysis.record);
    assert_eq!(analysis.record.tender_id, "N/A");

    let analysis = pipeline
        .process(&Document::new("scan.pdf", b"%PDF-1.7".to_vec()))
        .await;
    assert!(analysis.is_failed());
    assert_complete(&analysis.record);
    assert!(validate_record(&analysis.record, &pipeline.config().categories).is_empty());
}
