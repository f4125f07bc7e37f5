use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use trustgrid_config::PipelineConfig;
use trustgrid_core::{
    Dimension, FieldValue, FixedClock, IssueKind, SourceType, TriggerRequest, UploadedFile, NO_DATA_STATUS,
};
use trustgrid_pipeline::{ErrorBody, Pipeline, ReportSlot};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> UploadedFile {
    let path = fixtures_dir().join(name);
    let bytes = std::fs::read(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    UploadedFile::new(name, bytes)
}

fn pipeline_with(config: PipelineConfig) -> Pipeline {
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
    Pipeline::new(config).unwrap().with_clock(Arc::new(clock))
}

fn pipeline() -> Pipeline {
    let toml = std::fs::read_to_string(fixtures_dir().join("pipeline.toml")).unwrap();
    pipeline_with(PipelineConfig::from_toml(&toml).unwrap())
}

fn upload(source_type: SourceType, name: &str) -> TriggerRequest {
    TriggerRequest::new(source_type).with_file(fixture(name))
}

// -------------------------------------------------------------------------
// Uploads
// -------------------------------------------------------------------------

#[test]
fn listing_csv_scores_and_flags() {
    let slot = ReportSlot::new();
    let run = slot
        .trigger(&pipeline(), &upload(SourceType::CsvUpload, "listings.csv"))
        .unwrap();
    let report = run.report();

    assert_eq!(report.total_records(), 10);
    assert_eq!(report.dimension(Dimension::Completeness).unwrap().score, 93);
    assert_eq!(report.dimension(Dimension::Uniqueness).unwrap().score, 90);
    for d in [
        Dimension::Accuracy,
        Dimension::Validity,
        Dimension::Consistency,
        Dimension::Integrity,
        Dimension::Lineage,
    ] {
        assert_eq!(report.dimension(d).unwrap().score, 100, "{d}");
    }
    // completeness weighted 2: (2 * 93 + 90 + 500) / 8
    assert_eq!(report.overall_score(), Some(97));

    let flags: Vec<IssueKind> = run
        .records()
        .iter()
        .flat_map(|r| r.flags.iter().map(|f| f.issue_kind))
        .collect();
    assert_eq!(flags.iter().filter(|k| **k == IssueKind::Missing).count(), 2);
    assert_eq!(flags.iter().filter(|k| **k == IssueKind::Duplicate).count(), 1);
    assert_eq!(flags.len(), 3);

    let body = serde_json::to_value(run.response(slot.preview_limit())).unwrap();
    let rows = body["raw_data"]["data"].as_array().unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0]["identity"], "12 Oak Street");
    assert_eq!(rows[0]["Agent"], "J. Smith");
    assert_eq!(rows[0]["source_id"], "csv_upload:listings.csv");
    assert_eq!(body["report"]["status"], "Success");
}

#[test]
fn identical_input_identical_json() {
    let p = pipeline();
    let a = p.run(&upload(SourceType::CsvUpload, "listings.csv")).unwrap();
    let b = p.run(&upload(SourceType::CsvUpload, "listings.csv")).unwrap();
    assert_eq!(
        serde_json::to_string(&a.response(100)).unwrap(),
        serde_json::to_string(&b.response(100)).unwrap()
    );
}

#[test]
fn header_only_csv_is_no_data() {
    let slot = ReportSlot::new();
    let run = slot
        .trigger(&pipeline(), &upload(SourceType::CsvUpload, "header_only.csv"))
        .unwrap();
    let body = serde_json::to_value(run.report()).unwrap();
    assert_eq!(body["status"], NO_DATA_STATUS);
    assert!(body.get("overall_score").is_none());
    assert_eq!(body["dimensions"].as_array().unwrap().len(), 0);
    assert!(slot.retrieve().unwrap().is_no_data());
}

#[test]
fn wrong_extension_is_unsupported() {
    let mut req = upload(SourceType::CsvUpload, "listings.csv");
    if let Some(file) = req.file.as_mut() {
        file.name = "listings.docx".to_string();
    }
    let err = pipeline().run(&req).unwrap_err();
    assert_eq!(err.category(), "unsupported_format");
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let mut v = b"\x89PNG\r\n\x1a\n".to_vec();
    v.extend(13u32.to_be_bytes());
    v.extend(b"IHDR");
    v.extend(w.to_be_bytes());
    v.extend(h.to_be_bytes());
    v.extend([8, 2, 0, 0, 0, 0, 0, 0, 0]);
    v.extend(0u32.to_be_bytes());
    v.extend(b"IEND");
    v.extend([0xAE, 0x42, 0x60, 0x82]);
    v
}

fn zip(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    let mut zw = zip::ZipWriter::new(&mut buf);
    for (name, data) in members {
        zw.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
        zw.write_all(data).unwrap();
    }
    zw.finish().unwrap();
    buf.into_inner()
}

#[test]
fn archive_with_corrupt_members_is_not_rejected() {
    let good = png(1200, 800);
    let mut cut = png(640, 480);
    cut.truncate(20);
    let archive = zip(&[
        ("shots/a.png", good.clone()),
        ("shots/b.png", good.clone()),
        ("shots/c.png", png(2400, 1600)),
        ("shots/d.png", png(320, 200)),
        ("shots/e.png", png(100, 100)),
        ("shots/broken.png", cut),
        ("shots/empty.jpg", Vec::new()),
    ]);
    let req = TriggerRequest::new(SourceType::ZipUpload)
        .with_file(UploadedFile::new("shots.zip", archive));
    let run = pipeline_with(PipelineConfig::default()).run(&req).unwrap();

    assert_eq!(run.records().len(), 7);
    let corrupted: Vec<_> = run.records().iter().filter(|r| r.is_corrupted()).collect();
    assert_eq!(corrupted.len(), 2);
    assert!(corrupted.iter().all(|r| r.fields["suitability"] == FieldValue::text("Corrupted")));
    assert_eq!(run.report().issues().corrupted, 2);
    assert_eq!(run.records()[2].fields["suitability"], FieldValue::text("Professional Print"));
    assert_eq!(run.records()[4].fields["status"], FieldValue::text("Warning (Low Res)"));
}

// -------------------------------------------------------------------------
// Network
// -------------------------------------------------------------------------

#[test]
fn api_auth_failure_keeps_previous_report() {
    let slot = ReportSlot::new();
    let p = pipeline();
    let first = slot
        .trigger(&p, &upload(SourceType::CsvUpload, "listings.csv"))
        .unwrap();

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/listings");
        then.status(401).body("{\"message\": \"invalid key\"}");
    });
    let req = TriggerRequest::new(SourceType::Api)
        .with_url(server.url("/listings"))
        .with_api_key("wrong");
    let err = slot.trigger(&p, &req).unwrap_err();

    mock.assert_hits(1);
    assert_eq!(err.category(), "source_unreachable");
    let body = serde_json::to_value(ErrorBody::from(&err)).unwrap();
    assert_eq!(body["category"], "source_unreachable");
    assert_eq!(slot.retrieve().unwrap(), *first.report());
}

#[test]
fn api_records_flow_through() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/listings");
        then.status(200)
            .header("content-type", "application/json")
            .body(
                r#"{"data": [
                    {"address": "1 main st", "agent": "Dr. Lee", "amount": 100, "created_at": "2026-01-02"},
                    {"address": "2 main st", "agent": "Dr. Lee", "amount": 200, "created_at": "2026-01-03"}
                ]}"#,
            );
    });
    let req = TriggerRequest::new(SourceType::Api).with_url(server.url("/listings"));
    let run = pipeline().run(&req).unwrap();
    assert_eq!(run.records().len(), 2);
    assert_eq!(run.records()[0].fields["identity"], FieldValue::text("1 Main Street"));
    assert_eq!(run.records()[0].fields["agent"], FieldValue::text("Dr. Lee"));
    assert_eq!(run.report().overall_score(), Some(100));
}
