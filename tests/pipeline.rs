//! Integration tests for the CSV → vCard → QR pipeline.
//!
//! Most tests inject mock encoders so the fallback behaviour is
//! deterministic; the `builtin` tests at the bottom exercise the real
//! `qrcode`-backed encoders.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use csv2qr::{
    generate, generate_from_bytes, generate_stream, generate_to_dir, inspect, AttemptStage,
    EncodeError, EncodeOptions, GenerationConfig, GenerationProgressCallback, OrganizationContext,
    QrCardError, QrEncoder, RecordError,
};
use futures::StreamExt;
use image::{Rgba, RgbaImage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Mock encoders ────────────────────────────────────────────────────────────

/// Draws a checkerboard for every payload and remembers what it was asked.
#[derive(Default)]
struct RecordingEncoder {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl QrEncoder for RecordingEncoder {
    fn name(&self) -> &str {
        "recording"
    }

    async fn encode(&self, text: &str, opts: &EncodeOptions) -> Result<RgbaImage, EncodeError> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(checker(opts.size))
    }
}

/// "Succeeds" with an all-white raster every time.
#[derive(Default)]
struct BlankEncoder {
    calls: AtomicUsize,
}

#[async_trait]
impl QrEncoder for BlankEncoder {
    fn name(&self) -> &str {
        "blank"
    }

    async fn encode(&self, _text: &str, opts: &EncodeOptions) -> Result<RgbaImage, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RgbaImage::from_pixel(
            opts.size,
            opts.size,
            Rgba([255, 255, 255, 255]),
        ))
    }
}

/// Rejects payloads longer than `max_len` bytes.
struct CapacityEncoder {
    max_len: usize,
}

#[async_trait]
impl QrEncoder for CapacityEncoder {
    fn name(&self) -> &str {
        "capacity"
    }

    async fn encode(&self, text: &str, opts: &EncodeOptions) -> Result<RgbaImage, EncodeError> {
        if text.len() > self.max_len {
            Err(EncodeError::Symbol(format!(
                "{} bytes exceeds {}",
                text.len(),
                self.max_len
            )))
        } else {
            Ok(checker(opts.size))
        }
    }
}

/// Route library logs to the test harness; `RUST_LOG=csv2qr=debug` shows
/// every fallback step.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn checker(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        if (x / 12 + y / 12) % 2 == 0 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

fn config_with(
    primary: Arc<dyn QrEncoder>,
    secondary: Arc<dyn QrEncoder>,
    org: OrganizationContext,
) -> GenerationConfig {
    GenerationConfig::builder()
        .organization(org)
        .raster_size(120)
        .encoder(primary)
        .fallback_encoder(secondary)
        .build()
        .unwrap()
}

fn recording_config(org: OrganizationContext) -> (Arc<RecordingEncoder>, GenerationConfig) {
    let enc = Arc::new(RecordingEncoder::default());
    let config = config_with(enc.clone(), enc.clone(), org);
    (enc, config)
}

// ── Payload construction ─────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_email_headers_reach_the_card_in_order() {
    let csv = "name,email,email\nKim,a@x.com,b@x.com\n";
    let table = inspect(csv).unwrap();
    let emails = table.records[0].get("email").unwrap().values();
    assert_eq!(emails, vec!["a@x.com", "b@x.com"]);

    let (_, config) = recording_config(OrganizationContext::default());
    let output = generate(csv, &config).await.unwrap();
    let full = &output.get(0).unwrap().candidates[0];
    let a = full.find("EMAIL:a@x.com").expect("first email line");
    let b = full.find("EMAIL:b@x.com").expect("second email line");
    assert!(a < b, "emails out of order in:\n{full}");
}

#[tokio::test]
async fn korean_row_ladder_ends_with_the_name() {
    let (_, config) = recording_config(OrganizationContext::default());
    let output = generate("이름,휴대폰\n김철수,010-1234-5678\n", &config)
        .await
        .unwrap();
    let outcome = output.get(0).unwrap();

    assert!(outcome
        .candidates
        .contains(&"tel:010-1234-5678".to_string()));
    assert_eq!(outcome.candidates.last().map(String::as_str), Some("김철수"));
    let unique: HashSet<&String> = outcome.candidates.iter().collect();
    assert_eq!(unique.len(), outcome.candidates.len());
}

#[tokio::test]
async fn website_without_scheme_gets_http() {
    let (_, config) = recording_config(OrganizationContext::new("ACME", "", "example.com"));
    let output = generate("name\nKim\n", &config).await.unwrap();
    assert!(output.get(0).unwrap().candidates[0].contains("\nURL:http://example.com\n"));
}

#[tokio::test]
async fn address_commas_are_escaped() {
    let (_, config) = recording_config(OrganizationContext::new(
        "ACME",
        "서울 성동구 뚝섬로1길 63, 701호",
        "",
    ));
    let output = generate("name\nKim\n", &config).await.unwrap();
    assert!(output.get(0).unwrap().candidates[0].contains("ADR:서울 성동구 뚝섬로1길 63\\, 701호"));
}

#[tokio::test]
async fn identical_full_and_minimal_cards_appear_once() {
    let (enc, config) = recording_config(OrganizationContext::default());
    let output = generate("name,mobile\nKim,010\n", &config).await.unwrap();
    let candidates = &output.get(0).unwrap().candidates;
    let cards = candidates
        .iter()
        .filter(|c| c.starts_with("BEGIN:VCARD"))
        .count();
    assert_eq!(cards, 1);
    assert_eq!(candidates.len(), 3);
    // Only the first candidate was needed.
    assert_eq!(enc.seen.lock().unwrap().len(), 1);
}

// ── Input errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn header_only_input_is_rejected() {
    let (enc, config) = recording_config(OrganizationContext::default());
    let err = generate("이름,이메일\n", &config).await.unwrap_err();
    assert!(matches!(err, QrCardError::NoData { lines: 1 }));
    assert!(err.is_input_error());
    assert!(enc.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rows_with_only_empty_cells_are_rejected() {
    let (_, config) = recording_config(OrganizationContext::default());
    let err = generate("name,email\n,\n , \n", &config).await.unwrap_err();
    assert!(matches!(err, QrCardError::NoRecords));
}

#[tokio::test]
async fn empty_middle_row_still_gets_an_outcome() {
    let (_, config) = recording_config(OrganizationContext::default());
    let output = generate("name,mobile\nKim,010\n,\n,020\n", &config)
        .await
        .unwrap();
    let names: Vec<&str> = output.iter().map(|o| o.display_name.as_str()).collect();
    assert_eq!(names, vec!["Kim", "사원2", "사원3"]);
    assert_eq!(output.get(2).map(|o| o.index), Some(2));
}

#[tokio::test]
async fn invalid_utf8_is_rejected() {
    let (_, config) = recording_config(OrganizationContext::default());
    let mut bytes = b"name\n".to_vec();
    bytes.extend_from_slice(&[0xB1, 0xE8]); // "김" in EUC-KR
    let err = generate_from_bytes(&bytes, &config).await.unwrap_err();
    assert!(matches!(err, QrCardError::InvalidUtf8 { offset: 5 }));
}

// ── Fallback ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn blank_encoder_fails_every_record_but_the_run_completes() {
    init_tracing();
    let blank = Arc::new(BlankEncoder::default());
    let config = config_with(blank.clone(), blank.clone(), OrganizationContext::default());
    let csv = "name,mobile\nKim,010-1\nLee,010-2\n,010-3\n";

    let output = generate(csv, &config).await.unwrap();
    assert_eq!(output.len(), 3);
    assert_eq!(output.stats.succeeded, 0);
    assert_eq!(output.stats.failed, 3);

    let kim = output.get(0).unwrap();
    assert!(!kim.succeeded);
    assert_eq!(kim.payload_used, "Kim");
    assert!(matches!(kim.error, Some(RecordError::EncodeExhausted { .. })));
    assert_eq!(kim.raster.dimensions(), (120, 120));
    assert!(output.downloadable(0).is_none());

    // No name: the last resort is the synthetic display name.
    let nameless = output.get(2).unwrap();
    assert_eq!(nameless.display_name, "사원3");
    assert_eq!(nameless.payload_used, "사원3");

    let total_attempts: usize = output.iter().map(|o| o.attempts).sum();
    assert_eq!(blank.calls.load(Ordering::SeqCst), total_attempts);
}

#[tokio::test]
async fn oversized_full_card_falls_back_to_minimal() {
    init_tracing();
    let long_address = "서울 ".repeat(40);
    let org = OrganizationContext::new("ACME", long_address.as_str(), "acme.example");
    let config = config_with(
        Arc::new(CapacityEncoder { max_len: 100 }),
        Arc::new(BlankEncoder::default()),
        org,
    );

    let output = generate("이름,이메일\n김철수,kim@x.com\n", &config)
        .await
        .unwrap();
    let outcome = output.get(0).unwrap();
    assert!(outcome.succeeded);
    assert_eq!(outcome.stage, Some(AttemptStage::Candidate(1)));
    assert!(!outcome.payload_used.contains("ORG:"));
    assert_eq!(output.stats.fell_back, 1);
}

#[tokio::test]
async fn second_chance_encoder_rescues_a_record() {
    init_tracing();
    let recording = Arc::new(RecordingEncoder::default());
    let config = config_with(
        Arc::new(CapacityEncoder { max_len: 0 }),
        recording.clone(),
        OrganizationContext::default(),
    );

    let output = generate("name,email\nKim,kim@x.com\n", &config)
        .await
        .unwrap();
    let outcome = output.get(0).unwrap();
    assert!(outcome.succeeded);
    assert_eq!(outcome.stage, Some(AttemptStage::SecondChance));
    assert_eq!(*recording.seen.lock().unwrap(), vec!["Kim".to_string()]);
}

// ── Aggregation, output and progress ─────────────────────────────────────────

#[tokio::test]
async fn outcomes_keep_input_order() {
    let (_, config) = recording_config(OrganizationContext::default());
    let csv = "name\nC\nA\nB\n";

    let eager: Vec<String> = generate(csv, &config)
        .await
        .unwrap()
        .iter()
        .map(|o| o.display_name.clone())
        .collect();
    assert_eq!(eager, vec!["C", "A", "B"]);

    let streamed: Vec<(usize, String)> = generate_stream(csv, &config)
        .await
        .unwrap()
        .map(|o| (o.index, o.display_name))
        .collect()
        .await;
    assert_eq!(
        streamed,
        vec![(0, "C".into()), (1, "A".into()), (2, "B".into())]
    );
}

#[tokio::test]
async fn generate_to_dir_writes_one_png_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let blank = Arc::new(BlankEncoder::default());
    let (_, ok_config) = recording_config(OrganizationContext::default());

    let stats = generate_to_dir("이름\n김철수\n김철수\nLee Min\n", dir.path(), &ok_config)
        .await
        .unwrap();
    assert_eq!(stats.total_records, 3);

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["Lee_Min_QR코드.png", "김철수_2_QR코드.png", "김철수_QR코드.png"]
    );

    // Failed records still get a placeholder file.
    let failing = config_with(blank.clone(), blank, OrganizationContext::default());
    let sub = dir.path().join("failed");
    let stats = generate_to_dir("name\nKim\n", &sub, &failing).await.unwrap();
    assert_eq!(stats.failed, 1);
    let png = std::fs::read(sub.join("Kim_QR코드.png")).unwrap();
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!((img.width(), img.height()), (120, 120));
}

#[derive(Default)]
struct CountingCallback {
    started: AtomicUsize,
    record_starts: AtomicUsize,
    completes: AtomicUsize,
    failures: AtomicUsize,
    success_total: AtomicUsize,
    finished: AtomicUsize,
}

impl GenerationProgressCallback for CountingCallback {
    fn on_generation_start(&self, total_records: usize) {
        self.started.store(total_records, Ordering::SeqCst);
    }

    fn on_record_start(&self, _record: usize, _total: usize) {
        self.record_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_record_complete(&self, _record: usize, _total: usize, payload_len: usize) {
        assert!(payload_len > 0);
        self.completes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_record_failed(&self, _record: usize, _total: usize, _error: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_generation_complete(&self, _total: usize, success_count: usize) {
        self.success_total.store(success_count, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_record() {
    let cb = Arc::new(CountingCallback::default());
    // Payloads of 12 bytes or less encode; every rung of the second record,
    // down to its bare name, is longer than that.
    let config = GenerationConfig::builder()
        .encoder(Arc::new(CapacityEncoder { max_len: 12 }))
        .fallback_encoder(Arc::new(BlankEncoder::default()))
        .progress_callback(cb.clone())
        .build()
        .unwrap();

    let output = generate("name,mobile\nKim,010\nExtremelyLongName,\n", &config)
        .await
        .unwrap();
    assert_eq!(output.stats.succeeded, 1);

    assert_eq!(cb.started.load(Ordering::SeqCst), 2);
    assert_eq!(cb.record_starts.load(Ordering::SeqCst), 2);
    assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
    assert_eq!(cb.failures.load(Ordering::SeqCst), 1);
    assert_eq!(cb.success_total.load(Ordering::SeqCst), 1);
    assert_eq!(cb.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stream_reports_completion_after_the_last_outcome() {
    let cb = Arc::new(CountingCallback::default());
    let config = GenerationConfig::builder()
        .encoder(Arc::new(CapacityEncoder { max_len: 12 }))
        .fallback_encoder(Arc::new(BlankEncoder::default()))
        .progress_callback(cb.clone())
        .build()
        .unwrap();

    let mut outcomes = generate_stream("name,mobile\nKim,010\nExtremelyLongName,\n", &config)
        .await
        .unwrap();
    assert_eq!(cb.started.load(Ordering::SeqCst), 2);

    let first = outcomes.next().await.unwrap();
    assert!(first.succeeded);
    assert_eq!(cb.finished.load(Ordering::SeqCst), 0);

    let second = outcomes.next().await.unwrap();
    assert!(!second.succeeded);
    assert!(outcomes.next().await.is_none());
    assert_eq!(cb.finished.load(Ordering::SeqCst), 1);
    assert_eq!(cb.success_total.load(Ordering::SeqCst), 1);
}

// ── Built-in encoders ────────────────────────────────────────────────────────

#[cfg(feature = "builtin-encoder")]
#[tokio::test]
async fn builtin_encoders_produce_verified_symbols() {
    let config = GenerationConfig::builder()
        .organization(OrganizationContext::new(
            "남양인터내셔날",
            "서울 성동구 뚝섬로1길 63, 701호",
            "www.namyang-intl.com",
        ))
        .build()
        .unwrap();
    let csv = "\u{FEFF}이름,직책,휴대폰,이메일,이메일\n\
               양승대,대표,010-8190-5377,a@x.com,b@x.com\n\
               김철수,팀장,010-1234-5678,kim@x.com,\n";

    let output = generate(csv, &config).await.unwrap();
    assert_eq!(output.stats.succeeded, 2);
    for outcome in &output {
        assert_eq!(outcome.stage, Some(AttemptStage::Candidate(0)));
        assert_eq!(outcome.raster.dimensions(), (300, 300));
        let png = outcome.to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
    assert_eq!(output.get(0).unwrap().display_position, "대표");
}

#[cfg(feature = "builtin-encoder")]
#[tokio::test]
async fn builtin_encoder_falls_back_past_capacity() {
    let huge_address = "가".repeat(1200); // 3600 bytes: no symbol version holds it
    let config = GenerationConfig::builder()
        .organization(OrganizationContext::new("ACME", huge_address.as_str(), ""))
        .build()
        .unwrap();

    let output = generate("name,email\nKim,kim@x.com\n", &config)
        .await
        .unwrap();
    let outcome = output.get(0).unwrap();
    assert!(outcome.succeeded);
    assert_eq!(outcome.stage, Some(AttemptStage::Candidate(1)));
}

#[cfg(not(feature = "builtin-encoder"))]
#[tokio::test]
async fn no_encoder_is_fatal() {
    let err = generate("name\nKim\n", &GenerationConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QrCardError::EncoderUnavailable));
}

#[cfg(not(feature = "builtin-encoder"))]
#[tokio::test]
async fn lone_fallback_encoder_is_promoted() {
    let enc = Arc::new(RecordingEncoder::default());
    let config = GenerationConfig::builder()
        .fallback_encoder(enc.clone())
        .build()
        .unwrap();
    let output = generate("name\nKim\n", &config).await.unwrap();
    assert!(output.get(0).unwrap().succeeded);
    assert_eq!(enc.seen.lock().unwrap().len(), 1);
}
