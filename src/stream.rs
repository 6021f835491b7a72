//! Streaming generation API: emit outcomes as records complete.
//!
//! Unlike the eager [`crate::generate::generate`], which returns only after
//! every record finishes, [`generate_stream`] yields each [`RecordOutcome`]
//! as soon as its record is done. Records are processed one at a time, so
//! outcomes always arrive in input order.

use crate::config::GenerationConfig;
use crate::error::QrCardError;
use crate::generate::process_record;
use crate::output::RecordOutcome;
use crate::pipeline::encode::Encoders;
use crate::pipeline::input;
use crate::pipeline::parse::parse_records;
use futures::future;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of record outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = RecordOutcome> + Send>>;

/// Generate QR rasters, streaming each outcome as it is ready.
///
/// Parsing and encoder probing happen up front, so every fatal error is
/// returned here rather than mid-stream. `on_generation_complete` fires once
/// the last outcome has been yielded.
///
/// # Example
/// ```rust,no_run
/// use csv2qr::{generate_stream, GenerationConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let csv = std::fs::read_to_string("contacts.csv")?;
/// let mut outcomes = generate_stream(&csv, &GenerationConfig::default()).await?;
/// while let Some(o) = outcomes.next().await {
///     println!("{}: {}", o.display_name, if o.succeeded { "ok" } else { "failed" });
/// }
/// # Ok(())
/// # }
/// ```
pub async fn generate_stream(
    csv_text: &str,
    config: &GenerationConfig,
) -> Result<OutcomeStream, QrCardError> {
    let table = parse_records(input::strip_bom(csv_text))?;
    let encoders = Encoders::resolve(config)?;

    let total = table.records.len();
    info!("Streaming QR generation for {} records", total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(total);
    }

    let succeeded = Arc::new(AtomicUsize::new(0));
    let done = {
        let succeeded = Arc::clone(&succeeded);
        let callback = config.progress_callback.clone();
        stream::once(async move {
            let success = succeeded.load(Ordering::SeqCst);
            info!("Stream complete: {}/{} verified", success, total);
            if let Some(cb) = callback {
                cb.on_generation_complete(total, success);
            }
            None
        })
    };

    let config = config.clone();
    let s = stream::iter(table.records.into_iter().enumerate())
        .then(move |(index, row)| {
            let encoders = encoders.clone();
            let cfg = config.clone();
            let succeeded = Arc::clone(&succeeded);
            async move {
                let outcome = process_record(index, &row, total, &encoders, &cfg).await;
                if outcome.succeeded {
                    succeeded.fetch_add(1, Ordering::SeqCst);
                }
                Some(outcome)
            }
        })
        .chain(done)
        .filter_map(future::ready);

    Ok(Box::pin(s))
}
