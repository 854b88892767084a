use super::{RetryPolicy, execute};
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::ChunkDescriptor;
use crate::transport::ApiResponse;
use indicatif::ProgressStyle;
use std::future::Future;
use tracing::{Span, info, instrument, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Apply `chunks` strictly in order, each under its own retry budget.
///
/// The first chunk that cannot be applied aborts the job with
/// [`AppError::ChunkUpdateFailed`]; later chunks are never attempted.
#[instrument(name = "Updating ranges", skip_all, fields(chunks = chunks.len()))]
pub async fn update_chunks<F, Fut>(
    clock: &dyn Clock,
    policy: &RetryPolicy,
    chunks: &[ChunkDescriptor],
    mut apply: F,
) -> Result<Vec<bool>>
where
    F: FnMut(&ChunkDescriptor) -> Fut,
    Fut: Future<Output = Result<ApiResponse>>,
{
    let span = Span::current();
    span.pb_set_style(
        &ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
        )
        .map_err(|e| AppError::Other(e.into()))?,
    );
    span.pb_set_message("Writing rows");
    span.pb_set_length(chunks.len() as u64);

    let mut results = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if let Err(cause) = execute(clock, policy, || apply(chunk)).await {
            warn!(
                start = chunk.start_index() + 1,
                end = chunk.end_index(),
                error = %cause,
                "Chunk update failed, halting remaining chunks"
            );
            return Err(AppError::ChunkUpdateFailed {
                start_index: chunk.start_index(),
                end_index: chunk.end_index(),
                cause: Box::new(cause),
            });
        }
        info!(
            start = chunk.start_index() + 1,
            end = chunk.end_index(),
            "Updated rows"
        );
        results.push(true);
        span.pb_inc(1);
    }

    Ok(results)
}
