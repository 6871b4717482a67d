// crates/insight-relay/src/cli/replay.rs
// Replay a captured upstream stream through the decoder and translator

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;

use insight_relay::pipeline::{StreamOutcome, run_envelopes_with};
use insight_relay::store::SharedStore;
use insight_types::ThreadSnapshot;

/// Normalized messages go to stdout, the thread summary to stderr
pub async fn run_replay(path: &Path, chunk_size: usize) -> Result<()> {
    let stdout = std::io::stdout();
    let (outcome, snapshot) = replay_to(path, chunk_size, &mut stdout.lock()).await?;

    eprintln!(
        "lines: {}  applied: {}  dropped: {}  ended: {:?}",
        outcome.lines, outcome.applied, outcome.dropped, outcome.ended
    );
    if let Some(snapshot) = snapshot {
        eprintln!("thread: {}", snapshot.id);
        eprintln!("messages: {}", snapshot.messages.len());
        eprintln!("tool steps: {}", snapshot.tool_steps.join(" -> "));
        if let Some(error) = snapshot.error {
            eprintln!("error: {}", error);
        }
    }
    Ok(())
}

/// Replay `path` in `chunk_size`-byte chunks, writing one normalized JSON
/// line per translated message to `out`
pub async fn replay_to(
    path: &Path,
    chunk_size: usize,
    out: &mut impl Write,
) -> Result<(StreamOutcome, Option<ThreadSnapshot>)> {
    if chunk_size == 0 {
        bail!("chunk size must be at least 1");
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let chunks: Vec<std::result::Result<Vec<u8>, std::convert::Infallible>> =
        bytes.chunks(chunk_size).map(|c| Ok(c.to_vec())).collect();

    let store = SharedStore::new();
    let (sink, cancel) = store.begin_stream();
    let mut write_error = None;

    let outcome = run_envelopes_with(
        futures::stream::iter(chunks),
        &sink,
        CancellationToken::new(),
        |message| {
            if write_error.is_some() {
                return;
            }
            let written = serde_json::to_string(message)
                .map_err(anyhow::Error::from)
                .and_then(|json| writeln!(out, "{}", json).map_err(anyhow::Error::from));
            if let Err(e) = written {
                write_error = Some(e);
            }
        },
    )
    .await;
    drop(cancel);

    if let Some(e) = write_error {
        return Err(e.context("failed to write normalized output"));
    }
    Ok((outcome, store.snapshot()))
}
