//! # diffdedup agent binary
//!
//! Reads JSON-line input events on stdin, deduplicates them, and writes
//! JSON-line output events on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use diffdedup_agent::{AgentConfig, Stage, StageHandle};
use diffdedup_proto::codec::{from_json_line, to_json_line};
use diffdedup_proto::{WireInput, WireOutput};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting diffdedup agent");

    let config = AgentConfig::from_env()?;
    let dedup = config
        .build_dedup()
        .context("Invalid operator configuration (set DIFFDEDUP_KEY_POINTER)")?;

    tracing::info!(
        key = ?config.key_pointer,
        sort = ?config.sort_pointer,
        policy = %config.policy,
        capacity = config.channel_capacity,
        "Agent configured"
    );

    let StageHandle {
        input,
        output,
        mut task,
    } = Stage::new(dedup).spawn(config.channel_capacity);

    let ingress = tokio::spawn(read_stdin(input));
    let egress = tokio::spawn(write_stdout(output));

    tokio::select! {
        result = &mut task => {
            let stats = result.context("Stage task failed")??;
            tracing::info!(
                events_in = stats.events_in,
                events_out = stats.events_out,
                clusters = stats.clusters,
                "Stage stopped"
            );
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            return Ok(());
        }
    }

    ingress.await.context("Ingress task failed")??;
    egress.await.context("Egress task failed")??;

    Ok(())
}

/// Forward stdin lines to the stage until EOF or the stage goes away.
async fn read_stdin(input: mpsc::Sender<WireInput>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        line_no += 1;
        let Some(op) = from_json_line::<WireInput>(&line)
            .with_context(|| format!("Invalid input event on line {line_no}"))?
        else {
            continue;
        };

        if input.send(op).await.is_err() {
            tracing::debug!("Stage closed, stopping ingress");
            break;
        }
    }

    Ok(())
}

/// Write stage output to stdout, one JSON line per event.
async fn write_stdout(mut output: mpsc::Receiver<WireOutput>) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(op) = output.recv().await {
        let mut line = to_json_line(&op)?;
        line.push('\n');
        stdout
            .write_all(line.as_bytes())
            .await
            .context("Failed to write stdout")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }

    Ok(())
}
