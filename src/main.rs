use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use needsheet::api::{Cli, Command, RecordPayload, run_http_server, settle_record};
use needsheet::core::{FormRecord, FormSession, Report};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("needsheet=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve { bind, port } => run_http_server(bind, port)
            .await
            .with_context(|| format!("HTTP server on {bind}:{port} failed")),
        Command::Settle { input } => {
            let settled = settle_record(read_record(input.as_deref())?)?;
            println!("{}", serde_json::to_string_pretty(&settled.record)?);
            Ok(())
        }
        Command::Report { input, json, as_of } => {
            let (session, _) = FormSession::from_record(read_record(input.as_deref())?)?;
            let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
            let report = Report::from_snapshot(&session.snapshot(), as_of);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render_text());
            }
            Ok(())
        }
    }
}

fn read_record(input: Option<&Path>) -> anyhow::Result<FormRecord> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read stdin")?;
            raw
        }
    };
    let payload: RecordPayload =
        serde_json::from_str(&raw).context("input must be a flat JSON object")?;
    Ok(payload.into_record())
}
