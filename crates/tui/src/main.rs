mod args;
mod renderer;
mod source;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use stracy_core::TimelineConfig;

use args::Args;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;
    log::info!(
        "bucket width {}ns, evict offscreen: {}",
        config.bucket_width_ns,
        config.evict_offscreen
    );

    let messages = source::spawn_reader(args.input.as_deref())?;
    renderer::run(config, messages, args.batch.max(1))
}

/// Terminal preset, then the config file, then command-line flags.
fn load_config(args: &Args) -> Result<TimelineConfig> {
    let mut config = match &args.config {
        Some(path) => overlay_file(TimelineConfig::terminal(), path)?,
        None => TimelineConfig::terminal(),
    };
    if let Some(ms) = args.bucket_ms {
        config.bucket_width_ns = ms.saturating_mul(1_000_000);
    }
    if args.evict {
        config.evict_offscreen = true;
    }
    config.validate()?;
    Ok(config)
}

fn overlay_file(base: TimelineConfig, path: &Path) -> Result<TimelineConfig> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let overrides: Value = serde_json::from_str(&data)
        .with_context(|| format!("invalid config {}", path.display()))?;
    let Value::Object(overrides) = overrides else {
        anyhow::bail!("config {} must be a JSON object", path.display());
    };
    let mut merged = serde_json::to_value(base)?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(overrides);
    }
    Ok(serde_json::from_value(merged)?)
}
