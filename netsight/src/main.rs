//! NetSight command-line player.
//!
//! Plays one networking walkthrough in the terminal until it finishes, its
//! playback budget runs out or Ctrl+C is pressed.

use std::io::Write;

use anyhow::{Context, Result};

use netsight::{AppConfig, Args, OutputFormat, Player, RandomMetrics};
use netsight_common::{Category, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration, bundled scenarios first
    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;

    // CLI overrides
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(speed) = args.speed {
        config.playback.speed = speed;
    }
    if args.seed.is_some() {
        config.playback.seed = args.seed;
    }
    if args.budget_secs.is_some() {
        config.playback.budget_secs = args.budget_secs;
    }
    config.validate().context("invalid command-line overrides")?;

    init_tracing(&config.logging)?;

    if args.list {
        return list(&config);
    }

    let Some(category) = args.category else {
        anyhow::bail!("no category given, try --list");
    };

    let scenario = config.scenarios.build(category)?;
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    tracing::info!(
        category = %category,
        seed = ?config.playback.seed,
        "NetSight {} starting",
        env!("CARGO_PKG_VERSION")
    );

    let mut player = Player::new(
        scenario,
        Box::new(RandomMetrics::new(config.playback.seed)),
        std::io::stdout(),
    )
    .with_speed(config.playback.speed)
    .with_budget(config.budget(category))
    .with_format(format);

    // Run until finished, out of budget or Ctrl+C
    let report = player.run().await?;
    tracing::debug!(runs = report.runs_started, "Goodbye!");

    Ok(())
}

/// Print the available categories.
fn list(config: &AppConfig) -> Result<()> {
    let mut out = std::io::stdout().lock();

    for category in Category::ALL {
        let playbook = config.scenarios.playbook(category);
        writeln!(
            out,
            "{:<13} {:<20} {:>2} steps, {:>5} per pass{}  {}",
            category.as_str(),
            category.title(),
            playbook.step_count(),
            netsight::render::format_duration(playbook.pass_duration()),
            if playbook.looping { ", loops" } else { "" },
            category.description()
        )?;
    }

    Ok(())
}
