//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

use netsight_common::Category;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "netsight",
    version,
    about = "Animated walkthroughs of networking concepts"
)]
pub struct Args {
    /// Concept to play: dns, loadbalancer, tcp, http, cdn, vpn.
    #[arg(required_unless_present = "list")]
    pub category: Option<Category>,

    /// Path to a JSON5 configuration file merged over the bundled scenarios.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Playback speed multiplier (2.0 plays twice as fast).
    #[arg(long)]
    pub speed: Option<f64>,

    /// Seed for the cosmetic metrics, for reproducible playback.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop playback after this many seconds instead of the category default.
    #[arg(long)]
    pub budget_secs: Option<u64>,

    /// Emit one JSON object per event instead of text lines.
    #[arg(long)]
    pub json: bool,

    /// List the available categories and exit.
    #[arg(long)]
    pub list: bool,
}

impl Args {
    /// Parse CLI arguments from the process environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category_and_overrides() {
        let args = Args::try_parse_from([
            "netsight",
            "tcp",
            "--speed",
            "4",
            "--seed",
            "11",
            "--config",
            "demo.json5",
            "--json",
        ])
        .unwrap();

        assert_eq!(args.category, Some(Category::Tcp));
        assert_eq!(args.speed, Some(4.0));
        assert_eq!(args.seed, Some(11));
        assert_eq!(args.config, Some(PathBuf::from("demo.json5")));
        assert!(args.json);
        assert!(!args.list);
    }

    #[test]
    fn test_list_without_category() {
        let args = Args::try_parse_from(["netsight", "--list"]).unwrap();
        assert!(args.list);
        assert_eq!(args.category, None);
    }

    #[test]
    fn test_category_required() {
        assert!(Args::try_parse_from(["netsight"]).is_err());
        assert!(Args::try_parse_from(["netsight", "smtp"]).is_err());
    }

    #[test]
    fn test_category_alias() {
        let args = Args::try_parse_from(["netsight", "lb"]).unwrap();
        assert_eq!(args.category, Some(Category::LoadBalancer));
    }
}
