//! Check command - validate a config file
//!
//! Loads the file through the same path `replay` uses, builds the broker
//! topology and prints it, so a broken config fails here instead of halfway
//! through a replay.

use std::fmt::{self, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use tracemesh_config::Config;
use tracemesh_correlate::BrokerRegistry;

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the check command
pub fn run(args: &CheckArgs, path: &Path) -> Result<()> {
    let config = Config::from_file(path)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    let report = CheckReport::build(&config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render()?);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CheckReport {
    topic: String,
    brokers: Vec<BrokerLine>,
    links: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct BrokerLine {
    name: String,
    region: String,
    location: Option<&'static str>,
}

impl CheckReport {
    fn build(config: &Config) -> Result<Self> {
        let topology = BrokerRegistry::new(config.broker_records())?;

        let brokers = topology
            .iter()
            .map(|broker| BrokerLine {
                name: broker.name.clone(),
                region: broker.region.clone(),
                location: broker.coordinates().map(|c| c.location),
            })
            .collect();

        Ok(Self {
            topic: config.telemetry.topic.clone(),
            brokers,
            links: topology.links(),
        })
    }

    fn render(&self) -> std::result::Result<String, fmt::Error> {
        let mut out = String::new();
        writeln!(out, "telemetry topic: {}", self.topic)?;

        writeln!(out, "brokers: {}", self.brokers.len())?;
        for broker in &self.brokers {
            writeln!(
                out,
                "  {:<16} {:<16} {}",
                broker.name,
                broker.region,
                broker.location.unwrap_or("-")
            )?;
        }

        writeln!(out, "links: {}", self.links.len())?;
        for (a, b) in &self.links {
            writeln!(out, "  {a} <-> {b}")?;
        }
        Ok(out)
    }
}
