mod scenario;

use anyhow::Context;
use colloquy_api_types::TestStatus;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

const SCENARIO_ENV: &str = "COLLOQUY_SCENARIO";
const DEFAULT_SCENARIO: &str = "scenario.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(SCENARIO_ENV).ok())
        .unwrap_or_else(|| DEFAULT_SCENARIO.to_string());

    info!(path = %path, "loading scenario");
    let scenario = Scenario::from_file(&path)
        .with_context(|| format!("failed to load scenario from {path}"))?;

    let report = scenario.run().await.context("failed to run scenario")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize test report")?
    );

    if report.status == TestStatus::Failed {
        warn!(test = %report.test_name, "scenario failed");
        anyhow::bail!("scenario '{}' failed", report.test_name);
    }

    info!(test = %report.test_name, "scenario passed");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
