//! Print the effective configuration.

use newsreel_common::config::AppConfig;

pub fn run(app: &AppConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(app)?);
    Ok(())
}
