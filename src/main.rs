use std::path::PathBuf;

use anyhow::{Context, Result};
use tmem132d_plot::config::AnalysisConfig;
use tmem132d_plot::pipeline;

/// `tmem132d-plot [CONFIG.json ...]`
///
/// Without arguments both built-in analyses run on their default paths.
fn main() -> Result<()> {
    env_logger::init();

    let config_paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let configs = if config_paths.is_empty() {
        AnalysisConfig::presets()
    } else {
        config_paths
            .iter()
            .map(|p| AnalysisConfig::from_json_file(p))
            .collect::<Result<Vec<_>>>()?
    };

    for config in &configs {
        log::info!("Running {} on {}", config.name, config.input.display());
        pipeline::run(config).with_context(|| format!("analysis '{}' failed", config.name))?;
    }
    Ok(())
}
