use crate::config::PlanConfig;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse a plan file
pub fn load_config(config_path: &Path) -> Result<PlanConfig> {
    info!("Loading plan from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open plan file '{}'", config_path.display()))?;

    let config: PlanConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse plan file '{}'", config_path.display()))?;

    config.validate()?;

    info!(
        "Plan defines {} pools and {} networks",
        config.ipam.as_ref().map_or(0, |ipam| ipam.all_pools().len()),
        config.networks.len()
    );
    Ok(config)
}
