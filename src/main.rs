use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use env_logger::Env;
use ipnet::IpNet;
use log::{info, LevelFilter};
use std::path::PathBuf;

use ipam_planner::block::Resolver;
use ipam_planner::config_loader;
use ipam_planner::orchestrator::{self, OutputFormat};
use ipam_planner::utils::parse_binding;

/// Plan IPAM pools and tiered subnets from a YAML plan file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the plan YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,

    /// Bind a deferred token to a concrete CIDR, as token=cidr (repeatable)
    #[arg(long = "resolve", value_parser = parse_binding)]
    resolve: Vec<(String, IpNet)>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // RUST_LOG wins; otherwise the plan's log level applies once the plan is loaded
    let env_filter = std::env::var_os("RUST_LOG").is_some();
    if env_filter {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    } else {
        env_logger::Builder::new().filter_level(LevelFilter::Trace).init();
        log::set_max_level(LevelFilter::Info);
    }

    info!("Plan file: {:?}", args.config);
    let config = config_loader::load_config(&args.config)?;
    if !env_filter {
        log::set_max_level(plan_log_level(config.general.log_level.as_deref())?);
    }

    let mut resolver = Resolver::new();
    for (token, net) in &args.resolve {
        info!("Binding ${{{}}} to {}", token, net);
        resolver.bind(token.clone(), *net);
    }

    let report = orchestrator::build_plan(&config, &resolver)?;
    match &args.output {
        Some(path) => orchestrator::write_report(&report, path, args.format)?,
        None => print!("{}", orchestrator::render_report(&report, args.format)?),
    }

    info!("Planned {} networks", report.networks.len());
    Ok(())
}

/// Level filter for a plan's `general.log_level`, `info` when unset
fn plan_log_level(level: Option<&str>) -> Result<LevelFilter> {
    let level = level.unwrap_or("info");
    level
        .parse()
        .map_err(|e| eyre!("Invalid log level '{}': {}", level, e))
}
