use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use pta_simulation::config::parse::{parse_mic_distribution, parse_mic_list, parse_regimen};
use pta_simulation::config::Config;
use pta_simulation::mic::MicDistribution;
use pta_simulation::output;
use pta_simulation::simulation::PtaSimulator;

/// Size of the cohort used to check sampled PK moments against the configuration.
const DIAGNOSTIC_COHORT: usize = 10_000;

#[derive(Parser)]
#[command(name = "pta_simulation")]
#[command(about = "Monte Carlo PTA and CFR simulation for antimicrobial dosing regimens")]
struct Cli {
    /// Configuration file path (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Number of patients to simulate per regimen
    #[arg(short, long)]
    patients: Option<usize>,

    /// Random seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// PK/PD target (%fT>MIC)
    #[arg(short, long)]
    target: Option<f64>,

    /// MIC values, e.g. "0.5,1,2,4"
    #[arg(long)]
    mics: Option<String>,

    /// MIC distribution, e.g. "1:0.2,2:0.5,4:0.3"
    #[arg(long)]
    mic_distribution: Option<String>,

    /// Dosing regimen as dose:interval (mg:h), repeatable
    #[arg(short, long = "regimen")]
    regimens: Vec<String>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let config = Config::from_file(path)
                    .with_context(|| format!("failed to load configuration from {:?}", path))?;
                info!("Loaded configuration from {:?}", path);
                config
            }
            None => {
                info!("Using built-in default configuration");
                Config::default()
            }
        };

        if let Some(patients) = self.patients {
            config.simulation.patients = patients;
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }
        if let Some(target) = self.target {
            config.simulation.target = target;
        }
        if let Some(mics) = &self.mics {
            config.mics = parse_mic_list(mics)?;
        }
        if let Some(distribution) = &self.mic_distribution {
            config.mic_distribution = MicDistribution::new(parse_mic_distribution(distribution)?)?;
        }
        if !self.regimens.is_empty() {
            config.regimens = self.regimens.iter()
                .map(|r| parse_regimen(r))
                .collect::<Result<Vec<_>, _>>()?;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config = cli.load_config()?;

    if let Some(path) = &cli.write_config {
        config.to_file(path)
            .with_context(|| format!("failed to write configuration to {:?}", path))?;
        info!("Configuration written to {:?}", path);
        return Ok(());
    }

    let simulator = PtaSimulator::new(config.clone())?;
    let results = simulator.run()?;
    let population = simulator.summarize_population(DIAGNOSTIC_COHORT)?;
    info!(
        "Simulation completed: {} regimens x {} MICs (seed {})",
        results.pta.regimens().len(),
        results.pta.mics().len(),
        results.seed
    );

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create output directory {:?}", cli.output))?;
    output::save_results(&results, &population, &config, &cli.output)?;
    info!("Results saved to {:?}", cli.output);

    Ok(())
}
