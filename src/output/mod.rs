pub mod plots;

use crate::config::{Config, OutputScale};
use crate::simulation::{CfrResult, PopulationSummary, PtaMatrix, SimulationResults};
use crate::error::{ensure_finite, PTAError, PTAResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use log::{debug, info};

pub use plots::{write_cfr_chart, write_pta_plot};

pub const PTA_FILE: &str = "pta_matrix.csv";
pub const CFR_FILE: &str = "cfr.csv";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";
pub const POPULATION_FILE: &str = "population_summary.json";
pub const REPORT_FILE: &str = "simulation_report.md";
pub const PTA_PLOT_FILE: &str = "pta_vs_mic.svg";
pub const CFR_CHART_FILE: &str = "cfr_by_regimen.svg";

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub patients: usize,
    pub target: f64,
    pub attainment_goal: f64,
    pub scale: OutputScale,
    pub mic50: Option<f64>,
    pub mic90: Option<f64>,
    pub regimens: Vec<RegimenSummary>,
}

#[derive(Debug, Serialize)]
pub struct RegimenSummary {
    pub label: String,
    pub dose: f64,
    pub interval: f64,
    pub cfr: f64,
    pub cfr_meets_goal: bool,
    pub breakpoint: Option<f64>,  // Highest MIC with PTA >= goal
}

impl RunSummary {
    pub fn new(results: &SimulationResults, config: &Config) -> Self {
        let goal = config.simulation.attainment_goal;
        let scale = config.output.scale;

        let regimens = results.pta.rows()
            .zip(results.cfr.entries())
            .map(|(row, entry)| RegimenSummary {
                label: entry.label.clone(),
                dose: row.regimen.dose,
                interval: row.regimen.interval,
                cfr: scale.apply(entry.cfr),
                cfr_meets_goal: entry.cfr >= goal,
                breakpoint: row.breakpoint(goal),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            seed: results.seed,
            patients: results.pta.patients(),
            target: results.pta.target(),
            attainment_goal: goal,
            scale,
            mic50: config.mic_distribution.quantile(0.5),
            mic90: config.mic_distribution.quantile(0.9),
            regimens,
        }
    }
}

/// Writes every export. Called only once all results are final.
///
/// All content is rendered in memory first; files are staged under temporary
/// names and only renamed into place once every one of them was written.
pub fn save_results<P: AsRef<Path>>(
    results: &SimulationResults,
    population: &PopulationSummary,
    config: &Config,
    output_dir: P,
) -> PTAResult<()> {
    let output_path = output_dir.as_ref();
    let files = render_outputs(results, population, config)?;
    write_all_or_nothing(output_path, &files)?;

    info!("All results saved to {:?}", output_path);
    Ok(())
}

fn render_outputs(
    results: &SimulationResults,
    population: &PopulationSummary,
    config: &Config,
) -> PTAResult<Vec<(&'static str, Vec<u8>)>> {
    let scale = config.output.scale;
    let goal = config.simulation.attainment_goal;
    let summary = RunSummary::new(results, config);

    let mut pta_csv = Vec::new();
    write_pta_csv(&results.pta, scale, &mut pta_csv)?;
    let mut cfr_csv = Vec::new();
    write_cfr_csv(&results.cfr, scale, &mut cfr_csv)?;
    let mut pta_plot = Vec::new();
    write_pta_plot(&results.pta, goal, &mut pta_plot)?;
    let mut cfr_chart = Vec::new();
    write_cfr_chart(&results.cfr, goal, &mut cfr_chart)?;

    Ok(vec![
        (PTA_FILE, pta_csv),
        (CFR_FILE, cfr_csv),
        (RUN_SUMMARY_FILE, serde_json::to_vec_pretty(&summary)?),
        (POPULATION_FILE, serde_json::to_vec_pretty(population)?),
        (PTA_PLOT_FILE, pta_plot),
        (CFR_CHART_FILE, cfr_chart),
        (REPORT_FILE, render_report(results, &summary, population).into_bytes()),
    ])
}

fn staging_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{}.partial", name))
}

fn write_all_or_nothing(dir: &Path, files: &[(&str, Vec<u8>)]) -> PTAResult<()> {
    let staged = files.iter()
        .try_for_each(|(name, content)| std::fs::write(staging_path(dir, name), content));

    if let Err(e) = staged {
        for (name, _) in files {
            // Staged files that were never created are expected here
            let _ = std::fs::remove_file(staging_path(dir, name));
        }
        return Err(PTAError::Io(e));
    }

    for (name, _) in files {
        std::fs::rename(staging_path(dir, name), dir.join(name))?;
        debug!("Wrote {}", name);
    }
    Ok(())
}

/// One row per MIC, one column per regimen; the unit is part of each column header.
pub fn write_pta_csv<W: Write>(matrix: &PtaMatrix, scale: OutputScale, sink: W) -> PTAResult<()> {
    let mut writer = csv::Writer::from_writer(sink);

    let mut header = vec!["MIC (mg/L)".to_string()];
    header.extend(matrix.regimens().iter().map(|r| format!("{} PTA ({})", r.label(), scale.unit())));
    writer.write_record(&header)?;

    for &mic in matrix.mics() {
        let mut record = vec![mic.to_string()];
        for i in 0..matrix.regimens().len() {
            let pta = matrix.get(i, mic).ok_or(PTAError::MismatchedMICSet { mic })?;
            record.push(scale.apply(ensure_finite("PTA", pta)?).to_string());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_cfr_csv<W: Write>(cfr: &CfrResult, scale: OutputScale, sink: W) -> PTAResult<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(&["Regimen".to_string(), format!("CFR ({})", scale.unit())])?;

    for entry in cfr.entries() {
        let value = ensure_finite("CFR", entry.cfr)?;
        writer.write_record(&[entry.label.clone(), scale.apply(value).to_string()])?;
    }

    writer.flush()?;
    Ok(())
}

/// Markdown report embedding both charts.
pub fn render_report(
    results: &SimulationResults,
    summary: &RunSummary,
    population: &PopulationSummary,
) -> String {
    let unit = summary.scale.unit();
    let goal = summary.scale.apply(summary.attainment_goal);

    let mut pta_table = String::from("| MIC (mg/L) |");
    for regimen in results.pta.regimens() {
        pta_table.push_str(&format!(" {} |", regimen));
    }
    pta_table.push_str("\n|---|");
    pta_table.push_str(&"---|".repeat(results.pta.regimens().len()));
    for (j, mic) in results.pta.mics().iter().enumerate() {
        pta_table.push_str(&format!("\n| {} |", mic));
        for row in results.pta.rows() {
            pta_table.push_str(&format!(" {:.3} |", summary.scale.apply(row.values[j])));
        }
    }

    let mut cfr_table = String::from("| Regimen | Daily dose (mg) | CFR | Meets goal | PK/PD breakpoint (mg/L) |\n|---|---|---|---|---|");
    for (regimen, row) in summary.regimens.iter().zip(results.pta.rows()) {
        cfr_table.push_str(&format!(
            "\n| {} | {} | {:.3} | {} | {} |",
            regimen.label,
            row.regimen.daily_dose(),
            regimen.cfr,
            if regimen.cfr_meets_goal { "yes" } else { "no" },
            regimen.breakpoint.map_or_else(|| "none".to_string(), |b| b.to_string()),
        ));
    }

    format!(
        r#"# PTA / CFR Simulation Report

## Simulation Overview
- **Generated**: {}
- **Simulated patients per regimen**: {}
- **PK/PD target**: {}% fT>MIC
- **Attainment goal**: {} ({})
- **Seed**: {}
- **MIC50 / MIC90**: {} / {} mg/L

## Population Parameters
| Parameter | Target mean | Target SD | Sampled mean | Sampled SD |
|---|---|---|---|---|
| Fraction unbound | {:.4} | {:.4} | {:.4} | {:.4} |
| Volume of distribution (L) | {:.3} | {:.3} | {:.3} | {:.3} |
| Clearance (L/h) | {:.3} | {:.3} | {:.3} | {:.3} |

Sampled elimination half-life: {:.2} h (SD {:.2} h).

## Probability of Target Attainment ({})
{}

![PTA versus MIC]({})

## Cumulative Fraction of Response ({})
{}

![CFR by regimen]({})

## Files Generated
- `{}`: PTA by MIC (rows) and regimen (columns)
- `{}`: CFR per regimen
- `{}`: run parameters, CFRs and breakpoints
- `{}`: sampled versus configured PK parameter moments
- `{}`: PTA versus MIC curve per regimen
- `{}`: CFR bar per regimen
"#,
        summary.generated_at.to_rfc3339(),
        summary.patients,
        summary.target,
        goal,
        unit,
        summary.seed,
        fmt_mic(summary.mic50),
        fmt_mic(summary.mic90),
        population.fraction_unbound.target_mean,
        population.fraction_unbound.target_sd,
        population.fraction_unbound.mean,
        population.fraction_unbound.sd,
        population.volume_of_distribution.target_mean,
        population.volume_of_distribution.target_sd,
        population.volume_of_distribution.mean,
        population.volume_of_distribution.sd,
        population.clearance.target_mean,
        population.clearance.target_sd,
        population.clearance.mean,
        population.clearance.sd,
        population.half_life.mean,
        population.half_life.sd,
        unit,
        pta_table,
        PTA_PLOT_FILE,
        unit,
        cfr_table,
        CFR_CHART_FILE,
        PTA_FILE,
        CFR_FILE,
        RUN_SUMMARY_FILE,
        POPULATION_FILE,
        PTA_PLOT_FILE,
        CFR_CHART_FILE,
    )
}

fn fmt_mic(mic: Option<f64>) -> String {
    mic.map_or_else(|| "n/a".to_string(), |m| m.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dosing::Regimen;
    use crate::mic::{MicDistribution, MicFrequency};
    use crate::simulation::PtaSimulator;

    const ALL_FILES: [&str; 7] = [
        PTA_FILE,
        CFR_FILE,
        RUN_SUMMARY_FILE,
        POPULATION_FILE,
        PTA_PLOT_FILE,
        CFR_CHART_FILE,
        REPORT_FILE,
    ];

    fn matrix() -> PtaMatrix {
        PtaMatrix::new(
            vec![Regimen::new(1000.0, 12.0), Regimen::new(2000.0, 24.0)],
            vec![1.0, 2.0],
            vec![vec![1.0, 0.5], vec![0.75, 0.25]],
            4,
            55.0,
        )
    }

    #[test]
    fn test_pta_csv_layout() {
        let mut buffer = Vec::new();
        write_pta_csv(&matrix(), OutputScale::Fraction, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "MIC (mg/L),1000 mg q12h PTA (fraction),2000 mg q24h PTA (fraction)");
        assert_eq!(lines[1], "1,1,0.75");
        assert_eq!(lines[2], "2,0.5,0.25");
    }

    #[test]
    fn test_percent_scale() {
        let mut buffer = Vec::new();
        write_pta_csv(&matrix(), OutputScale::Percent, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.lines().next().unwrap().contains("PTA (%)"));
        assert_eq!(text.lines().nth(1).unwrap(), "1,100,75");
    }

    #[test]
    fn test_cfr_csv_layout() {
        let distribution = MicDistribution::new(vec![
            MicFrequency::new(1.0, 0.5),
            MicFrequency::new(2.0, 0.5),
        ]).unwrap();
        let cfr = CfrResult::from_matrix(&matrix(), &distribution).unwrap();

        let mut buffer = Vec::new();
        write_cfr_csv(&cfr, OutputScale::Fraction, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines, vec!["Regimen,CFR (fraction)", "1000 mg q12h,0.75", "2000 mg q24h,0.5"]);
    }

    #[test]
    fn test_non_finite_value_is_not_written() {
        let bad = PtaMatrix::new(vec![Regimen::new(1000.0, 12.0)], vec![1.0], vec![vec![f64::NAN]], 1, 55.0);
        let mut buffer = Vec::new();
        assert!(write_pta_csv(&bad, OutputScale::Fraction, &mut buffer).is_err());
    }

    #[test]
    fn test_save_results_writes_all_files() {
        let mut config = Config::default();
        config.simulation.patients = 200;
        config.simulation.seed = Some(1);
        config.output.scale = OutputScale::Percent;

        let simulator = PtaSimulator::new(config.clone()).unwrap();
        let results = simulator.run().unwrap();
        let population = simulator.summarize_population(200).unwrap();

        let dir = std::env::temp_dir().join(format!("pta_simulation_output_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        save_results(&results, &population, &config, &dir).unwrap();

        for file in ALL_FILES {
            assert!(dir.join(file).exists(), "missing {}", file);
            assert!(!staging_path(&dir, file).exists());
        }
        let svg = std::fs::read_to_string(dir.join(PTA_PLOT_FILE)).unwrap();
        assert!(svg.contains("2000 mg q24h"));
        let report = std::fs::read_to_string(dir.join(REPORT_FILE)).unwrap();
        assert!(report.contains(PTA_PLOT_FILE));
        assert!(report.contains(CFR_CHART_FILE));

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(RUN_SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(summary["seed"], 1);
        assert_eq!(summary["scale"], "percent");
        assert_eq!(summary["mic50"], 4.0);
        assert_eq!(summary["regimens"].as_array().unwrap().len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_write_leaves_no_result_files() {
        let mut config = Config::default();
        config.simulation.patients = 50;
        config.simulation.seed = Some(2);

        let simulator = PtaSimulator::new(config.clone()).unwrap();
        let results = simulator.run().unwrap();
        let population = simulator.summarize_population(50).unwrap();

        let dir = std::env::temp_dir().join(format!("pta_simulation_blocked_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // A directory where the report would be staged makes that write fail
        std::fs::create_dir_all(staging_path(&dir, REPORT_FILE)).unwrap();

        let result = save_results(&results, &population, &config, &dir);
        assert!(matches!(result, Err(PTAError::Io(_))));
        for file in ALL_FILES {
            assert!(!dir.join(file).exists(), "unexpected {}", file);
        }
        assert!(!staging_path(&dir, PTA_FILE).exists());
        assert!(!staging_path(&dir, CFR_CHART_FILE).exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
