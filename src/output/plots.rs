//! SVG charts: PTA versus MIC per regimen and CFR per regimen, each with a
//! dashed reference line at the attainment goal. Both are drawn on a 0-100 %
//! scale regardless of the export scale.

use crate::simulation::{CfrResult, PtaMatrix};
use crate::error::{PTAError, PTAResult};
use plotters::prelude::*;
use std::error::Error;
use std::io::Write;

const CHART_SIZE: (u32, u32) = (1000, 600);
const DASHES: usize = 40;
const SERIES_COLORS: [RGBColor; 6] = [
    BLUE,
    GREEN,
    MAGENTA,
    CYAN,
    BLACK,
    RGBColor(255, 140, 0),
];

pub fn write_pta_plot<W: Write>(matrix: &PtaMatrix, goal: f64, mut sink: W) -> PTAResult<()> {
    sink.write_all(render_pta_plot(matrix, goal)?.as_bytes())?;
    Ok(())
}

pub fn write_cfr_chart<W: Write>(cfr: &CfrResult, goal: f64, mut sink: W) -> PTAResult<()> {
    sink.write_all(render_cfr_chart(cfr, goal)?.as_bytes())?;
    Ok(())
}

pub fn render_pta_plot(matrix: &PtaMatrix, goal: f64) -> PTAResult<String> {
    let mut svg = String::new();
    draw_pta_plot(matrix, goal, &mut svg).map_err(|e| PTAError::Plot(e.to_string()))?;
    Ok(svg)
}

pub fn render_cfr_chart(cfr: &CfrResult, goal: f64) -> PTAResult<String> {
    let mut svg = String::new();
    draw_cfr_chart(cfr, goal, &mut svg).map_err(|e| PTAError::Plot(e.to_string()))?;
    Ok(svg)
}

/// Alternating segments of a horizontal line; `log_x` spaces them evenly on a log axis.
fn dashed_line(x0: f64, x1: f64, y: f64, log_x: bool) -> Vec<PathElement<(f64, f64)>> {
    let (a, b) = if log_x { (x0.ln(), x1.ln()) } else { (x0, x1) };
    let step = (b - a) / (2 * DASHES) as f64;
    let to_x = |t: f64| if log_x { t.exp() } else { t };

    (0..DASHES)
        .map(|i| {
            let start = a + step * (2 * i) as f64;
            PathElement::new(vec![(to_x(start), y), (to_x(start + step), y)], RED.stroke_width(2))
        })
        .collect()
}

fn draw_pta_plot(matrix: &PtaMatrix, goal: f64, svg: &mut String) -> Result<(), Box<dyn Error>> {
    let mics = matrix.mics();
    let (lowest, highest) = match (mics.first(), mics.last()) {
        (Some(&lo), Some(&hi)) => (lo / 1.5, hi * 1.5),
        _ => return Err("PTA matrix has no MIC values".into()),
    };

    let root = SVGBackend::with_string(svg, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Percentage of Subjects Achieving Target %fT>MIC", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((lowest..highest).log_scale(), 0.0f64..100.0)?;

    chart
        .configure_mesh()
        .x_desc("MIC (mg/L)")
        .y_desc("PTA (%)")
        .x_label_formatter(&|x| format!("{}", x))
        .draw()?;

    for (i, row) in matrix.rows().enumerate() {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                row.iter().map(|(mic, pta)| (mic, pta * 100.0)),
                color.stroke_width(2),
            ))?
            .label(row.regimen.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    let goal_percent = goal * 100.0;
    chart
        .draw_series(dashed_line(lowest, highest, goal_percent, true))?
        .label(format!("{}% goal", goal_percent))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_cfr_chart(cfr: &CfrResult, goal: f64, svg: &mut String) -> Result<(), Box<dyn Error>> {
    let entries = cfr.entries();
    if entries.is_empty() {
        return Err("CFR result has no regimens".into());
    }
    let right = entries.len() as f64 - 0.5;

    let root = SVGBackend::with_string(svg, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Cumulative Fraction of Response (CFR) by Regimen", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(20)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..right, 0.0f64..105.0)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .y_desc("CFR (%)")
        .draw()?;

    for (i, entry) in entries.iter().enumerate() {
        let x = i as f64;
        let height = (entry.cfr * 100.0).min(100.0);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.35, 0.0), (x + 0.35, height)],
            BLUE.mix(0.7).filled(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            format!("{} ({:.1}%)", entry.label, height),
            (x - 0.35, height.min(95.0) + 4.0),
            ("sans-serif", 14).into_font(),
        )))?;
    }

    let goal_percent = goal * 100.0;
    chart
        .draw_series(dashed_line(-0.5, right, goal_percent, false))?
        .label(format!("{}% goal", goal_percent))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dosing::Regimen;
    use crate::mic::{MicDistribution, MicFrequency};

    fn matrix() -> PtaMatrix {
        PtaMatrix::new(
            vec![Regimen::new(1000.0, 12.0), Regimen::new(2000.0, 24.0)],
            vec![0.5, 1.0, 2.0, 4.0],
            vec![vec![1.0, 0.98, 0.7, 0.1], vec![0.99, 0.96, 0.9, 0.2]],
            1000,
            55.0,
        )
    }

    #[test]
    fn test_pta_plot_has_one_curve_per_regimen() {
        let svg = render_pta_plot(&matrix(), 0.95).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("1000 mg q12h"));
        assert!(svg.contains("2000 mg q24h"));
        assert!(svg.contains("95% goal"));
        assert!(svg.contains("MIC (mg/L)"));
    }

    #[test]
    fn test_cfr_chart_labels_each_bar() {
        let distribution = MicDistribution::new(vec![
            MicFrequency::new(1.0, 0.5),
            MicFrequency::new(2.0, 0.5),
        ]).unwrap();
        let cfr = CfrResult::from_matrix(&matrix(), &distribution).unwrap();

        let svg = render_cfr_chart(&cfr, 0.9).unwrap();
        assert!(svg.contains("1000 mg q12h (84.0%)"));
        assert!(svg.contains("2000 mg q24h (93.0%)"));
        assert!(svg.contains("90% goal"));
    }

    #[test]
    fn test_plot_does_not_modify_matrix() {
        let m = matrix();
        let before = m.clone();
        let mut buffer = Vec::new();
        write_pta_plot(&m, 0.95, &mut buffer).unwrap();
        assert_eq!(m, before);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_dashes_span_log_axis() {
        let dashes = dashed_line(0.1, 100.0, 95.0, true);
        assert_eq!(dashes.len(), DASHES);
    }
}
