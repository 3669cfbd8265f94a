use crate::forecast::ForecastSeries;
use crate::storage::rates::RateRow;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use plotters::prelude::*;
use std::fs;
use std::path::Path;

const CHART_SIZE: (u32, u32) = (1000, 500);

/// Draws the per-currency forecast chart: raw rates, the rolling mean and the
/// dashed flat forecast overlaid on one time axis. `history` must be
/// non-empty and ordered ascending; callers skip currencies without data.
pub fn render_forecast_chart(
    path: &Path,
    cc: &str,
    history: &[RateRow],
    rolling: &[f64],
    forecast: &ForecastSeries,
) -> Result<()> {
    anyhow::ensure!(!history.is_empty(), "history must be non-empty");
    anyhow::ensure!(
        rolling.len() == history.len(),
        "rolling series must align with history"
    );

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let x_min = history[0].exchangedate;
    let x_max = forecast
        .points
        .last()
        .map(|(d, _)| *d)
        .unwrap_or(history[history.len() - 1].exchangedate);

    let values = history
        .iter()
        .map(|r| r.rate)
        .chain(rolling.iter().copied())
        .chain(forecast.points.iter().map(|(_, v)| *v));
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values {
        y_min = y_min.min(v);
        y_max = y_max.max(v);
    }
    let pad = ((y_max - y_min) * 0.05).max(0.1);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    draw(
        &root, cc, history, rolling, forecast, x_min, x_max,
        y_min - pad,
        y_max + pad,
    )
    .map_err(|e| anyhow::anyhow!("failed to draw chart for {cc}: {e}"))?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn draw(
    root: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    cc: &str,
    history: &[RateRow],
    rolling: &[f64],
    forecast: &ForecastSeries,
    x_min: NaiveDate,
    x_max: NaiveDate,
    y_min: f64,
    y_max: f64,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(root)
        .caption(format!("{cc} Exchange Rate"), ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Rate")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            history.iter().map(|r| (r.exchangedate, r.rate)),
            &BLUE,
        ))?
        .label("Rate")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(
            history
                .iter()
                .zip(rolling.iter())
                .map(|(r, v)| (r.exchangedate, *v)),
            &GREEN,
        ))?
        .label("7-day rolling avg")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

    chart
        .draw_series(DashedLineSeries::new(
            forecast.points.iter().copied(),
            8,
            4,
            RED.stroke_width(2),
        ))?
        .label("Forecast")
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
    use crate::forecast::{project, rolling_mean, ROLLING_WINDOW};
    use chrono::Duration;

    fn daily_rows(start: &str, rates: &[f64]) -> Vec<RateRow> {
        let start: NaiveDate = start.parse().unwrap();
        rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RateRow {
                cc: "USD".into(),
                txt: String::new(),
                rate: r,
                rate_per_100: r * 100.0,
                exchangedate: start + Duration::days(i as i64),
            })
            .collect()
    }

    #[test]
    fn renders_png_for_real_history() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("charts").join("forecast_USD.png");

        let rows = daily_rows("2025-05-01", &[40.0, 41.0, 42.0, 41.5, 42.5, 43.0, 43.5, 44.0]);
        let rates: Vec<f64> = rows.iter().map(|r| r.rate).collect();
        let rolling = rolling_mean(&rates, ROLLING_WINDOW);
        let forecast = project("USD", &rows).unwrap();

        render_forecast_chart(&path, "USD", &rows, &rolling, &forecast).unwrap();
        assert!(path.is_file());
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn rejects_empty_history() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("forecast_EUR.png");

        let rows = daily_rows("2025-05-01", &[41.0]);
        let forecast = project("USD", &rows).unwrap();

        let err = render_forecast_chart(&path, "EUR", &[], &[], &forecast).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }
}
