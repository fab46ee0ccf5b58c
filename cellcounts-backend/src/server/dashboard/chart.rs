use cellcounts_core::{
    comparison::ComparisonPoint,
    model::{Population, Response},
};
use strum::VariantArray;
use svg::{
    Document,
    node::element::{Circle, Line, Rectangle, Text},
};

use super::Theme;

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 460.0;
const LEFT: f64 = 70.0;
const RIGHT: f64 = WIDTH - 20.0;
const TOP: f64 = 50.0;
const BOTTOM: f64 = HEIGHT - 70.0;
const BOX_WIDTH: f64 = 44.0;
const WHISKER_IQR: f64 = 1.5;

/// Five-number summary of one box, with whiskers at the most extreme values
/// within 1.5 IQR of the quartiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
}

/// Linear interpolation between closest ranks; `sorted` must be ascending.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

impl BoxStats {
    #[must_use]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);
        let reach = WHISKER_IQR * (q3 - q1);

        let lower_whisker = sorted
            .iter()
            .copied()
            .find(|v| *v >= q1 - reach)
            .unwrap_or(q1);
        let upper_whisker = sorted
            .iter()
            .rev()
            .copied()
            .find(|v| *v <= q3 + reach)
            .unwrap_or(q3);

        Some(Self {
            lower_whisker,
            q1,
            median,
            q3,
            upper_whisker,
        })
    }
}

fn group_color(theme: &Theme, response: Response) -> &str {
    match response {
        Response::Yes => &theme.responder,
        Response::No => &theme.non_responder,
    }
}

/// Box plot of every population's percentage, responders next to
/// non-responders, with the individual samples overlaid.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub fn box_plot(points: &[ComparisonPoint], theme: &Theme) -> String {
    let mut doc = Document::new()
        .set("viewBox", (0, 0, WIDTH, HEIGHT))
        .set("width", WIDTH)
        .set("height", HEIGHT)
        .set("font-family", theme.font_family.as_str())
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", WIDTH)
                .set("height", HEIGHT)
                .set("fill", "#ffffff"),
        )
        .add(
            Text::new("Cell Population Relative Frequencies: Responders vs Non-Responders")
                .set("x", LEFT)
                .set("y", 28)
                .set("font-size", 16)
                .set("fill", "#000000"),
        );

    if points.is_empty() {
        return doc
            .add(
                Text::new("No samples in this cohort")
                    .set("x", WIDTH / 2.0)
                    .set("y", HEIGHT / 2.0)
                    .set("text-anchor", "middle")
                    .set("font-size", 14),
            )
            .to_string();
    }

    let max = points.iter().map(|p| p.percentage).fold(0.0_f64, f64::max);
    let y_max = ((max / 10.0).ceil() * 10.0).max(10.0);
    let y = |value: f64| BOTTOM - (value / y_max) * (BOTTOM - TOP);

    let mut tick = 0.0;
    while tick <= y_max {
        doc = doc
            .add(
                Line::new()
                    .set("x1", LEFT)
                    .set("y1", y(tick))
                    .set("x2", RIGHT)
                    .set("y2", y(tick))
                    .set("stroke", "#e5e7eb")
                    .set("stroke-width", 1),
            )
            .add(
                Text::new(format!("{tick:.0}"))
                    .set("x", LEFT - 8.0)
                    .set("y", y(tick) + 4.0)
                    .set("text-anchor", "end")
                    .set("font-size", 11),
            );
        tick += 10.0;
    }
    doc = doc.add(
        Text::new("Relative frequency (%)")
            .set("x", 18)
            .set("y", (TOP + BOTTOM) / 2.0)
            .set("text-anchor", "middle")
            .set("font-size", 12)
            .set("transform", format!("rotate(-90 18 {})", (TOP + BOTTOM) / 2.0)),
    );

    let slot = (RIGHT - LEFT) / Population::VARIANTS.len() as f64;

    for (i, &population) in Population::VARIANTS.iter().enumerate() {
        let center = LEFT + slot * (i as f64 + 0.5);

        doc = doc.add(
            Text::new(population.label())
                .set("x", center)
                .set("y", BOTTOM + 22.0)
                .set("text-anchor", "middle")
                .set("font-size", 12),
        );

        for (response, offset) in [(Response::Yes, -0.6), (Response::No, 0.6)] {
            let x = center + offset * BOX_WIDTH;
            let color = group_color(theme, response);
            let values: Vec<f64> = points
                .iter()
                .filter(|p| p.population == population && p.response == response)
                .map(|p| p.percentage)
                .collect();

            let Some(stats) = BoxStats::from_values(&values) else {
                continue;
            };

            doc = doc
                .add(
                    Line::new()
                        .set("x1", x)
                        .set("y1", y(stats.lower_whisker))
                        .set("x2", x)
                        .set("y2", y(stats.upper_whisker))
                        .set("stroke", color)
                        .set("stroke-width", 1.5),
                )
                .add(
                    Rectangle::new()
                        .set("x", x - BOX_WIDTH / 2.0)
                        .set("y", y(stats.q3))
                        .set("width", BOX_WIDTH)
                        .set("height", (y(stats.q1) - y(stats.q3)).max(1.0))
                        .set("fill", color)
                        .set("fill-opacity", 0.25)
                        .set("stroke", color)
                        .set("stroke-width", 1.5),
                )
                .add(
                    Line::new()
                        .set("x1", x - BOX_WIDTH / 2.0)
                        .set("y1", y(stats.median))
                        .set("x2", x + BOX_WIDTH / 2.0)
                        .set("y2", y(stats.median))
                        .set("stroke", color)
                        .set("stroke-width", 2.5),
                );

            for (j, value) in values.iter().enumerate() {
                // Spread points sideways so equal values stay visible
                let jitter = ((j % 5) as f64 - 2.0) * (BOX_WIDTH / 12.0);
                doc = doc.add(
                    Circle::new()
                        .set("cx", x + jitter)
                        .set("cy", y(*value))
                        .set("r", 3)
                        .set("fill", color)
                        .set("fill-opacity", 0.8),
                );
            }
        }
    }

    for (i, response) in [Response::Yes, Response::No].into_iter().enumerate() {
        let x = RIGHT - 260.0 + 130.0 * i as f64;
        doc = doc
            .add(
                Rectangle::new()
                    .set("x", x)
                    .set("y", HEIGHT - 30.0)
                    .set("width", 14)
                    .set("height", 14)
                    .set("fill", group_color(theme, response)),
            )
            .add(
                Text::new(response.label())
                    .set("x", x + 20.0)
                    .set("y", HEIGHT - 19.0)
                    .set("font-size", 12),
            );
    }

    doc.add(
        Line::new()
            .set("x1", LEFT)
            .set("y1", BOTTOM)
            .set("x2", RIGHT)
            .set("y2", BOTTOM)
            .set("stroke", "#000000"),
    )
    .to_string()
}
