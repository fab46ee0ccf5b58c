use std::{collections::BTreeSet, fmt::Write, str::FromStr};

use cellcounts_core::{
    baseline::{BaselineSummary, GroupCount},
    comparison::Comparison,
    frequency::{FilterSelection, FrequencyRecord},
    model::{Response, sex_label},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantArray};

use super::Precomputed;
use html::{Cell, escape, select, table};

mod chart;
mod html;

/// Colors and font of the rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub accent: String,
    pub accent_dark: String,
    pub header_background: String,
    pub page_background: String,
    pub card_background: String,
    pub text: String,
    pub responder: String,
    pub non_responder: String,
    pub font_family: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: "#ff0000".to_string(),
            accent_dark: "#cc0000".to_string(),
            header_background: "#000000".to_string(),
            page_background: "#000000".to_string(),
            card_background: "#ffffff".to_string(),
            text: "#000000".to_string(),
            responder: "#00cc00".to_string(),
            non_responder: "#cc0000".to_string(),
            font_family: "'Segoe UI', sans-serif".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub subtitle: String,
    pub page_size: usize,
    pub theme: Theme,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Loblaw Bio".to_string(),
            subtitle: "Immune Cell Population Analysis".to_string(),
            page_size: 20,
            theme: Theme::default(),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantArray,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tab {
    #[default]
    Frequency,
    Comparison,
    Baseline,
}

impl Tab {
    fn label(self) -> &'static str {
        match self {
            Self::Frequency => "Data Overview",
            Self::Comparison => "Responder Comparison",
            Self::Baseline => "Baseline Subset",
        }
    }
}

pub struct FrequencyView<'a> {
    pub records: &'a [&'a FrequencyRecord],
    pub empty_samples: &'a [String],
}

/// Everything one page render depends on.
pub struct View<'a> {
    pub tab: Tab,
    pub filters: &'a FilterSelection,
    pub page: usize,
    pub frequencies: Option<FrequencyView<'a>>,
    pub precomputed: &'a Precomputed,
    pub error: Option<String>,
}

impl<'a> View<'a> {
    #[must_use]
    pub fn new(tab: Tab, filters: &'a FilterSelection, precomputed: &'a Precomputed) -> Self {
        Self {
            tab,
            filters,
            page: 0,
            frequencies: None,
            precomputed,
            error: None,
        }
    }

    #[must_use]
    pub fn error(
        tab: Tab,
        filters: &'a FilterSelection,
        precomputed: &'a Precomputed,
        error: &impl std::fmt::Display,
    ) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(tab, filters, precomputed)
        }
    }
}

pub struct Dashboard {
    config: DashboardConfig,
}

fn response_label(response: &str) -> &str {
    Response::from_str(response).map_or(response, |r| r.label())
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn plain(values: &[String]) -> Vec<(String, String)> {
    values.iter().map(|v| (v.clone(), v.clone())).collect()
}

fn group_rows(groups: &[GroupCount], grouping: Grouping) -> impl Iterator<Item = Vec<Cell>> + '_ {
    groups.iter().map(move |group| {
        let mut row: Vec<Cell> = group
            .keys
            .iter()
            .enumerate()
            .map(|(column, key)| Cell::from(grouping.label(column, key)))
            .collect();
        row.push(Cell::from(group.count.to_string()));

        row
    })
}

impl Dashboard {
    #[must_use]
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }

    /// Renders the whole page for `view`.
    #[must_use]
    pub fn render(&self, view: &View) -> String {
        let DashboardConfig {
            title, subtitle, ..
        } = &self.config;

        let mut body = String::new();
        if let Some(error) = &view.error {
            let _ = write!(
                body,
                r#"<div class="error" role="alert">{}</div>"#,
                escape(error)
            );
        }

        match view.tab {
            Tab::Frequency => {
                if let Some(frequencies) = &view.frequencies {
                    body.push_str(&self.frequency_tab(view, frequencies));
                }
            }
            Tab::Comparison => body.push_str(&self.comparison_tab(&view.precomputed.comparison)),
            Tab::Baseline => body.push_str(&baseline_tab(view.precomputed)),
        }

        let mut nav = String::new();
        for &tab in Tab::VARIANTS {
            let class = if tab == view.tab { "tab active" } else { "tab" };
            let _ = write!(
                nav,
                r#"<a class="{class}" href="/?tab={tab}">{}</a>"#,
                tab.label()
            );
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}: {subtitle}</title>
<style>{style}</style>
</head>
<body>
<header><h1>{title}</h1><p>{subtitle}</p></header>
<main>
<nav>{nav}</nav>
<section class="card" id="{tab}">{body}</section>
</main>
</body>
</html>
"#,
            title = escape(title),
            subtitle = escape(subtitle),
            style = self.style(),
            tab = view.tab,
        )
    }

    fn style(&self) -> String {
        let Theme {
            accent,
            accent_dark,
            header_background,
            page_background,
            card_background,
            text,
            responder,
            non_responder,
            font_family,
        } = &self.config.theme;

        format!(
            "body {{ margin: 0; font-family: {font_family}; font-size: 14px; background: {page_background}; color: {text}; }}
header {{ background: {header_background}; padding: 24px 40px; }}
header h1 {{ color: {accent}; margin: 0 0 4px; font-size: 28px; }}
header p {{ color: {accent_dark}; margin: 0; }}
main {{ padding: 28px 32px; }}
nav a.tab {{ display: inline-block; padding: 10px 18px; background: {card_background}; color: {text}; text-decoration: none; border-radius: 6px 6px 0 0; margin-right: 4px; }}
nav a.active {{ border-top: 3px solid {accent}; font-weight: bold; }}
.card {{ background: {card_background}; padding: 20px 24px; border-radius: 0 8px 8px 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.08); }}
h3 {{ color: {accent_dark}; }}
table {{ border-collapse: collapse; margin-bottom: 16px; }}
th {{ background: {accent}; color: white; font-weight: bold; padding: 6px 12px; }}
td {{ padding: 6px 12px; text-align: center; border-bottom: 1px solid #eee; }}
table.frequencies td {{ font-family: monospace; }}
td.significant {{ color: {responder}; font-weight: bold; }}
td.not-significant {{ color: {non_responder}; }}
.filters {{ display: flex; flex-wrap: wrap; gap: 8px; margin-bottom: 16px; align-items: flex-end; }}
.filter {{ display: flex; flex-direction: column; min-width: 130px; }}
.filter label {{ font-weight: 600; }}
.groups {{ display: flex; flex-wrap: wrap; gap: 16px; align-items: flex-start; }}
.error {{ background: #fff0f0; border: 1px solid {accent}; color: {accent_dark}; padding: 12px 16px; margin-bottom: 16px; border-radius: 6px; }}
.info, .note {{ font-size: 13px; }}"
        )
    }

    fn frequency_tab(&self, view: &View, frequencies: &FrequencyView) -> String {
        let View {
            filters,
            page,
            precomputed,
            ..
        } = view;
        let FrequencyView {
            records,
            empty_samples,
        } = frequencies;
        let options = &precomputed.filter_options;

        let timepoints: Vec<(String, String)> = options
            .timepoints
            .iter()
            .map(|t| (t.to_string(), t.to_string()))
            .collect();
        let populations: Vec<(String, String)> = options
            .populations
            .iter()
            .map(|p| (p.to_string(), p.label().to_string()))
            .collect();
        let selected_time = filters.time_from_treatment_start.map(|t| t.to_string());
        let selected_population = filters.population.map(|p| p.to_string());

        let page_size = self.config.page_size.max(1);
        let n_pages = records.len().div_ceil(page_size).max(1);
        let page = (*page).min(n_pages - 1);
        let n_samples = records
            .iter()
            .map(|r| r.sample_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let mut html = String::from(r#"<h3>Initial Analysis: Data Overview</h3><form method="get" action="/"><input type="hidden" name="tab" value="frequency"><div class="filters">"#);
        html.push_str(&select(
            "project",
            "Project",
            &plain(&options.projects),
            filters.project.as_deref(),
        ));
        html.push_str(&select(
            "condition",
            "Condition",
            &plain(&options.conditions),
            filters.condition.as_deref(),
        ));
        html.push_str(&select(
            "treatment",
            "Treatment",
            &plain(&options.treatments),
            filters.treatment.as_deref(),
        ));
        html.push_str(&select(
            "sample_type",
            "Sample Type",
            &plain(&options.sample_types),
            filters.sample_type.as_deref(),
        ));
        html.push_str(&select(
            "time_from_treatment_start",
            "Days From Treatment Start",
            &timepoints,
            selected_time.as_deref(),
        ));
        html.push_str(&select(
            "population",
            "Population",
            &populations,
            selected_population.as_deref(),
        ));
        html.push_str(r#"<button type="submit">Apply</button></div>"#);

        let _ = write!(
            html,
            r#"<p class="info">Showing {} rows ({n_samples} samples), page {} of {n_pages}</p>"#,
            records.len(),
            page + 1,
        );

        let rows = records
            .iter()
            .skip(page * page_size)
            .take(page_size)
            .map(|r| {
                vec![
                    Cell::from(r.sample_id.as_str()),
                    Cell::from(r.population.label()),
                    Cell::from(r.total_count.to_string()),
                    Cell::from(r.count.to_string()),
                    Cell::from(format!("{:.2}", r.percentage)),
                ]
            });
        html.push_str(&table(
            "frequencies",
            &["Sample", "Population", "Total Count", "Count", "Percentage"],
            rows,
        ));

        html.push_str(r#"<div class="pages">"#);
        if page > 0 {
            let _ = write!(
                html,
                r#"<button type="submit" name="page" value="{}">Previous</button>"#,
                page - 1
            );
        }
        if page + 1 < n_pages {
            let _ = write!(
                html,
                r#"<button type="submit" name="page" value="{}">Next</button>"#,
                page + 1
            );
        }
        html.push_str("</div></form>");

        if !empty_samples.is_empty() {
            let _ = write!(
                html,
                r#"<p class="note">Samples without any counted cells are left out: {}</p>"#,
                escape(&empty_samples.join(", "))
            );
        }

        html
    }

    fn comparison_tab(&self, comparison: &Comparison) -> String {
        let Comparison {
            cohort,
            rows,
            points,
            empty_samples,
        } = comparison;

        let mut html = format!(
            r#"<h3>Statistical Comparison: Responders vs Non-Responders</h3>
<p>Cohort: <strong>{}</strong> ({} samples). Each box shows the distribution of relative frequency (%) across the samples of one group, with the individual samples overlaid. Significance is assessed with a two-sided <strong>Welch's t-test</strong> (&alpha; = 0.05).</p>"#,
            escape(&cohort.to_string()),
            comparison.n_samples(),
        );
        html.push_str(r#"<div class="chart">"#);
        html.push_str(&chart::box_plot(points, &self.config.theme));
        html.push_str("</div><h4>Statistical Test Results</h4>");

        let table_rows = rows.iter().map(|row| {
            let significant = match row.significant {
                Some(true) => Cell::with_class("Yes", "significant"),
                Some(false) => Cell::with_class("No", "not-significant"),
                None => Cell::from("n/a"),
            };

            vec![
                Cell::from(row.population.label()),
                Cell::from(row.responders_n.to_string()),
                Cell::from(row.non_responders_n.to_string()),
                Cell::from(percent(row.responders_mean)),
                Cell::from(percent(row.non_responders_mean)),
                Cell::from(row.statistic.map_or_else(|| "n/a".to_string(), |t| format!("{t:.3}"))),
                Cell::from(row.p_value.map_or_else(|| "n/a".to_string(), |p| format!("{p:.4}"))),
                significant,
                Cell::from(row.note.clone().unwrap_or_default()),
            ]
        });
        html.push_str(&table(
            "stats",
            &[
                "Population",
                "Responders (n)",
                "Non-Responders (n)",
                "Responder Mean %",
                "Non-Responder Mean %",
                "t",
                "p-value",
                "Significant",
                "Note",
            ],
            table_rows,
        ));

        if !empty_samples.is_empty() {
            let _ = write!(
                html,
                r#"<p class="note">Samples without any counted cells are left out: {}</p>"#,
                escape(&empty_samples.join(", "))
            );
        }

        html
    }
}

fn baseline_tab(precomputed: &Precomputed) -> String {
    let Precomputed {
        comparison,
        baseline,
        cohort_baseline,
        ..
    } = precomputed;
    let cohort = &comparison.cohort;

    let mut html = format!(
        r#"<h3>Baseline Subset Analysis</h3>
<p>Query filter: <code>condition = '{}' AND treatment = '{}' AND sample_type = '{}' AND time_from_treatment_start = 0</code></p>
<p class="info"><strong>{}</strong> samples / <strong>{}</strong> unique subjects</p>"#,
        escape(&cohort.condition),
        escape(&cohort.treatment),
        escape(&cohort.sample_type),
        cohort_baseline.n_samples,
        cohort_baseline.n_subjects,
    );

    html.push_str(&group_tables(
        cohort_baseline,
        &[
            Grouping::SamplesByProject,
            Grouping::SubjectsByResponse,
            Grouping::SubjectsBySex,
        ],
    ));

    let _ = write!(
        html,
        r#"<h3>All Conditions at Baseline</h3><p class="info"><strong>{}</strong> samples / <strong>{}</strong> unique subjects</p>"#,
        baseline.n_samples, baseline.n_subjects,
    );
    html.push_str(&group_tables(
        baseline,
        &[
            Grouping::SubjectsByCondition,
            Grouping::SubjectsByConditionAndSex,
            Grouping::SubjectsByConditionAndResponse,
        ],
    ));

    html
}

fn group_tables(summary: &BaselineSummary, groupings: &[Grouping]) -> String {
    let mut html = String::from(r#"<div class="groups">"#);

    for &grouping in groupings {
        let groups = grouping.groups(summary);

        let _ = write!(html, "<div><h4>{}</h4>", grouping.heading());
        if groups.is_empty() {
            html.push_str(r#"<p class="note">No samples at baseline.</p>"#);
        } else {
            html.push_str(&table("groups", grouping.headers(), group_rows(groups, grouping)));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");

    html
}

#[derive(Debug, Clone, Copy)]
enum Grouping {
    SamplesByProject,
    SubjectsByResponse,
    SubjectsBySex,
    SubjectsByCondition,
    SubjectsByConditionAndSex,
    SubjectsByConditionAndResponse,
}

impl Grouping {
    fn groups(self, summary: &BaselineSummary) -> &[GroupCount] {
        match self {
            Self::SamplesByProject => &summary.samples_by_project,
            Self::SubjectsByResponse => &summary.subjects_by_response,
            Self::SubjectsBySex => &summary.subjects_by_sex,
            Self::SubjectsByCondition => &summary.subjects_by_condition,
            Self::SubjectsByConditionAndSex => &summary.subjects_by_condition_and_sex,
            Self::SubjectsByConditionAndResponse => &summary.subjects_by_condition_and_response,
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Self::SamplesByProject => "Samples per Project",
            Self::SubjectsByResponse => "Subjects by Treatment Response",
            Self::SubjectsBySex => "Subjects by Sex",
            Self::SubjectsByCondition => "Subjects per Condition",
            Self::SubjectsByConditionAndSex => "Subjects per Condition and Sex",
            Self::SubjectsByConditionAndResponse => "Treated Subjects per Condition and Response",
        }
    }

    fn headers(self) -> &'static [&'static str] {
        match self {
            Self::SamplesByProject => &["Project", "Samples"],
            Self::SubjectsByResponse => &["Response", "Subjects"],
            Self::SubjectsBySex => &["Sex", "Subjects"],
            Self::SubjectsByCondition => &["Condition", "Subjects"],
            Self::SubjectsByConditionAndSex => &["Condition", "Sex", "Subjects"],
            Self::SubjectsByConditionAndResponse => &["Condition", "Response", "Subjects"],
        }
    }

    /// Display text for the key in `column`.
    fn label(self, column: usize, key: &str) -> &str {
        match (self, column) {
            (Self::SubjectsByResponse, 0) | (Self::SubjectsByConditionAndResponse, 1) => {
                response_label(key)
            }
            (Self::SubjectsBySex, 0) | (Self::SubjectsByConditionAndSex, 1) => sex_label(key),
            _ => key,
        }
    }
}
