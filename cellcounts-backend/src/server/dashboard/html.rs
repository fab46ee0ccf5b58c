use std::fmt::Write;

pub fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// A `<select>` whose first option, "All", submits an empty value.
pub fn select(name: &str, label: &str, options: &[(String, String)], selected: Option<&str>) -> String {
    let mut html = format!(
        r#"<div class="filter"><label for="{name}">{label}</label><select id="{name}" name="{name}"><option value="">All</option>"#,
        name = escape(name),
        label = escape(label),
    );

    for (value, text) in options {
        let selected = if selected == Some(value.as_str()) {
            " selected"
        } else {
            ""
        };
        let _ = write!(
            html,
            r#"<option value="{}"{selected}>{}</option>"#,
            escape(value),
            escape(text)
        );
    }
    html.push_str("</select></div>");

    html
}

/// Cells are escaped here, so callers pass raw text.
pub fn table<R>(class: &str, headers: &[&str], rows: R) -> String
where
    R: IntoIterator<Item = Vec<Cell>>,
{
    let mut html = format!(r#"<table class="{}"><thead><tr>"#, escape(class));
    for header in headers {
        let _ = write!(html, "<th>{}</th>", escape(header));
    }
    html.push_str("</tr></thead><tbody>");

    for row in rows {
        html.push_str("<tr>");
        for Cell { text, class } in row {
            match class {
                Some(class) => {
                    let _ = write!(html, r#"<td class="{}">{}</td>"#, escape(class), escape(&text));
                }
                None => {
                    let _ = write!(html, "<td>{}</td>", escape(&text));
                }
            }
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");

    html
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    text: String,
    class: Option<&'static str>,
}

impl Cell {
    pub fn with_class(text: impl Into<String>, class: &'static str) -> Self {
        Self {
            text: text.into(),
            class: Some(class),
        }
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Self { text, class: None }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Self::from(text.to_string())
    }
}
