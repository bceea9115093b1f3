use std::fmt;

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, sources};

use crate::span::Origin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One import diagnostic anchored to a chunk origin. Imports never fail on
/// tolerable malformed input; they degrade and report through these.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub origin: Origin,
}

impl Diagnostic {
    pub fn error(origin: Origin, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            origin,
        }
    }

    pub fn warning(origin: Origin, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            origin,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn report_kind(severity: Severity) -> ReportKind<'static> {
    match severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    }
}

fn primary_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
    }
}

fn plain_severity_name(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub color: bool,
}

impl RenderOptions {
    pub const fn plain() -> Self {
        Self { color: false }
    }

    pub const fn colored() -> Self {
        Self { color: true }
    }
}

/// Renders one diagnostic against the source text it was produced from.
pub fn render_diagnostic(source_text: &str, diagnostic: &Diagnostic) -> String {
    render_diagnostic_with_options(source_text, diagnostic, RenderOptions::plain())
}

pub fn render_diagnostic_with_options(
    source_text: &str,
    diagnostic: &Diagnostic,
    options: RenderOptions,
) -> String {
    let name = diagnostic.origin.file.to_string();
    let primary_span = (name.clone(), diagnostic.origin.as_range());
    let report = Report::build(report_kind(diagnostic.severity), primary_span.clone())
        .with_config(
            Config::default()
                .with_index_type(IndexType::Byte)
                .with_color(options.color),
        )
        .with_message(diagnostic.message.clone())
        .with_label(
            Label::new(primary_span)
                .with_color(primary_color(diagnostic.severity))
                .with_message("here"),
        )
        .finish();

    let mut output = Vec::new();
    let cache = sources([(name.clone(), source_text)]);
    if report.write(cache, &mut output).is_ok() {
        return String::from_utf8_lossy(&output).into_owned();
    }

    format!(
        "{}: {}\n --> {}:{}",
        plain_severity_name(diagnostic.severity),
        diagnostic.message,
        name,
        diagnostic.origin.line
    )
}

pub fn render_diagnostics(source_text: &str, diagnostics: &[Diagnostic]) -> String {
    render_diagnostics_with_options(source_text, diagnostics, RenderOptions::plain())
}

pub fn render_diagnostics_with_options(
    source_text: &str,
    diagnostics: &[Diagnostic],
    options: RenderOptions,
) -> String {
    diagnostics
        .iter()
        .map(|diag| render_diagnostic_with_options(source_text, diag, options))
        .collect::<Vec<_>>()
        .join("\n")
}
