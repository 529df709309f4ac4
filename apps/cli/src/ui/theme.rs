use console::style;
use std::fmt;
use stratus::domain::ChangeKind;

/// Central palette for the stratus CLI.
pub struct Theme;

impl Theme {
    /// Primary color (cyan): app, stage, headings.
    pub fn primary(text: impl fmt::Display) -> String {
        style(text).cyan().bold().to_string()
    }

    pub fn bold(text: impl fmt::Display) -> String {
        style(text).bold().to_string()
    }

    pub fn success(text: impl fmt::Display) -> String {
        style(text).green().bold().to_string()
    }

    pub fn warning(text: impl fmt::Display) -> String {
        style(text).yellow().bold().to_string()
    }

    pub fn error(text: impl fmt::Display) -> String {
        style(text).red().bold().to_string()
    }

    /// Muted: URNs of unchanged resources, metadata.
    pub fn muted(text: impl fmt::Display) -> String {
        style(text).dim().to_string()
    }

    /// Sign and color for one line of a change list.
    pub fn change(kind: ChangeKind, urn: &str) -> String {
        match kind {
            ChangeKind::Create => format!("{} {}", Self::success("+"), urn),
            ChangeKind::Update => format!("{} {}", Self::warning("~"), urn),
            ChangeKind::Delete => format!("{} {}", Self::error("-"), urn),
            ChangeKind::Retain => format!("{} {}", Self::primary("!"), Self::muted(urn)),
            ChangeKind::Same => format!("  {}", Self::muted(urn)),
        }
    }
}

pub enum Icon {
    Check,
    Info,
    Warning,
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self {
            Icon::Check => "✔",
            Icon::Info => "ℹ",
            Icon::Warning => "⚠",
        };
        write!(f, "{}", icon)
    }
}
