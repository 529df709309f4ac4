pub mod theme;

pub use theme::{Icon, Theme};

use stratus::domain::ChangeKind;
use stratus::domain::state::summarize;
use stratus::infrastructure::DeployOutcome;

pub fn info(message: impl AsRef<str>) {
    println!("{} {}", Theme::primary(Icon::Info), message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    println!("{} {}", Theme::warning(Icon::Warning), message.as_ref());
}

pub fn success(message: impl AsRef<str>) {
    println!("{} {}", Theme::success(Icon::Check), message.as_ref());
}

/// Prints one line per change, then a summary such as `2 create, 1 same`.
pub fn print_changes(outcome: &DeployOutcome, verbose: bool) {
    for change in &outcome.changes {
        if change.kind == ChangeKind::Same && !verbose {
            continue;
        }
        println!("  {}", Theme::change(change.kind, &change.urn));
    }

    let summary = summarize(&outcome.changes)
        .into_iter()
        .map(|(kind, count)| format!("{} {}", count, kind))
        .collect::<Vec<_>>()
        .join(", ");
    if summary.is_empty() {
        info("Nothing deployed");
    } else {
        println!("\n  {}", Theme::bold(summary));
    }
}
