//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Spinner on stderr, hidden when quiet or not attached to a terminal.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Parse a human duration such as "14d" or "36h".
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(value).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: e.to_string(),
    })
}

/// "2031-01-01 00:00 UTC (in 3months 2days)" style timestamp.
pub fn describe_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let stamp = at.format("%Y-%m-%d %H:%M UTC");
    let delta = at.signed_duration_since(now);
    let whole = |d: chrono::TimeDelta| {
        // Minutes are precise enough and keep the text short.
        let secs = d.num_minutes().unsigned_abs() * 60;
        humantime::format_duration(Duration::from_secs(secs)).to_string()
    };
    if delta.num_minutes() > 0 {
        format!("{stamp} (in {})", whole(delta))
    } else if delta.num_minutes() < 0 {
        format!("{stamp} ({} ago)", whole(-delta))
    } else {
        format!("{stamp} (now)")
    }
}

/// Account number split into groups of four digits.
pub fn format_account_number(number: &str) -> String {
    number
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip grouping whitespace and check the number is all digits.
pub fn normalize_account_number(input: &str) -> Result<String, CliError> {
    let number: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(CliError::Validation {
            field: "account number".into(),
            reason: format!("expected digits only, got {input:?}"),
        });
    }
    Ok(number)
}
