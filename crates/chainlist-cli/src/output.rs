//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chainlist_core::Snapshot;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print the whole list with positions
    pub fn print_snapshot(&self, snapshot: &Snapshot) {
        match self.format {
            OutputFormat::Human => {
                if snapshot.is_empty() {
                    println!("No entries.");
                    return;
                }
                let width = (snapshot.len() - 1).to_string().len();
                for row in snapshot.rows() {
                    println!(
                        "{:>width$} [{}] {}",
                        row.index,
                        if row.completed { "x" } else { " " },
                        truncate(&row.text, 70),
                        width = width
                    );
                }
                let counts = snapshot.counts();
                println!(
                    "\n{} active, {} completed",
                    counts.active, counts.completed
                );
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "version": snapshot.version(),
                        "fetched_at": snapshot.fetched_at(),
                        "entries": snapshot.rows(),
                        "counts": snapshot.counts(),
                    })
                );
            }
            OutputFormat::Quiet => {
                for row in snapshot.rows() {
                    println!("{}", row.text);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => println!("{}", success_json(message, None)),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success whose follow-up re-read failed
    ///
    /// JSON output carries `"refreshed": false` and the warning so scripts
    /// can tell the list shown may be out of date.
    pub fn success_unrefreshed(&self, message: &str, warning: &str) {
        match self.format {
            OutputFormat::Human => {
                println!("✓ {}", message);
                self.warn(warning);
            }
            OutputFormat::Json => println!("{}", success_json(message, Some(warning))),
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (human mode only)
    pub fn warn(&self, msg: &str) {
        if self.format == OutputFormat::Human {
            eprintln!("! {}", msg);
        }
    }
}

fn success_json(message: &str, warning: Option<&str>) -> serde_json::Value {
    match warning {
        None => serde_json::json!({"status": "success", "message": message}),
        Some(warning) => serde_json::json!({
            "status": "success",
            "message": message,
            "refreshed": false,
            "warning": warning,
        }),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
