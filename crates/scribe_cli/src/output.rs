use owo_colors::OwoColorize;

/// Styled stdout for command results. Logs go to stderr and the log file.
#[derive(Debug, Clone, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn section(&self, title: &str) {
        println!("{}", title.bold().bright_cyan());
    }

    pub fn info(&self, label: &str, value: &str) {
        println!("{} {}", label.bright_blue(), value);
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".bright_green(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", "!".yellow(), message);
    }

    pub fn status(&self, message: &str) {
        println!("  {}", message.dimmed());
    }

    pub fn print(&self, line: &str) {
        println!("{line}");
    }
}
