//! Console transport: prints records instead of sending them

use crate::core::{LogLevel, LogRecord, Result, Transport};
use colored::Colorize;
use std::io::Write;

pub struct ConsoleTransport {
    use_colors: bool,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn format_record(&self, record: &LogRecord, namespace: &str) -> String {
        let level_str = if self.use_colors {
            format!("{:5}", record.level.to_str())
                .color(record.level.color_code())
                .to_string()
        } else {
            format!("{:5}", record.level.to_str())
        };

        let mut line = format!(
            "[{}] [{}] {}/{} - {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            level_str,
            namespace,
            record.log_name,
            record.message
        );

        if !record.context.is_empty() {
            let fields = record
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            line.push(' ');
            line.push_str(&fields);
        }

        let mut error = record.error.as_ref();
        let mut prefix = "error";
        while let Some(info) = error {
            line.push_str(&format!("\n  {} {}: {}", prefix, info.type_name, info.message));
            prefix = "caused by";
            error = info.cause.as_deref();
        }

        line
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConsoleTransport {
    fn send(&self, _log_name: &str, entries: &[LogRecord], namespace: &str) -> Result<()> {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = stdout.lock();
        let mut err = stderr.lock();

        // Error and Fatal go to stderr, the rest to stdout
        for record in entries {
            let line = self.format_record(record, namespace);
            match record.level {
                LogLevel::Error | LogLevel::Fatal => writeln!(err, "{}", line)?,
                _ => writeln!(out, "{}", line)?,
            }
        }

        out.flush()?;
        err.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
