// guardsim/cli/src/logging.rs

//! Logging setup for the `guardsim` binary.
//!
//! Configuration comes from the `[logging]` config section, overridden by
//! environment variables:
//! - `RUST_LOG`: filter, e.g. `info,guardsim_defense=debug`
//! - `LOG_FORMAT`: `pretty`, `json` or `compact`
//! - `LOG_ANSI`: `true` / `false`

use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Unknown names map to `Info`
    pub fn from_name(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl LogFormat {
    pub fn from_name(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub ansi_colors: bool,
    /// Emit span enter/close events
    pub span_events: bool,
    /// Per-module overrides appended to the filter
    pub module_levels: Vec<(String, LogLevel)>,
    pub include_target: bool,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            ansi_colors: true,
            span_events: false,
            module_levels: Vec::new(),
            include_target: true,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Start from the config file's level and format names
    pub fn from_names(level: &str, format: &str) -> Self {
        Self {
            level: LogLevel::from_name(level),
            format: LogFormat::from_name(format),
            ..Default::default()
        }
    }

    /// Apply `RUST_LOG`, `LOG_FORMAT` and `LOG_ANSI` on top of `self`
    pub fn with_env(mut self) -> Self {
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            let level = rust_log.split(',').next().unwrap_or("info");
            self.level = LogLevel::from_name(level);
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = LogFormat::from_name(&format);
        }
        if let Ok(ansi) = std::env::var("LOG_ANSI") {
            self.ansi_colors = ansi.eq_ignore_ascii_case("true");
        }
        self
    }

    /// Verbose development settings used by `-v`
    pub fn verbose(mut self) -> Self {
        self.level = LogLevel::Debug;
        self.module_levels = vec![
            ("guardsim_selection".to_string(), LogLevel::Debug),
            ("guardsim_defense".to_string(), LogLevel::Debug),
            ("guardsim_placement".to_string(), LogLevel::Debug),
        ];
        self.include_location = true;
        self
    }

    fn build_filter(&self) -> String {
        let mut filter = self.level.as_str().to_string();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.as_str()));
        }
        filter
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays JSON.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(rust_log) => EnvFilter::new(rust_log),
        Err(_) => EnvFilter::new(config.build_filter()),
    };

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry.with(layer.json().with_ansi(false)).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty().with_ansi(config.ansi_colors)).try_init(),
        LogFormat::Compact => registry
            .with(layer.compact().with_ansi(config.ansi_colors))
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_name("trace"), LogLevel::Trace);
        assert_eq!(LogLevel::from_name("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_name("Warn"), LogLevel::Warn);
        assert_eq!(LogLevel::from_name("invalid"), LogLevel::Info);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::from_name("other"), LogFormat::Pretty);
    }

    #[test]
    fn test_build_filter() {
        let config = LogConfig::from_names("info", "pretty").verbose();
        let filter = config.build_filter();

        assert!(filter.starts_with("debug"));
        assert!(filter.contains("guardsim_defense=debug"));
    }
}
