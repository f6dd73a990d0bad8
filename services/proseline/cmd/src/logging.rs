use std::fmt;
use std::fmt::Write as _;
use std::io::IsTerminal;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// ANSI color codes for console output
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Column widths for alignment
const SERVICE_NAME_WIDTH: usize = 20;
const LOG_LEVEL_WIDTH: usize = 7;

/// Crates whose events follow the configured level
const CRATES: &[&str] = &[
    "proseline",
    "proseline_session",
    "proseline_schema",
    "proseline_wire",
    "proseline_crypto",
];

/// Single-line formatter: `[timestamp] [service] [level] message key=value...`
pub struct ProselineLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl ProselineLogFormatter {
    pub fn new(service_name: String) -> Self {
        Self {
            service_name,
            color_enabled: is_terminal(),
        }
    }

    /// Service column, fixed width; a `component` field refines it
    fn format_service_name(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(comp) => format!("{}-{}", self.service_name, comp),
            None => self.service_name.clone(),
        };

        if name.chars().count() > SERVICE_NAME_WIDTH {
            let head: String = name.chars().take(SERVICE_NAME_WIDTH - 1).collect();
            format!("{}…", head)
        } else {
            format!("{:<width$}", name, width = SERVICE_NAME_WIDTH)
        }
    }

    fn format_log_level(&self, level: &tracing::Level) -> String {
        let level_str = match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN",
            tracing::Level::INFO => "ℹ INFO",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "◦ TRACE",
        };

        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH + 2) // +2 for icon
    }

    fn get_color_for_level(&self, level: &tracing::Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG | tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for ProselineLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let formatted_service = self.format_service_name(visitor.component.as_deref());
        let formatted_level = self.format_log_level(level);

        let color = self.get_color_for_level(level);
        let reset_color = if self.color_enabled { COLOR_RESET } else { "" };
        let cyan_color = if self.color_enabled { COLOR_CYAN } else { "" };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            cyan_color, timestamp, formatted_service, color, formatted_level, reset_color
        )?;
        writeln!(writer, "{}{}{}", visitor.message, visitor.fields, reset_color)
    }
}

/// Pulls `message` and `component` out of an event and renders the other
/// fields as ` key=value`
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
    fields: String,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "component" => self.component = Some(format!("{:?}", value).trim_matches('"').to_string()),
            name => {
                let _ = write!(self.fields, " {}={:?}", name, value);
            }
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            name => {
                let _ = write!(self.fields, " {}={}", name, value);
            }
        }
    }
}

/// Whether stderr is a terminal that takes colors
fn is_terminal() -> bool {
    if std::env::var("TERM").unwrap_or_default() == "dumb" {
        return false;
    }
    std::io::stderr().is_terminal()
}

/// Handle for changing the level after the subscriber is installed
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Replace the level of every proseline crate
    pub fn set_level(&self, level: &str) -> anyhow::Result<()> {
        let filter = build_filter(level)?;
        self.handle.reload(filter)?;
        Ok(())
    }
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let mut env_filter = EnvFilter::new("warn");
    for krate in CRATES {
        env_filter = env_filter.add_directive(format!("{}={}", krate, level).parse()?);
    }
    if let Ok(extra) = std::env::var("RUST_LOG") {
        for directive in extra.split(',').filter(|d| !d.is_empty()) {
            env_filter = env_filter.add_directive(directive.parse()?);
        }
    }
    Ok(env_filter)
}

/// Install the global subscriber. `RUST_LOG` directives, when set, are
/// added on top of `level`.
pub fn init(level: &str) -> anyhow::Result<LogHandle> {
    let (filter, handle) = reload::Layer::new(build_filter(level)?);
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(ProselineLogFormatter::new("proseline".to_string()));

    tracing_subscriber::registry().with(filter).with(format).try_init()?;
    Ok(LogHandle { handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> ProselineLogFormatter {
        ProselineLogFormatter {
            service_name: "proseline".to_string(),
            color_enabled: false,
        }
    }

    #[test]
    fn test_service_column_is_fixed_width() {
        let f = formatter();
        assert_eq!(f.format_service_name(None), format!("{:<20}", "proseline"));
        assert_eq!(f.format_service_name(Some("cli")), format!("{:<20}", "proseline-cli"));

        let long = f.format_service_name(Some("a-very-long-component"));
        assert_eq!(long.chars().count(), SERVICE_NAME_WIDTH);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_filter_rejects_bad_level() {
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("loud").is_err());
    }

    #[test]
    fn test_no_colors_when_disabled() {
        assert_eq!(formatter().get_color_for_level(&tracing::Level::ERROR), "");
    }
}
