use crate::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Level implied by `-v` flags, falling back to the configured level
fn effective_level(config: &LoggingConfig, cli_verbose: u8) -> &str {
    match cli_verbose {
        0 => &config.level,
        1 => "debug",
        _ => "trace",
    }
}

/// Filter for all `cmx*` targets at `level`, plus configured module
/// directives. `RUST_LOG` replaces the base directive when set.
pub fn build_filter(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<EnvFilter> {
    let level = effective_level(config, cli_verbose);
    let mut filter =
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| format!("cmx={}", level)));

    for (module, module_level) in &config.module_filters {
        filter = filter.add_directive(format!("{}={}", module, module_level).parse()?);
    }
    Ok(filter)
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

fn console_layer(format: &str, show_location: bool) -> BoxedLayer {
    match format {
        "json" => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .boxed(),
        "compact" => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_line_number(false)
            .with_file(false)
            .boxed(),
        _ => fmt::layer()
            .with_target(show_location)
            .with_thread_ids(false)
            .with_line_number(show_location)
            .with_file(show_location)
            .boxed(),
    }
}

/// Same format as the console, without ANSI colors
fn file_layer(format: &str, file: File) -> BoxedLayer {
    let layer = fmt::layer().with_writer(file).with_ansi(false);
    match format {
        "json" => layer.json().boxed(),
        "compact" => layer.compact().boxed(),
        _ => layer.boxed(),
    }
}

/// Install the global subscriber according to `config`
pub fn init_logging(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<()> {
    let filter = build_filter(config, cli_verbose)?;
    // Source locations only at debug and below
    let show_location = matches!(effective_level(config, cli_verbose), "debug" | "trace");

    let mut layers = vec![console_layer(&config.format, show_location)];
    if let Some(path) = &config.file_output {
        layers.push(file_layer(&config.format, open_log_file(path)?));
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()?;
    Ok(())
}
