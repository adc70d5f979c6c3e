use crate::config::Config;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. With logging disabled the service still
/// reports warnings and errors on stderr, since it has no other surface.
pub fn init(config: &Config) -> WorkerGuard {
    let level = filter_directive(config);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = config.log_file.trim();
    let (writer, guard) = if !config.log_enabled || log_file.is_empty() {
        tracing_appender::non_blocking(std::io::stderr())
    } else {
        let path = Path::new(log_file);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent);
            }
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => tracing_appender::non_blocking(file),
            Err(_) => tracing_appender::non_blocking(std::io::stderr()),
        }
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_thread_names(true)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
    guard
}

fn filter_directive(config: &Config) -> String {
    if !config.log_enabled {
        return "warn".to_string();
    }
    let level = config.log_level.trim();
    if level.is_empty() {
        "info".to_string()
    } else {
        level.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::filter_directive;
    use crate::config::Config;

    #[test]
    fn directive_follows_config() {
        let mut cfg = Config::default();
        assert_eq!(filter_directive(&cfg), "warn");
        cfg.log_enabled = true;
        cfg.log_level = "  ".to_string();
        assert_eq!(filter_directive(&cfg), "info");
        cfg.log_level = "edst_sync=debug".to_string();
        assert_eq!(filter_directive(&cfg), "edst_sync=debug");
    }
}
