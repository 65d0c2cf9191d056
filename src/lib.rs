pub mod config_manager;
pub mod csv_ingestor;
pub mod schema_normalizer;
pub mod analysis_request;
pub mod analysis_api;
pub mod report_view;
pub mod dashboard_state;
pub mod dashboard;

pub use analysis_api::{AnalysisApi, ApiError};
pub use config_manager::{AppConfig, ConfigManager};
pub use csv_ingestor::{parse_csv, Dataset, Record};
pub use dashboard::{Dashboard, RecordingSink, RunError, UiSink};
pub use dashboard_state::{DashboardEvent, DashboardState, UiEffect};
pub use report_view::ReportView;
pub use schema_normalizer::{normalize_records, DatasetRole};

/// Installs the log backend. `RUST_LOG` wins; otherwise `info`, or `warn`
/// when logging is switched off in the configuration.
pub fn init_logging(config: &AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if config.features.enable_logging { "info" } else { "warn" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .try_init();
}
