use std::path::Path;
use std::time::Duration;
use chrono::Local;
use thiserror::Error;
use log::*;

use crate::analysis_api::{AnalysisApi, ApiError};
use crate::analysis_request::{assemble_request, BriefForm, DataMode, ValidationError};
use crate::config_manager::AppConfig;
use crate::csv_ingestor::read_dataset_file;
use crate::dashboard_state::{transition, DashboardEvent, DashboardState, UiEffect};
use crate::report_view::ReportView;
use crate::schema_normalizer::DatasetRole;

/// Whatever draws the dashboard: receives effects in the order they happen.
pub trait UiSink {
    fn apply(&mut self, effect: &UiEffect);
}

/// Collects effects instead of drawing them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub effects: Vec<UiEffect>,
}

impl UiSink for RecordingSink {
    fn apply(&mut self, effect: &UiEffect) {
        self.effects.push(effect.clone());
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct Dashboard<S: UiSink> {
    config: AppConfig,
    state: DashboardState,
    sink: S,
}

impl<S: UiSink> Dashboard<S> {
    pub fn new(config: AppConfig, sink: S) -> Self {
        let form = BriefForm::from_defaults(&config.defaults, &config.api);
        Dashboard {
            config,
            state: DashboardState::new(form),
            sink,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn dispatch(&mut self, event: DashboardEvent) {
        let state = std::mem::take(&mut self.state);
        let (next, effects) = transition(state, event);
        self.state = next;
        for effect in &effects {
            self.sink.apply(effect);
        }
    }

    /// Client for the URL and key currently in the form.
    fn api(&self) -> AnalysisApi {
        AnalysisApi::new(
            &self.state.form.api_base_url,
            self.state.form.api_key(),
            Duration::from_millis(self.config.api.timeout_ms),
        )
    }

    pub fn edit_form(&mut self, edit: impl FnOnce(&mut BriefForm)) {
        let mut form = self.state.form.clone();
        edit(&mut form);
        self.dispatch(DashboardEvent::FormEdited(form));
    }

    /// Reads the files, switches to upload mode and maps each file to its
    /// role.
    pub async fn upload_files(&mut self, files: &[(&Path, DatasetRole)]) -> anyhow::Result<()> {
        let mut datasets = Vec::with_capacity(files.len());
        for (path, _) in files {
            datasets.push(read_dataset_file(path).await?);
        }

        self.dispatch(DashboardEvent::DataModeChanged(DataMode::Upload));
        self.dispatch(DashboardEvent::FilesSelected(datasets));
        for (index, (_, role)) in files.iter().enumerate() {
            self.dispatch(DashboardEvent::RoleAssigned { file: index, role: *role });
        }
        Ok(())
    }

    /// Fills the form with the configured sample brief and selects sample
    /// data.
    pub fn load_demo_brief(&mut self) {
        let form = BriefForm::from_defaults(&self.config.defaults, &self.config.api);
        let form = BriefForm {
            api_base_url: self.state.form.api_base_url.clone(),
            api_key: self.state.form.api_key.clone(),
            ..form
        };
        self.dispatch(DashboardEvent::FormEdited(form));
        self.dispatch(DashboardEvent::DataModeChanged(DataMode::Sample));
    }

    pub async fn check_health(&mut self) -> bool {
        let online = match self.api().health().await {
            Ok(health) => {
                info!("API OK: {}", health.status);
                true
            }
            Err(e) => {
                warn!("API offline: {}", e);
                false
            }
        };
        self.dispatch(DashboardEvent::HealthChecked(online));
        online
    }

    pub async fn check_auth(&mut self) -> Option<bool> {
        match self.api().auth_status().await {
            Ok(status) => {
                self.dispatch(DashboardEvent::AuthChecked(status.api_key_required));
                Some(status.api_key_required)
            }
            Err(e) => {
                warn!("Could not read auth status: {}", e);
                None
            }
        }
    }

    /// Validates the form, posts one analysis request and applies the
    /// outcome. A failed run still renders the demo report when the mock
    /// fallback is enabled, but is reported as an error to the caller.
    pub async fn run_analysis(&mut self) -> Result<ReportView, RunError> {
        let request = match assemble_request(
            &self.state.form,
            self.state.data_mode,
            &self.state.mapped_records(),
            &self.config.sources,
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!("Run blocked: {}", e);
                self.dispatch(DashboardEvent::ValidationFailed(e.to_string()));
                return Err(e.into());
            }
        };

        self.dispatch(DashboardEvent::RunStarted);
        let started = std::time::Instant::now();
        let result = self.api().analyze(&request).await;

        match result {
            Ok(response) => {
                info!("Analysis finished in {:.2}s", started.elapsed().as_secs_f64());
                let view = ReportView::from_response(response);
                self.dispatch(DashboardEvent::RunSucceeded(view.clone()));
                Ok(view)
            }
            Err(e) => {
                error!("Analysis failed after {:.2}s: {}", started.elapsed().as_secs_f64(), e);
                let fallback = if self.config.features.use_mock_data_fallback {
                    info!("Showing demo results in place of the failed run");
                    Some(ReportView::demo(Local::now().date_naive()))
                } else {
                    None
                };
                self.dispatch(DashboardEvent::RunFailed { message: e.to_string(), fallback });
                Err(e.into())
            }
        }
    }

    pub fn reset(&mut self) {
        self.dispatch(DashboardEvent::Reset);
    }
}
