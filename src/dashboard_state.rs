//! Dashboard state and its transitions.
//!
//! Every user action or API outcome is a [`DashboardEvent`]. [`transition`]
//! consumes the old state and returns the new one together with the UI
//! effects the shell has to perform, in order.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use log::*;

use crate::analysis_request::{BriefForm, DataMode};
use crate::csv_ingestor::{Dataset, Record};
use crate::report_view::ReportView;
use crate::schema_normalizer::{normalize_records, DatasetRole};

pub const STATUS_RUNNING: &str = "Running analysis...";
pub const STATUS_COMPLETE: &str = "Analysis complete";

/// An uploaded file and what the user mapped it to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub dataset: Dataset,
    pub role: Option<DatasetRole>,
    /// Records normalized for `role`, rebuilt from `dataset.records` on every
    /// assignment.
    pub normalized: Option<Vec<Record>>,
    pub warning: Option<String>,
}

impl UploadedFile {
    fn new(dataset: Dataset) -> Self {
        let warning = if dataset.is_empty() {
            Some(format!("{} contains no data rows", dataset.file_name))
        } else {
            None
        };
        UploadedFile { dataset, role: None, normalized: None, warning }
    }

    fn clear_role(&mut self) {
        self.role = None;
        self.normalized = None;
        if !self.dataset.is_empty() {
            self.warning = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiHealth {
    #[default]
    Unknown,
    Online,
    Offline,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardState {
    pub data_mode: DataMode,
    pub files: Vec<UploadedFile>,
    pub form: BriefForm,
    pub run_status: RunStatus,
    pub api_health: ApiHealth,
    pub auth_required: Option<bool>,
    pub view: Option<ReportView>,
    pub status_text: String,
}

impl DashboardState {
    pub fn new(form: BriefForm) -> Self {
        DashboardState { form, ..Default::default() }
    }

    /// Normalized records of every mapped role.
    pub fn mapped_records(&self) -> BTreeMap<DatasetRole, Vec<Record>> {
        self.files
            .iter()
            .filter_map(|file| match (file.role, &file.normalized) {
                (Some(role), Some(records)) => Some((role, records.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn mapping_status(&self) -> BTreeMap<DatasetRole, bool> {
        let mapped: Vec<DatasetRole> = self.files.iter().filter_map(|f| f.role).collect();
        DatasetRole::ALL
            .into_iter()
            .map(|role| (role, mapped.contains(&role)))
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.run_status == RunStatus::Running
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    FilesSelected(Vec<Dataset>),
    RoleAssigned { file: usize, role: DatasetRole },
    RoleCleared { file: usize },
    DataModeChanged(DataMode),
    UploadCleared,
    FormEdited(BriefForm),
    ValidationFailed(String),
    RunStarted,
    RunSucceeded(ReportView),
    RunFailed { message: String, fallback: Option<ReportView> },
    HealthChecked(bool),
    AuthChecked(bool),
    Reset,
}

/// One row of the uploaded-file list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRow {
    pub file_name: String,
    pub size_kb: f64,
    pub rows: usize,
    pub role: Option<DatasetRole>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    SetLoading(bool),
    SetStatus(String),
    ShowAlert(String),
    ClearAlert,
    ShowToast(String),
    SetUploadVisible(bool),
    RenderFileList(Vec<FileRow>),
    SetFileWarning { file: usize, warning: Option<String> },
    UpdateMappingStatus(BTreeMap<DatasetRole, bool>),
    RenderReport(ReportView),
    ShowPlaceholders,
    SetHealth(bool),
    SetAuth(bool),
}

fn file_rows(files: &[UploadedFile]) -> Vec<FileRow> {
    files
        .iter()
        .map(|f| FileRow {
            file_name: f.dataset.file_name.clone(),
            size_kb: (f.dataset.size_bytes as f64 / 1024.0 * 10.0).round() / 10.0,
            rows: f.dataset.records.len(),
            role: f.role,
        })
        .collect()
}

fn file_list_effects(state: &DashboardState) -> Vec<UiEffect> {
    let mut effects = vec![UiEffect::RenderFileList(file_rows(&state.files))];
    effects.extend(
        state
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| UiEffect::SetFileWarning { file: i, warning: f.warning.clone() }),
    );
    effects.push(UiEffect::UpdateMappingStatus(state.mapping_status()));
    effects
}

fn discard_uploads(state: &mut DashboardState) -> Vec<UiEffect> {
    state.files.clear();
    vec![
        UiEffect::RenderFileList(Vec::new()),
        UiEffect::UpdateMappingStatus(state.mapping_status()),
    ]
}

fn unknown_file(state: &DashboardState, file: usize) -> Vec<UiEffect> {
    warn!("Ignoring event for file #{} ({} files uploaded)", file, state.files.len());
    vec![UiEffect::ShowAlert(format!("No uploaded file #{}", file + 1))]
}

pub fn transition(mut state: DashboardState, event: DashboardEvent) -> (DashboardState, Vec<UiEffect>) {
    let effects = match event {
        DashboardEvent::FilesSelected(datasets) => {
            info!("{} file(s) selected", datasets.len());
            state.files = datasets.into_iter().map(UploadedFile::new).collect();
            file_list_effects(&state)
        }
        DashboardEvent::RoleAssigned { file, role } => {
            if file >= state.files.len() {
                let effects = unknown_file(&state, file);
                return (state, effects);
            }

            // one file per role
            let mut effects = Vec::new();
            for (i, other) in state.files.iter_mut().enumerate() {
                if i != file && other.role == Some(role) {
                    other.clear_role();
                    effects.push(UiEffect::SetFileWarning { file: i, warning: other.warning.clone() });
                }
            }

            let target = &mut state.files[file];
            let outcome = normalize_records(&target.dataset.records, role);
            target.warning = outcome.warning();
            target.normalized = Some(outcome.records);
            target.role = Some(role);
            debug!("{} mapped to {}", target.dataset.file_name, role);

            effects.push(UiEffect::SetFileWarning { file, warning: target.warning.clone() });
            effects.push(UiEffect::RenderFileList(file_rows(&state.files)));
            effects.push(UiEffect::UpdateMappingStatus(state.mapping_status()));
            effects
        }
        DashboardEvent::RoleCleared { file } => {
            if file >= state.files.len() {
                let effects = unknown_file(&state, file);
                return (state, effects);
            }
            state.files[file].clear_role();
            vec![
                UiEffect::SetFileWarning { file, warning: state.files[file].warning.clone() },
                UiEffect::RenderFileList(file_rows(&state.files)),
                UiEffect::UpdateMappingStatus(state.mapping_status()),
            ]
        }
        DashboardEvent::DataModeChanged(mode) => {
            state.data_mode = mode;
            let mut effects = vec![UiEffect::SetUploadVisible(mode == DataMode::Upload)];
            if mode == DataMode::Sample {
                effects.extend(discard_uploads(&mut state));
            }
            effects
        }
        DashboardEvent::UploadCleared => discard_uploads(&mut state),
        DashboardEvent::FormEdited(form) => {
            state.form = form;
            Vec::new()
        }
        DashboardEvent::ValidationFailed(message) => vec![UiEffect::ShowAlert(message)],
        DashboardEvent::RunStarted => {
            state.run_status = RunStatus::Running;
            state.status_text = STATUS_RUNNING.to_string();
            vec![
                UiEffect::ClearAlert,
                UiEffect::SetStatus(state.status_text.clone()),
                UiEffect::SetLoading(true),
            ]
        }
        DashboardEvent::RunSucceeded(view) => {
            state.run_status = RunStatus::Idle;
            state.status_text = STATUS_COMPLETE.to_string();
            state.view = Some(view.clone());
            vec![
                UiEffect::RenderReport(view),
                UiEffect::SetStatus(state.status_text.clone()),
                UiEffect::ShowToast(STATUS_COMPLETE.to_string()),
                UiEffect::SetLoading(false),
            ]
        }
        DashboardEvent::RunFailed { message, fallback } => {
            state.run_status = RunStatus::Idle;
            state.status_text = format!("Analysis failed: {}", message);
            let mut effects = vec![
                UiEffect::ShowAlert(message),
                UiEffect::SetStatus(state.status_text.clone()),
            ];
            if let Some(view) = fallback {
                state.view = Some(view.clone());
                effects.push(UiEffect::RenderReport(view));
            }
            effects.push(UiEffect::SetLoading(false));
            effects
        }
        DashboardEvent::HealthChecked(online) => {
            state.api_health = if online { ApiHealth::Online } else { ApiHealth::Offline };
            vec![UiEffect::SetHealth(online)]
        }
        DashboardEvent::AuthChecked(required) => {
            state.auth_required = Some(required);
            vec![UiEffect::SetAuth(required)]
        }
        DashboardEvent::Reset => {
            state.form.scope_value.clear();
            state.form.marketplace.clear();
            state.form.region.clear();
            state.form.constraints.clear();
            state.view = None;
            state.status_text.clear();
            let mut effects = discard_uploads(&mut state);
            effects.push(UiEffect::ClearAlert);
            effects.push(UiEffect::ShowPlaceholders);
            effects
        }
    };
    (state, effects)
}
