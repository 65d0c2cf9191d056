use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config_manager::{ApiConfig, DefaultBrief, DefaultSources};
use crate::csv_ingestor::Record;
use crate::schema_normalizer::DatasetRole;

/// Where the analysis reads its datasets from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    #[default]
    Sample,
    Upload,
}

/// The run form as the user filled it in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BriefForm {
    pub mode: String,
    pub goal: String,
    pub scope_type: String,
    pub scope_value: String,
    pub marketplace: String,
    pub region: String,
    pub timeframe: String,
    pub constraints: Vec<String>,
    pub api_base_url: String,
    pub api_key: String,
}

impl BriefForm {
    pub fn from_defaults(defaults: &DefaultBrief, api: &ApiConfig) -> Self {
        BriefForm {
            mode: defaults.mode.clone(),
            goal: defaults.business_goal.clone(),
            scope_type: defaults.scope_type.clone(),
            scope_value: defaults.scope_value.clone(),
            marketplace: defaults.marketplace.clone(),
            region: defaults.region.clone(),
            timeframe: defaults.timeframe.clone(),
            constraints: Vec::new(),
            api_base_url: api.base_url.clone(),
            api_key: api.api_key.clone(),
        }
    }

    pub fn api_key(&self) -> Option<String> {
        let key = self.api_key.trim();
        if key.is_empty() { None } else { Some(key.to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataSource {
    Records { records: Vec<Record> },
    Sample { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Brief {
    pub mode: String,
    pub business_goal: String,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub marketplaces: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub timeframe: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    pub data_sources: BTreeMap<DatasetRole, DataSource>,
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeRequest {
    pub brief: Brief,
    pub update_memory: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Please fix the following: {}", .problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

/// Validates the form and builds the request body.
///
/// `mapped` holds the normalized records per role and is only consulted in
/// upload mode, where every role must have a non-empty dataset.
pub fn assemble_request(
    form: &BriefForm,
    data_mode: DataMode,
    mapped: &BTreeMap<DatasetRole, Vec<Record>>,
    sources: &DefaultSources,
) -> Result<AnalyzeRequest, ValidationError> {
    let mut problems = Vec::new();

    let required = [
        (&form.mode, "Mode is required"),
        (&form.goal, "Business goal is required"),
        (&form.scope_value, "Scope value is required"),
        (&form.api_base_url, "API base URL is required"),
    ];
    for (value, message) in required {
        if value.trim().is_empty() {
            problems.push(message.to_string());
        }
    }

    if data_mode == DataMode::Upload {
        for role in DatasetRole::ALL {
            let has_rows = mapped.get(&role).map_or(false, |records| !records.is_empty());
            if !has_rows {
                problems.push(format!("Map a non-empty CSV file to the {} role", role));
            }
        }
    }

    if !problems.is_empty() {
        return Err(ValidationError { problems });
    }

    let data_sources = DatasetRole::ALL
        .into_iter()
        .map(|role| {
            let source = match data_mode {
                DataMode::Sample => DataSource::Sample { path: sources.path_for(role).to_string() },
                DataMode::Upload => DataSource::Records { records: mapped[&role].clone() },
            };
            (role, source)
        })
        .collect();

    fn trimmed(s: &str) -> String {
        s.trim().to_string()
    }
    let marketplace = trimmed(&form.marketplace);

    Ok(AnalyzeRequest {
        brief: Brief {
            mode: trimmed(&form.mode),
            business_goal: trimmed(&form.goal),
            scope: Scope {
                scope_type: trimmed(&form.scope_type),
                value: trimmed(&form.scope_value),
            },
            marketplaces: if marketplace.is_empty() { Vec::new() } else { vec![marketplace] },
            region: trimmed(&form.region),
            timeframe: trimmed(&form.timeframe),
            constraints: form
                .constraints
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            data_sources,
        },
        update_memory: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filled_form() -> BriefForm {
        BriefForm::from_defaults(&DefaultBrief::default(), &ApiConfig::default())
    }

    fn one_row() -> Vec<Record> {
        vec![[("sku".to_string(), "A1".to_string())].into_iter().collect()]
    }

    #[test]
    fn sample_mode_sends_server_side_paths() {
        let mut form = filled_form();
        form.constraints = vec!["budget under 5k".to_string(), "  ".to_string()];

        let request = assemble_request(&form, DataMode::Sample, &BTreeMap::new(), &DefaultSources::default()).unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["brief"]["mode"], "quick");
        assert_eq!(body["brief"]["business_goal"], "growth");
        assert_eq!(body["brief"]["scope"], json!({"type": "SKU", "value": "SKU-472"}));
        assert_eq!(body["brief"]["marketplaces"], json!(["Amazon"]));
        assert_eq!(body["brief"]["constraints"], json!(["budget under 5k"]));
        assert_eq!(body["brief"]["data_sources"]["performance_signals"], json!({"path": "performance_signals.json"}));
        assert_eq!(body["update_memory"], false);
    }

    #[test]
    fn missing_scalars_are_aggregated() {
        let mut form = filled_form();
        form.mode.clear();
        form.scope_value = "   ".to_string();
        form.api_base_url.clear();

        let err = assemble_request(&form, DataMode::Sample, &BTreeMap::new(), &DefaultSources::default()).unwrap_err();
        assert_eq!(err.problems.len(), 3);
        assert_eq!(
            err.to_string(),
            "Please fix the following: Mode is required; Scope value is required; API base URL is required"
        );
    }

    #[test]
    fn upload_mode_requires_every_role() {
        let mut mapped = BTreeMap::new();
        mapped.insert(DatasetRole::Catalog, one_row());
        mapped.insert(DatasetRole::Reviews, Vec::new());

        let err = assemble_request(&filled_form(), DataMode::Upload, &mapped, &DefaultSources::default()).unwrap_err();
        assert_eq!(err.problems.len(), 4);
        assert!(err.problems[0].contains("reviews"));
        assert!(err.problems.iter().all(|p| !p.contains("catalog")));
    }

    #[test]
    fn upload_mode_forwards_records_unmodified() {
        let mapped: BTreeMap<_, _> = DatasetRole::ALL.into_iter().map(|role| (role, one_row())).collect();

        let request = assemble_request(&filled_form(), DataMode::Upload, &mapped, &DefaultSources::default()).unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["brief"]["data_sources"]["pricing"], json!({"records": [{"sku": "A1"}]}));
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let mut form = filled_form();
        form.marketplace.clear();
        form.region.clear();
        form.timeframe.clear();

        let request = assemble_request(&form, DataMode::Sample, &BTreeMap::new(), &DefaultSources::default()).unwrap();
        let body = serde_json::to_value(&request).unwrap();
        let brief = body["brief"].as_object().unwrap();
        assert!(!brief.contains_key("marketplaces"));
        assert!(!brief.contains_key("region"));
        assert!(!brief.contains_key("timeframe"));
        assert!(!brief.contains_key("constraints"));
    }
}
