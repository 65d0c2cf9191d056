use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use log::*;

use crate::analysis_api::{AnalysisResponse, AnalyzeResponse, LegacyAnalyzeResponse};

lazy_static::lazy_static! {
    static ref CONFIDENCE_REGEX: Regex = Regex::new(r"(?i)Confidence Score:\s*(\d+)%").unwrap();
    static ref COMPLETENESS_REGEX: Regex =
        Regex::new(r"(?i)Data Completeness(?: Assessment)?:\s*([A-Za-z]+)(?:\s*\((\d+)%\))?").unwrap();
    static ref BULLET_REGEX: Regex = Regex::new(r"^[-*]\s+").unwrap();
}

pub const RISK_SECTION: &str = "Risk Flags";
pub const RECOMMENDATION_SECTION: &str = "Strategic Recommendations";
pub const NO_RISKS_TEXT: &str = "No explicit risk flags found.";
pub const NO_RECOMMENDATIONS_TEXT: &str = "No recommendations extracted.";
const LEGACY_LIST_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub confidence: Option<u32>,
    pub completeness_label: Option<String>,
    pub completeness_score: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Good,
    Warn,
    Bad,
    Muted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    pub tone: BadgeTone,
}

/// Doughnut chart input: confidence against the remainder of 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: [String; 2],
    pub values: [u32; 2],
}

impl ChartData {
    pub fn confidence(confidence: Option<u32>) -> Self {
        let value = confidence.unwrap_or(0).min(100);
        ChartData {
            labels: ["Confidence".to_string(), "Remaining".to_string()],
            values: [value, 100 - value],
        }
    }
}

/// Everything the results panel draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportView {
    pub report_markdown: String,
    pub meta: ReportMeta,
    pub confidence_badge: Option<Badge>,
    pub completeness_badge: Option<Badge>,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub chart: ChartData,
    pub is_demo: bool,
}

pub fn extract_meta(report: &str) -> ReportMeta {
    let confidence = CONFIDENCE_REGEX
        .captures(report)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let completeness = COMPLETENESS_REGEX.captures(report);
    let completeness_label = completeness
        .as_ref()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let completeness_score = completeness
        .as_ref()
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse().ok());

    ReportMeta { confidence, completeness_label, completeness_score }
}

/// Bullet items under the heading line ending in `title`, up to the next
/// `##` heading.
pub fn extract_section(report: &str, title: &str) -> Vec<String> {
    let pattern = format!(r"(?i){}\n([\s\S]*?)(?:\n##|\z)", regex::escape(title));
    let section_regex = match Regex::new(&pattern) {
        Ok(regex) => regex,
        Err(e) => {
            warn!("Invalid section title '{}': {}", title, e);
            return Vec::new();
        }
    };

    let body = match section_regex.captures(report).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => return Vec::new(),
    };

    body.lines()
        .map(|line| BULLET_REGEX.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// 75 and up is High, 50 and up is Medium, anything lower is Low.
pub fn score_to_badge(score: u32) -> (&'static str, BadgeTone) {
    if score >= 75 {
        ("High", BadgeTone::Good)
    } else if score >= 50 {
        ("Medium", BadgeTone::Warn)
    } else {
        ("Low", BadgeTone::Bad)
    }
}

/// Flat responses carried fractional scores and called 0.8 and up High.
fn legacy_confidence_badge(score: u32) -> (&'static str, BadgeTone) {
    if score >= 80 {
        ("High", BadgeTone::Good)
    } else {
        score_to_badge(score)
    }
}

fn or_placeholder(items: Vec<String>, placeholder: &str) -> Vec<String> {
    if items.is_empty() { vec![placeholder.to_string()] } else { items }
}

fn fraction_to_percent(fraction: f64) -> u32 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u32
}

impl ReportView {
    pub fn from_markdown(report: &str) -> Self {
        let meta = extract_meta(report);
        let risks = or_placeholder(extract_section(report, RISK_SECTION), NO_RISKS_TEXT);
        let recommendations =
            or_placeholder(extract_section(report, RECOMMENDATION_SECTION), NO_RECOMMENDATIONS_TEXT);

        let confidence_badge = meta.confidence.map(|confidence| {
            let (label, tone) = score_to_badge(confidence);
            Badge { text: format!("Confidence: {}% ({})", confidence, label), tone }
        });
        let completeness_badge = meta.completeness_label.as_ref().map(|label| {
            let text = match meta.completeness_score {
                Some(score) => format!("Completeness: {} ({}%)", label, score),
                None => format!("Completeness: {}", label),
            };
            Badge { text, tone: BadgeTone::Muted }
        });

        ReportView {
            report_markdown: report.to_string(),
            chart: ChartData::confidence(meta.confidence),
            meta,
            confidence_badge,
            completeness_badge,
            risks,
            recommendations,
            is_demo: false,
        }
    }

    pub fn from_response(response: AnalysisResponse) -> Self {
        match response {
            AnalysisResponse::Markdown(AnalyzeResponse { report, .. }) => Self::from_markdown(&report),
            AnalysisResponse::Legacy(legacy) => Self::from_legacy(legacy),
        }
    }

    /// Maps the flat response onto the markdown view. Missing scores default
    /// to 75% confidence and 80% completeness.
    pub fn from_legacy(legacy: LegacyAnalyzeResponse) -> Self {
        let confidence = fraction_to_percent(legacy.confidence_score.unwrap_or(0.75));
        let completeness = fraction_to_percent(legacy.data_completeness.unwrap_or(0.8));
        let (confidence_label, confidence_tone) = legacy_confidence_badge(confidence);
        let (completeness_label, _) = score_to_badge(completeness);

        let take = |items: Vec<String>| items.into_iter().take(LEGACY_LIST_LIMIT).collect::<Vec<_>>();

        ReportView {
            report_markdown: legacy.report.join("\n"),
            meta: ReportMeta {
                confidence: Some(confidence),
                completeness_label: Some(completeness_label.to_string()),
                completeness_score: Some(completeness),
            },
            confidence_badge: Some(Badge {
                text: format!("Confidence: {}% ({})", confidence, confidence_label),
                tone: confidence_tone,
            }),
            completeness_badge: Some(Badge {
                text: format!("Completeness: {} ({}%)", completeness_label, completeness),
                tone: BadgeTone::Muted,
            }),
            risks: or_placeholder(take(legacy.risks), NO_RISKS_TEXT),
            recommendations: or_placeholder(take(legacy.recommendations), NO_RECOMMENDATIONS_TEXT),
            chart: ChartData::confidence(Some(confidence)),
            is_demo: false,
        }
    }

    /// Fixed demo report shown in place of real results when a run fails and
    /// the mock fallback is enabled.
    pub fn demo(date: NaiveDate) -> Self {
        let markdown = format!(
            "# Analysis Report (Demo Data)\n\
             \n\
             **Date:** {}\n\
             \n\
             Confidence Score: 78%\n\
             Data Completeness: High (85%)\n\
             \n\
             ## Key Metrics\n\
             - Market share: 12%\n\
             - Customer satisfaction: 3.8/5\n\
             - Price position: Upper tier\n\
             - Competitor count: 47\n\
             \n\
             ## Risk Flags\n\
             - High market competition\n\
             - Below-average customer ratings\n\
             - Pricing above competitors\n\
             - Inventory constraints\n\
             \n\
             ## Strategic Recommendations\n\
             - Reduce price by 10% to be competitive\n\
             - Improve product quality for better ratings\n\
             - Invest in customer testimonials\n\
             - Launch seasonal campaigns\n",
            date.format("%Y-%m-%d")
        );
        let mut view = Self::from_markdown(&markdown);
        view.is_demo = true;
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "# Decision Report\n\
        \n\
        Confidence Score: 64%\n\
        Data Completeness Assessment: Partial (60%)\n\
        \n\
        ## Risk Flags\n\
        - Review volume dropped 30%\n\
        * Competitor undercut by 8%\n\
        # analyst note\n\
          - Stock-outs in week 3\n\
        \n\
        ## Strategic Recommendations\n\
        - Match competitor price on SKU-472\n\
        - Restock before campaign\n";

    #[test]
    fn meta_is_read_from_report_text() {
        let meta = extract_meta(REPORT);
        assert_eq!(meta.confidence, Some(64));
        assert_eq!(meta.completeness_label.as_deref(), Some("Partial"));
        assert_eq!(meta.completeness_score, Some(60));
    }

    #[test]
    fn completeness_without_score() {
        let meta = extract_meta("data completeness: Low\n");
        assert_eq!(meta.confidence, None);
        assert_eq!(meta.completeness_label.as_deref(), Some("Low"));
        assert_eq!(meta.completeness_score, None);
    }

    #[test]
    fn sections_stop_at_next_heading() {
        let risks = extract_section(REPORT, RISK_SECTION);
        assert_eq!(
            risks,
            vec!["Review volume dropped 30%", "Competitor undercut by 8%", "Stock-outs in week 3"]
        );
        let recs = extract_section(REPORT, RECOMMENDATION_SECTION);
        assert_eq!(recs, vec!["Match competitor price on SKU-472", "Restock before campaign"]);
        assert!(extract_section(REPORT, "Executive Summary").is_empty());
    }

    #[test]
    fn badges_follow_thresholds() {
        assert_eq!(score_to_badge(75), ("High", BadgeTone::Good));
        assert_eq!(score_to_badge(74), ("Medium", BadgeTone::Warn));
        assert_eq!(score_to_badge(50), ("Medium", BadgeTone::Warn));
        assert_eq!(score_to_badge(49), ("Low", BadgeTone::Bad));
    }

    #[test]
    fn markdown_view_has_badges_and_chart() {
        let view = ReportView::from_markdown(REPORT);
        assert_eq!(view.confidence_badge.as_ref().unwrap().text, "Confidence: 64% (Medium)");
        assert_eq!(view.completeness_badge.as_ref().unwrap().text, "Completeness: Partial (60%)");
        assert_eq!(view.chart.values, [64, 36]);
        assert!(!view.is_demo);
    }

    #[test]
    fn report_without_sections_gets_placeholders() {
        let view = ReportView::from_markdown("Nothing to see");
        assert_eq!(view.risks, vec![NO_RISKS_TEXT]);
        assert_eq!(view.recommendations, vec![NO_RECOMMENDATIONS_TEXT]);
        assert_eq!(view.confidence_badge, None);
        assert_eq!(view.chart.values, [0, 100]);
    }

    #[test]
    fn legacy_lists_are_capped() {
        let legacy = LegacyAnalyzeResponse {
            risks: (1..=7).map(|i| format!("risk {}", i)).collect(),
            recommendations: Vec::new(),
            report: vec!["# Title".to_string(), "body".to_string()],
            confidence_score: Some(0.82),
            data_completeness: None,
        };
        let view = ReportView::from_response(AnalysisResponse::Legacy(legacy));
        assert_eq!(view.risks.len(), 5);
        assert_eq!(view.recommendations, vec![NO_RECOMMENDATIONS_TEXT]);
        assert_eq!(view.report_markdown, "# Title\nbody");
        assert_eq!(view.meta.confidence, Some(82));
        assert_eq!(view.meta.completeness_score, Some(80));
        assert_eq!(view.confidence_badge.unwrap().tone, BadgeTone::Good);
    }

    #[test]
    fn legacy_confidence_is_high_from_eighty() {
        let view = ReportView::from_legacy(LegacyAnalyzeResponse::default());
        assert_eq!(view.meta.confidence, Some(75));
        let badge = view.confidence_badge.unwrap();
        assert_eq!(badge.text, "Confidence: 75% (Medium)");
        assert_eq!(badge.tone, BadgeTone::Warn);

        let legacy = LegacyAnalyzeResponse { confidence_score: Some(0.8), ..Default::default() };
        let badge = ReportView::from_legacy(legacy).confidence_badge.unwrap();
        assert_eq!(badge.text, "Confidence: 80% (High)");

        let legacy = LegacyAnalyzeResponse { confidence_score: Some(0.3), ..Default::default() };
        assert_eq!(ReportView::from_legacy(legacy).confidence_badge.unwrap().tone, BadgeTone::Bad);
    }

    #[test]
    fn demo_view_parses_its_own_report() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let view = ReportView::demo(date);
        assert!(view.is_demo);
        assert!(view.report_markdown.contains("2026-10-16"));
        assert_eq!(view.meta.confidence, Some(78));
        assert_eq!(view.completeness_badge.unwrap().text, "Completeness: High (85%)");
        assert_eq!(view.risks.len(), 4);
        assert_eq!(view.recommendations[0], "Reduce price by 10% to be competitive");
    }
}
