//! Complaint batch analysis: distributions computed locally plus a narrative
//! summary from Gemini, degrading to a keyword-frequency digest.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::error::ServiceError;
use super::query::Predicate;
use super::store::ComplaintStore;
use crate::config::GeminiConfig;
use crate::models::{Complaint, ComplaintStatus, Department, Priority};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const MAX_BATCH: usize = 100;
const TOP_KEYWORDS: usize = 8;
const MAX_URGENT: usize = 5;
const STOP_WORDS: [&str; 12] = [
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];
const DEFAULT_OVERVIEW: &str = "Analysis completed for the provided complaints.";
const FALLBACK_ACTIONS: [&str; 5] = [
    "Review and prioritize high-priority complaints immediately",
    "Allocate additional resources to departments with multiple complaints",
    "Implement tracking system for recurring issues",
    "Conduct citizen feedback surveys to assess satisfaction",
    "Establish preventive maintenance programs for infrastructure",
];

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unreadable response: {0}")]
    InvalidResponse(String),
}

/// The slice of a complaint the summariser sees.
#[derive(Debug, Clone)]
pub struct ComplaintDigest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub department: Department,
    pub thana: String,
    pub district: String,
    pub division: String,
    pub status: ComplaintStatus,
}

impl From<&Complaint> for ComplaintDigest {
    fn from(c: &Complaint) -> Self {
        Self {
            title: c.title.clone(),
            description: c.description.clone(),
            category: c.category.clone(),
            priority: c.priority,
            department: c.department,
            thana: c.thana.clone(),
            district: c.district.clone(),
            division: c.division.clone(),
            status: c.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSummary {
    pub overview: String,
    pub major_concerns: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub urgent_issues: Vec<String>,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, complaints: &[ComplaintDigest]) -> Result<AiSummary, ProviderError>;
}

/// Gemini `generateContent` over plain HTTP.
pub struct GeminiSummarizer {
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiSummarizer {
    pub fn new(api_key: String, model: String) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;

        Ok(Self {
            api_key,
            model,
            client,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>, ProviderError> {
        config
            .api_key
            .clone()
            .map(|key| Self::new(key, config.model.clone()))
            .transpose()
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        )
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, complaints: &[ComplaintDigest]) -> Result<AiSummary, ProviderError> {
        let prompt = build_prompt(complaints);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt }],
            }],
        };

        tracing::debug!(
            model = %self.model,
            complaints = complaints.len(),
            "Sending analysis request to Gemini API"
        );

        let response = self
            .client
            .post(self.api_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = api_response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| ProviderError::InvalidResponse("empty candidate list".to_string()))?;

        parse_summary(text)
    }
}

fn build_prompt(complaints: &[ComplaintDigest]) -> String {
    let listing = complaints
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "Complaint {}:\nTitle: {}\nDescription: {}\nCategory: {}\nPriority: {}\nDepartment: {}\nLocation: {}, {}, {}\nStatus: {}\n---",
                i + 1,
                c.title,
                c.description,
                c.category,
                c.priority.as_str(),
                c.department,
                c.thana,
                c.district,
                c.division,
                c.status.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are an AI assistant helping government administrators analyze citizen complaints to improve public services.

Please analyze the following {count} complaints and provide insights:

{listing}

Based on this data, please provide a JSON response with the following structure:
{{
  "overview": "A 2-3 sentence summary of the overall complaint situation, mentioning location and key patterns",
  "majorConcerns": ["List of 5-8 main issues mentioned frequently with their frequency counts, format: 'Issue name (mentioned X times)'"],
  "recommendedActions": ["List of 4-6 specific, actionable recommendations for authorities based on the complaint patterns"],
  "urgentIssues": ["List of 3-5 most critical complaints that need immediate attention, format: 'Brief description - department'"]
}}

Focus on:
1. Identifying common patterns and recurring issues
2. Prioritizing based on urgency and frequency
3. Providing actionable insights for government departments
4. Highlighting location-specific concerns
5. Suggesting preventive measures

Please ensure the response is in valid JSON format and be specific and practical in your recommendations."#,
        count = complaints.len(),
    )
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct LooseSummary {
    overview: Option<String>,
    major_concerns: Option<Vec<String>>,
    recommended_actions: Option<Vec<String>>,
    urgent_issues: Option<Vec<String>>,
}

/// Pulls the outermost `{...}` out of model text; missing fields get defaults.
fn parse_summary(text: &str) -> Result<AiSummary, ProviderError> {
    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(ProviderError::InvalidResponse(
                "no JSON object in model output".to_string(),
            ))
        }
    };

    let loose: LooseSummary =
        serde_json::from_str(json).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    Ok(AiSummary {
        overview: loose
            .overview
            .unwrap_or_else(|| DEFAULT_OVERVIEW.to_string()),
        major_concerns: loose.major_concerns.unwrap_or_default(),
        recommended_actions: loose.recommended_actions.unwrap_or_default(),
        urgent_issues: loose.urgent_issues.unwrap_or_default(),
    })
}

/// Deterministic digest used whenever the model cannot answer.
pub fn fallback_summary(complaints: &[ComplaintDigest]) -> AiSummary {
    let place = complaints
        .first()
        .map(|c| format!("{}, {}", c.thana, c.district))
        .unwrap_or_else(|| "various locations".to_string());

    let overview = format!(
        "Analysis of {} complaints from {}. Key issues identified through automated analysis. Gemini AI currently unavailable, using fallback analysis.",
        complaints.len(),
        place
    );

    let major_concerns = keyword_counts(complaints)
        .into_iter()
        .take(TOP_KEYWORDS)
        .map(|(word, count)| format!("{} (mentioned {} times)", capitalize(&word), count))
        .collect();

    let urgent_issues = complaints
        .iter()
        .filter(|c| c.priority.is_pressing())
        .take(MAX_URGENT)
        .map(|c| format!("{} - {} department", c.title, c.department))
        .collect();

    AiSummary {
        overview,
        major_concerns,
        recommended_actions: FALLBACK_ACTIONS.iter().map(|a| a.to_string()).collect(),
        urgent_issues,
    }
}

/// Word frequencies, most frequent first; ties keep first-seen order.
fn keyword_counts(complaints: &[ComplaintDigest]) -> Vec<(String, u64)> {
    let mut order: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for c in complaints {
        let text = format!("{} {}", c.title, c.description).to_lowercase();
        let words = text
            .split(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
            .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(w));

        for word in words {
            match index.get(word) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(word.to_string(), order.len());
                    order.push((word.to_string(), 1));
                }
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Optional location narrowing; blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thana: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_code: Option<String>,
}

impl LocationFilter {
    fn fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("thana", self.thana.as_deref()),
            ("district", self.district.as_deref()),
            ("division", self.division.as_deref()),
            ("postCode", self.post_code.as_deref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields()
            .iter()
            .all(|(_, v)| v.map_or(true, |s| s.trim().is_empty()))
    }

    pub fn predicate(&self) -> Predicate {
        self.fields()
            .into_iter()
            .filter_map(|(field, value)| {
                value
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Predicate::eq(field, s))
            })
            .fold(Predicate::always(), Predicate::and)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: u64,
    pub percentage: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityShare {
    pub priority: Priority,
    pub count: u64,
    pub percentage: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentShare {
    pub department: Department,
    pub count: u64,
    pub percentage: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysis {
    pub total_complaints: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationFilter>,
    pub common_issues: Vec<CategoryShare>,
    pub priority_distribution: Vec<PriorityShare>,
    pub department_distribution: Vec<DepartmentShare>,
    pub ai_summary: AiSummary,
    pub analysis_date: DateTime<Utc>,
}

/// `(key, count, rounded percentage)` in descending count order; ties keep
/// first-seen order.
fn distribution<K, F>(complaints: &[ComplaintDigest], key: F) -> Vec<(K, u64, u64)>
where
    K: PartialEq,
    F: Fn(&ComplaintDigest) -> K,
{
    let mut counts: Vec<(K, u64)> = Vec::new();
    for c in complaints {
        let k = key(c);
        match counts.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, n)) => *n += 1,
            None => counts.push((k, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let total = complaints.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(k, n)| (k, n, ((n as f64 / total) * 100.0).round() as u64))
        .collect()
}

#[derive(Clone)]
pub struct AnalysisService {
    complaints: Arc<dyn ComplaintStore>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl AnalysisService {
    /// Without a summariser every analysis uses the local fallback.
    pub fn new(complaints: Arc<dyn ComplaintStore>, summarizer: Option<Arc<dyn Summarizer>>) -> Self {
        Self {
            complaints,
            summarizer,
        }
    }

    /// Never fails: provider errors are logged and replaced by the fallback.
    pub async fn summarize(&self, digests: &[ComplaintDigest]) -> AiSummary {
        let Some(summarizer) = &self.summarizer else {
            return fallback_summary(digests);
        };

        match summarizer.summarize(digests).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "AI summary unavailable, using fallback analysis");
                fallback_summary(digests)
            }
        }
    }

    pub async fn analyze_batch(
        &self,
        complaint_ids: &[String],
        location: Option<LocationFilter>,
    ) -> Result<BatchAnalysis, ServiceError> {
        if complaint_ids.is_empty() {
            return Err(ServiceError::bad_request("At least one complaint ID is required"));
        }
        if complaint_ids.len() > MAX_BATCH {
            return Err(ServiceError::bad_request(
                "Maximum 100 complaints can be analyzed at once",
            ));
        }

        self.analyze_ids(complaint_ids, location).await
    }

    /// Every complaint at the given place; not subject to the batch cap.
    pub async fn analyze_location(
        &self,
        location: LocationFilter,
    ) -> Result<BatchAnalysis, ServiceError> {
        if location.is_empty() {
            return Err(ServiceError::bad_request(
                "At least one location parameter must be provided",
            ));
        }

        let ids: Vec<String> = self
            .complaints
            .find_matching(&location.predicate())
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        if ids.is_empty() {
            return Err(ServiceError::not_found(
                "No complaints found for the specified location",
            ));
        }

        self.analyze_ids(&ids, Some(location)).await
    }

    async fn analyze_ids(
        &self,
        complaint_ids: &[String],
        location: Option<LocationFilter>,
    ) -> Result<BatchAnalysis, ServiceError> {
        let ids = complaint_ids.iter().map(|id| id.as_str().into()).collect();
        let mut filter = Predicate::In("_id".to_string(), ids);
        if let Some(loc) = &location {
            filter = filter.and(loc.predicate());
        }

        let complaints = self.complaints.find_matching(&filter).await?;
        if complaints.is_empty() {
            return Err(ServiceError::not_found(
                "No complaints found with the provided criteria",
            ));
        }

        let digests: Vec<ComplaintDigest> = complaints.iter().map(ComplaintDigest::from).collect();

        let common_issues = distribution(&digests, |c| c.category.clone())
            .into_iter()
            .map(|(category, count, percentage)| CategoryShare {
                category,
                count,
                percentage,
            })
            .collect();
        let priority_distribution = distribution(&digests, |c| c.priority)
            .into_iter()
            .map(|(priority, count, percentage)| PriorityShare {
                priority,
                count,
                percentage,
            })
            .collect();
        let department_distribution = distribution(&digests, |c| c.department)
            .into_iter()
            .map(|(department, count, percentage)| DepartmentShare {
                department,
                count,
                percentage,
            })
            .collect();

        let ai_summary = self.summarize(&digests).await;

        tracing::info!(complaints = digests.len(), "Complaint batch analyzed");

        Ok(BatchAnalysis {
            total_complaints: digests.len() as u64,
            location,
            common_issues,
            priority_distribution,
            department_distribution,
            ai_summary,
            analysis_date: Utc::now(),
        })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}
