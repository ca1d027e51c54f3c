//! Evidence extraction contract.
//!
//! The extraction service (usually an LLM) is an external collaborator. This
//! module defines its request/response shape, the batch driver with model
//! fallback, and a file backed implementation.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceType {
    Positive,
    Negative,
    Profanity,
    Intensifier,
    Negation,
    Sarcasm,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    #[default]
    #[serde(other)]
    Mild,
}

/// One phrase-level sentiment signal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Evidence {
    pub phrase: String,
    #[serde(rename = "type")]
    pub kind: EvidenceType,
    pub strength: Strength,
    pub aspect: Option<String>,
    pub target: Option<String>,
}

impl Evidence {
    /// ±2 for strong and ±1 for mild polarity; every other type scores 0.
    pub fn base_score(&self) -> i32 {
        match (self.kind, self.strength) {
            (EvidenceType::Positive, Strength::Strong) => 2,
            (EvidenceType::Positive, Strength::Mild) => 1,
            (EvidenceType::Negative, Strength::Strong) => -2,
            (EvidenceType::Negative, Strength::Mild) => -1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceResponse {
    pub overall_polarity: String,
    /// 0.0 ..= 1.0 as reported by the service.
    #[serde(deserialize_with = "intensity")]
    pub overall_intensity: f64,
    pub evidences: Vec<Evidence>,
    pub summary_ko: String,
}

/// Accepts a number, a numeric string or null (0.0).
fn intensity<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The requested model does not exist; the next candidate is tried.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("{0}")]
    Other(String),
}

/// Anything that turns a unit of text into evidence.
pub trait EvidenceService {
    fn extract(
        &self,
        model: &str,
        unit_id: &str,
        text: &str,
    ) -> std::result::Result<EvidenceResponse, ServiceError>;
}

/// Parses a service reply. Markdown code fences and chatter around the JSON
/// object are ignored.
pub fn parse_response(raw: &str) -> std::result::Result<EvidenceResponse, serde_json::Error> {
    let body = raw.trim();
    let body = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };
    serde_json::from_str(body)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitEvidence {
    pub unit_id: String,
    /// Model that answered; `None` when every candidate was missing.
    pub model: Option<String>,
    pub response: EvidenceResponse,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceBatch {
    pub responses: Vec<UnitEvidence>,
    pub diagnostics: Vec<String>,
}

/// Flat evidence row for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceRow {
    pub unit_id: String,
    pub model: String,
    pub overall_polarity: String,
    pub overall_intensity: f64,
    pub phrase: String,
    #[serde(rename = "type")]
    pub kind: EvidenceType,
    pub strength: Strength,
    pub aspect: Option<String>,
    pub target: Option<String>,
}

impl EvidenceBatch {
    pub fn by_unit(&self) -> HashMap<&str, &EvidenceResponse> {
        self.responses
            .iter()
            .map(|u| (u.unit_id.as_str(), &u.response))
            .collect()
    }

    pub fn rows(&self) -> Vec<EvidenceRow> {
        self.responses
            .iter()
            .flat_map(|u| {
                u.response.evidences.iter().map(move |e| EvidenceRow {
                    unit_id: u.unit_id.clone(),
                    model: u.model.clone().unwrap_or_default(),
                    overall_polarity: u.response.overall_polarity.clone(),
                    overall_intensity: u.response.overall_intensity,
                    phrase: e.phrase.clone(),
                    kind: e.kind,
                    strength: e.strength,
                    aspect: e.aspect.clone(),
                    target: e.target.clone(),
                })
            })
            .collect()
    }
}

/// Calls the service once per unit, in order.
///
/// For each unit the candidate models are tried in priority order; only
/// [`ServiceError::ModelNotFound`] moves on to the next model. Any other
/// failure aborts the batch. When every candidate is missing the unit gets
/// an empty response and a diagnostic is recorded.
pub fn extract_evidence<'a, S, I>(service: &S, models: &[String], units: I) -> Result<EvidenceBatch>
where
    S: EvidenceService + ?Sized,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut batch = EvidenceBatch::default();
    for (unit_id, text) in units {
        let mut answered = None;
        for model in models {
            match service.extract(model, unit_id, text) {
                Ok(resp) => {
                    answered = Some((model.clone(), resp));
                    break;
                }
                Err(ServiceError::ModelNotFound(msg)) => {
                    debug!("evidence: {model} not found for {unit_id}: {msg}");
                }
                Err(ServiceError::Other(message)) => {
                    return Err(Error::Evidence {
                        unit: unit_id.to_string(),
                        model: model.clone(),
                        message,
                    });
                }
            }
        }
        let unit = match answered {
            Some((model, response)) => UnitEvidence {
                unit_id: unit_id.to_string(),
                model: Some(model),
                response,
            },
            None => {
                let note = format!(
                    "evidence: no candidate model available for {unit_id} (tried {}); using empty evidence",
                    models.join(", ")
                );
                warn!("{note}");
                batch.diagnostics.push(note);
                UnitEvidence {
                    unit_id: unit_id.to_string(),
                    model: None,
                    response: EvidenceResponse::default(),
                }
            }
        };
        batch.responses.push(unit);
    }
    info!(
        "evidence: {} units, {} degraded",
        batch.responses.len(),
        batch.diagnostics.len()
    );
    Ok(batch)
}

/// Evidence prepared ahead of time, keyed by unit id. Units without an
/// entry get an empty response.
#[derive(Debug, Clone, Default)]
pub struct StaticEvidenceService {
    entries: HashMap<String, EvidenceResponse>,
}

impl StaticEvidenceService {
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self {
            entries: serde_json::from_str(json)?,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text).map_err(|e| Error::parse(path, e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EvidenceService for StaticEvidenceService {
    fn extract(
        &self,
        _model: &str,
        unit_id: &str,
        _text: &str,
    ) -> std::result::Result<EvidenceResponse, ServiceError> {
        Ok(self.entries.get(unit_id).cloned().unwrap_or_default())
    }
}
