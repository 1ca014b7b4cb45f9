use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Categories of county records accepted for ingestion.
///
/// The string forms are the wire/storage values and must stay stable; they are
/// what lives in the `documents.doc_type` column and in query filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "court_document")]
    CourtDocument,
    #[serde(rename = "procedural")]
    Procedural,
    #[serde(rename = "policy")]
    Policy,
    #[serde(rename = "form_template")]
    FormTemplate,
    #[serde(rename = "legal_brief")]
    LegalBrief,
    #[serde(rename = "ordinance")]
    Ordinance,
    #[serde(rename = "minutes")]
    MeetingMinutes,
    #[serde(rename = "notice")]
    PublicNotice,
    #[serde(rename = "foia")]
    FoiaResponse,
}

#[derive(Debug, Error)]
#[error("unknown document type: {0}")]
pub struct UnknownDocumentType(pub String);

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::CourtDocument => "court_document",
            DocumentType::Procedural => "procedural",
            DocumentType::Policy => "policy",
            DocumentType::FormTemplate => "form_template",
            DocumentType::LegalBrief => "legal_brief",
            DocumentType::Ordinance => "ordinance",
            DocumentType::MeetingMinutes => "minutes",
            DocumentType::PublicNotice => "notice",
            DocumentType::FoiaResponse => "foia",
        }
    }

    pub const ALL: [DocumentType; 9] = [
        DocumentType::CourtDocument,
        DocumentType::Procedural,
        DocumentType::Policy,
        DocumentType::FormTemplate,
        DocumentType::LegalBrief,
        DocumentType::Ordinance,
        DocumentType::MeetingMinutes,
        DocumentType::PublicNotice,
        DocumentType::FoiaResponse,
    ];
}

impl std::str::FromStr for DocumentType {
    type Err = UnknownDocumentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownDocumentType(s.to_string()))
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ingested document with its derived chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Hex blake3 of the normalized text, so identical content maps to the
    /// same id and re-ingestion replaces rather than duplicates.
    pub id: String,
    pub title: String,
    pub content: String,
    pub doc_type: DocumentType,
    pub department: String,
    pub upload_date: i64,
    pub metadata: HashMap<String, String>,
    pub chunks: Vec<String>,
}

/// One retrieval hit; ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub document_id: String,
    pub title: String,
    pub department: String,
    pub doc_type: String,
    pub chunk: String,
    /// `1 / (1 + squared L2 distance)`; in (0, 1], higher is more relevant.
    /// A source-compatible convention, not a calibrated probability.
    pub relevance_score: f32,
}

/// Corpus statistics reported by the document store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total_documents: u64,
    pub indexed_documents: u64,
    pub total_chunks: u64,
    pub document_types: HashMap<String, u64>,
    pub departments: HashMap<String, u64>,
}
