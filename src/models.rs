//! Core data models used throughout docuchat.
//!
//! These types represent the artifacts, text units, and conversation turns
//! that flow through the ingestion and answer pipelines.

use serde::{Deserialize, Serialize};

/// Declared type of an uploaded file. A closed set: parser dispatch is by
/// declared type, never by sniffing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Csv,
    Xls,
    Xlsx,
}

impl FileType {
    /// Parse a declared type string (file extension, lowercased by callers).
    pub fn parse(s: &str) -> Option<FileType> {
        match s {
            "pdf" => Some(FileType::Pdf),
            "csv" => Some(FileType::Csv),
            "xls" => Some(FileType::Xls),
            "xlsx" => Some(FileType::Xlsx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Csv => "csv",
            FileType::Xls => "xls",
            FileType::Xlsx => "xlsx",
        }
    }

    /// Whether the per-file unit quota applies to this type. The plan limit
    /// is a page cap; tabular files of any row count are accepted.
    pub fn quota_applies(&self) -> bool {
        matches!(self, FileType::Pdf)
    }
}

/// Processing status of a [`FileArtifact`]. Transitions are forward-only:
/// PROCESSING → SUCCESS or PROCESSING → FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl UploadStatus {
    pub fn parse(s: &str) -> Option<UploadStatus> {
        match s {
            "PENDING" => Some(UploadStatus::Pending),
            "PROCESSING" => Some(UploadStatus::Processing),
            "SUCCESS" => Some(UploadStatus::Success),
            "FAILED" => Some(UploadStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "PENDING",
            UploadStatus::Processing => "PROCESSING",
            UploadStatus::Success => "SUCCESS",
            UploadStatus::Failed => "FAILED",
        }
    }
}

/// One uploaded document, stored as a relational row.
///
/// `declared_type` is kept as the raw declared string so that an artifact
/// with an unsupported type can still be created and marked FAILED.
#[derive(Debug, Clone, Serialize)]
pub struct FileArtifact {
    pub id: String,
    pub storage_key: String,
    pub name: String,
    pub declared_type: String,
    pub owner_id: String,
    pub status: UploadStatus,
    pub created_at: i64,
}

/// One page (PDF) or one row (CSV/XLS/XLSX) of extracted content.
///
/// Produced once per ingestion attempt, consumed immediately by the vector
/// indexer, never persisted on its own.
#[derive(Debug, Clone)]
pub struct TextUnit {
    /// Extraction order, unique and contiguous from 0 within a file.
    pub ordinal: i64,
    pub text: String,
    /// Source metadata as a JSON object (page number, sheet, row).
    pub metadata_json: String,
}

/// A retrieved passage from the vector index, in retrieval-rank order.
#[derive(Debug, Clone)]
pub struct Passage {
    pub ordinal: i64,
    pub text: String,
    pub metadata_json: String,
    /// Cosine similarity to the question.
    pub score: f64,
}

/// One turn in a conversation tied to a file. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub file_id: String,
    pub owner_id: String,
    pub text: String,
    pub is_user: bool,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Quota limits for a subscription tier. Supplied by the plan lookup; the
/// core treats it as an opaque input to the quota evaluator.
#[derive(Debug, Clone)]
pub struct SubscriptionPlan {
    pub name: String,
    pub is_subscribed: bool,
    /// Max files the owner may keep (enforced at the edge, carried through).
    pub max_files: i64,
    /// Max extracted units per file.
    pub units_per_file: usize,
}

/// Upload-completion event as delivered by the upload service.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadEvent {
    pub storage_key: String,
    pub name: String,
    pub owner_id: String,
    /// Declared type string, e.g. `"pdf"`. Validated at extraction time.
    pub declared_type: String,
    pub is_subscribed: bool,
}
