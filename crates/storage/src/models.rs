use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row shape of the `documents` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocumentRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub doc_type: String,
    pub department: String,
    pub upload_date: i64,
    pub metadata_json: String,
    pub chunk_count: i64,
    pub indexed: bool,
}

/// Row shape of the `document_chunks` table.
///
/// `global_ordinal` is the chunk's insertion position in the vector index and
/// is the join key used to resolve search hits back to text.
#[derive(Debug, Clone, FromRow)]
pub struct ChunkRow {
    pub chunk_id: String,
    pub doc_id: String,
    pub chunk_index: i64,
    pub global_ordinal: i64,
    pub chunk_text: String,
    pub embedding: Vec<u8>,
}

/// Row shape of the `queries` audit table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueryLogRow {
    pub query_id: String,
    pub query_text: String,
    pub response: String,
    pub documents_used: String,
    pub timestamp: i64,
    pub user_id: Option<String>,
}
