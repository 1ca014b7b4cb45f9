use crate::models::{Document, DocumentStats, DocumentType, QueryResult};
use crate::vectorstore::{vector_from_bytes, vector_to_bytes};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// A vector-index hit resolved back to its chunk text and owning document.
#[derive(Debug, Clone)]
pub struct HydratedChunk {
    pub doc_id: String,
    pub title: String,
    pub department: String,
    pub doc_type: String,
    pub chunk_text: String,
}

impl HydratedChunk {
    pub fn into_result(self, distance: f32) -> QueryResult {
        QueryResult {
            document_id: self.doc_id,
            title: self.title,
            department: self.department,
            doc_type: self.doc_type,
            chunk: self.chunk_text,
            relevance_score: 1.0 / (1.0 + distance),
        }
    }
}

/// CRUD over documents and their chunks.
///
/// Chunk rows carry a `global_ordinal` equal to their insertion position in
/// the vector index; every write that can disturb that mapping goes through
/// the caller's transaction while the index write lock is held.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn document_exists(&self, id: &str) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT 1 FROM documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert-or-replace the document row itself. Chunk rows are managed
    /// separately so the caller controls ordinal assignment.
    pub async fn put_document(
        &self,
        conn: &mut SqliteConnection,
        doc: &Document,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content, doc_type, department,
                                   upload_date, metadata_json, chunk_count, indexed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
            ON CONFLICT(id) DO UPDATE SET
                title=excluded.title,
                content=excluded.content,
                doc_type=excluded.doc_type,
                department=excluded.department,
                upload_date=excluded.upload_date,
                metadata_json=excluded.metadata_json,
                chunk_count=excluded.chunk_count,
                indexed=0
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(doc.doc_type.as_str())
        .bind(&doc.department)
        .bind(doc.upload_date)
        .bind(serde_json::to_string(&doc.metadata)?)
        .bind(doc.chunks.len() as i64)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Drop a document's chunk rows (the document row is replaced by
    /// `put_document`). Returns how many chunks were removed.
    pub async fn delete_document_chunks(
        &self,
        conn: &mut SqliteConnection,
        doc_id: &str,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Renumber surviving chunks to dense ordinals 0..n, preserving their
    /// relative order, and return their vectors in that order so the caller
    /// can rebuild the in-memory index to match.
    pub async fn compact_ordinals(
        &self,
        conn: &mut SqliteConnection,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        let rows = sqlx::query(
            "SELECT chunk_id, embedding FROM document_chunks ORDER BY global_ordinal",
        )
        .fetch_all(&mut *conn)
        .await?;

        // Two passes: shift everything negative first so the UNIQUE constraint
        // cannot trip while ordinals are reassigned.
        sqlx::query("UPDATE document_chunks SET global_ordinal = -global_ordinal - 1")
            .execute(&mut *conn)
            .await?;

        let mut vectors = Vec::with_capacity(rows.len());
        for (ordinal, row) in rows.iter().enumerate() {
            let chunk_id: String = row.try_get("chunk_id")?;
            sqlx::query("UPDATE document_chunks SET global_ordinal = ?1 WHERE chunk_id = ?2")
                .bind(ordinal as i64)
                .bind(chunk_id)
                .execute(&mut *conn)
                .await?;
            vectors.push(vector_from_bytes(row.try_get::<Vec<u8>, _>("embedding")?.as_slice()));
        }
        Ok(vectors)
    }

    /// Insert chunk rows with global ordinals `base_ordinal..`, in the same
    /// order the vectors are appended to the index.
    pub async fn insert_chunks(
        &self,
        conn: &mut SqliteConnection,
        doc_id: &str,
        chunks: &[String],
        vectors: &[Vec<f32>],
        base_ordinal: i64,
    ) -> anyhow::Result<()> {
        for (i, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
            sqlx::query(
                r#"
                INSERT INTO document_chunks (chunk_id, doc_id, chunk_index,
                                             global_ordinal, chunk_text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(format!("{}_chunk_{}", doc_id, i))
            .bind(doc_id)
            .bind(i as i64)
            .bind(base_ordinal + i as i64)
            .bind(chunk)
            .bind(vector_to_bytes(vector))
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn mark_indexed(
        &self,
        conn: &mut SqliteConnection,
        doc_id: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE documents SET indexed = 1 WHERE id = ?1")
            .bind(doc_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Resolve a vector-index ordinal back to (document, chunk text).
    pub async fn get_chunk_by_ordinal(
        &self,
        global_ordinal: i64,
    ) -> anyhow::Result<Option<HydratedChunk>> {
        let row = sqlx::query(
            r#"
            SELECT c.chunk_text, c.doc_id, d.title, d.department, d.doc_type
            FROM document_chunks c
            JOIN documents d ON d.id = c.doc_id
            WHERE c.global_ordinal = ?1
            "#,
        )
        .bind(global_ordinal)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            Ok(HydratedChunk {
                chunk_text: r.try_get("chunk_text")?,
                doc_id: r.try_get("doc_id")?,
                title: r.try_get("title")?,
                department: r.try_get("department")?,
                doc_type: r.try_get("doc_type")?,
            })
        })
        .transpose()
    }

    /// Exact-match filtered document listing.
    pub async fn query_documents(
        &self,
        department: Option<&str>,
        doc_type: Option<DocumentType>,
    ) -> anyhow::Result<Vec<storage::models::DocumentRow>> {
        let mut sql = String::from(
            "SELECT id, title, content, doc_type, department, upload_date, \
             metadata_json, chunk_count, indexed FROM documents WHERE 1=1",
        );
        if department.is_some() {
            sql.push_str(" AND department = ?");
        }
        if doc_type.is_some() {
            sql.push_str(" AND doc_type = ?");
        }
        sql.push_str(" ORDER BY upload_date DESC");

        let mut query = sqlx::query_as::<_, storage::models::DocumentRow>(&sql);
        if let Some(dept) = department {
            query = query.bind(dept.to_string());
        }
        if let Some(dtype) = doc_type {
            query = query.bind(dtype.as_str());
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn chunk_count(&self) -> anyhow::Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM document_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    /// All chunk vectors in global-ordinal order, for index rebuilds.
    pub async fn chunk_vectors_in_order(&self) -> anyhow::Result<Vec<Vec<f32>>> {
        let rows = sqlx::query("SELECT embedding FROM document_chunks ORDER BY global_ordinal")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| Ok(vector_from_bytes(r.try_get::<Vec<u8>, _>("embedding")?.as_slice())))
            .collect()
    }

    pub async fn stats(&self) -> anyhow::Result<DocumentStats> {
        let total_documents = sqlx::query("SELECT COUNT(*) AS n FROM documents")
            .fetch_one(&self.pool)
            .await?
            .try_get::<i64, _>("n")? as u64;
        let indexed_documents = sqlx::query("SELECT COUNT(*) AS n FROM documents WHERE indexed = 1")
            .fetch_one(&self.pool)
            .await?
            .try_get::<i64, _>("n")? as u64;
        let total_chunks = self.chunk_count().await?;

        let mut document_types = HashMap::new();
        for row in sqlx::query("SELECT doc_type, COUNT(*) AS n FROM documents GROUP BY doc_type")
            .fetch_all(&self.pool)
            .await?
        {
            document_types.insert(
                row.try_get::<String, _>("doc_type")?,
                row.try_get::<i64, _>("n")? as u64,
            );
        }

        let mut departments = HashMap::new();
        for row in sqlx::query("SELECT department, COUNT(*) AS n FROM documents GROUP BY department")
            .fetch_all(&self.pool)
            .await?
        {
            departments.insert(
                row.try_get::<String, _>("department")?,
                row.try_get::<i64, _>("n")? as u64,
            );
        }

        Ok(DocumentStats {
            total_documents,
            indexed_documents,
            total_chunks,
            document_types,
            departments,
        })
    }

    /// Append a row to the query audit log.
    pub async fn record_query(
        &self,
        query_text: &str,
        response: &str,
        documents_used: &[String],
        user_id: Option<&str>,
    ) -> anyhow::Result<()> {
        let now = chrono::Utc::now();
        let timestamp = now.timestamp();
        let nanos = now.timestamp_nanos_opt().unwrap_or(timestamp);
        let query_id = blake3::hash(format!("{}:{}", nanos, query_text).as_bytes())
            .to_hex()
            .to_string();
        sqlx::query(
            r#"
            INSERT INTO queries (query_id, query_text, response, documents_used, timestamp, user_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(query_id)
        .bind(query_text)
        .bind(response)
        .bind(serde_json::to_string(documents_used)?)
        .bind(timestamp)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
