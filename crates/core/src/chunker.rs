use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("chunk_size ({chunk_size}) must be greater than overlap ({overlap})")]
    InvalidWindow { chunk_size: usize, overlap: usize },
}

/// Collapse whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into overlapping windows of whitespace tokens.
///
/// Window i starts at token `i * (chunk_size - overlap)` and spans
/// `chunk_size` tokens. The returned order is the chunk ordinal and is
/// preserved through storage and indexing.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    if chunk_size <= overlap {
        return Err(ChunkError::InvalidWindow {
            chunk_size,
            overlap,
        });
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        let chunk = words[start..end].join(" ");
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        start += step;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_tokens(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn windows_overlap_and_reconstruct() {
        let text = numbered_tokens(1200);
        let chunks = chunk_text(&text, 500, 100).unwrap();
        assert_eq!(chunks.len(), 3);

        let words = |c: &str| c.split(' ').map(str::to_string).collect::<Vec<_>>();
        let (a, b, c) = (words(&chunks[0]), words(&chunks[1]), words(&chunks[2]));
        assert_eq!(a.len(), 500);
        assert_eq!(b.len(), 500);
        assert_eq!(c.len(), 400);

        // Windows 0 and 1 share exactly the 100-token overlap.
        assert_eq!(&a[400..], &b[..100]);

        // Dropping each window's leading overlap reconstructs the sequence.
        let mut rebuilt = a.clone();
        rebuilt.extend_from_slice(&b[100..]);
        rebuilt.extend_from_slice(&c[100..]);
        assert_eq!(rebuilt.join(" "), text);
    }

    #[test]
    fn whitespace_runs_are_collapsed() {
        let chunks = chunk_text("a  b\t\tc\n\nd", 2, 1).unwrap();
        assert_eq!(chunks[0], "a b");
        assert_eq!(chunks[1], "b c");
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 500, 100).unwrap().is_empty());
        assert!(chunk_text("   \n ", 500, 100).unwrap().is_empty());
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let chunks = chunk_text("one two three", 500, 100).unwrap();
        assert_eq!(chunks, vec!["one two three".to_string()]);
    }

    #[test]
    fn non_positive_step_fails_fast() {
        assert!(matches!(
            chunk_text("a b c", 100, 100),
            Err(ChunkError::InvalidWindow { .. })
        ));
        assert!(chunk_text("a b c", 50, 100).is_err());
    }
}
