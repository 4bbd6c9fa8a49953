//! Line-aware chunker for chunk embeddings.
//!
//! A chunk never splits a line. Consecutive chunks share `overlap_chars` of
//! trailing lines. The chunk count is capped; when the cap is reached the
//! remainder of the file is appended to the last chunk so no content is
//! dropped.

/// Chunking knobs. Defaults match the indexing pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub max_chunks: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: 1800,
            overlap_chars: 220,
            max_chunks: 20,
        }
    }
}

/// One emitted chunk with its 1-based line span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// Split `content` into line-aligned chunks.
pub fn chunk_lines(content: &str, cfg: ChunkConfig) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut i = 0usize;

    while i < lines.len() {
        let start = i;
        let mut len = 0usize;
        while i < lines.len() {
            let add = lines[i].len() + 1;
            if len + add > cfg.max_chars && len > 0 {
                break;
            }
            len += add;
            i += 1;
        }

        let is_last_slot = chunks.len() + 1 == cfg.max_chunks;
        let end = if is_last_slot { lines.len() } else { i };
        let text = lines[start..end].join("\n");
        chunks.push(Chunk {
            start_line: start + 1,
            end_line: end,
            text,
        });
        if end == lines.len() {
            break;
        }

        // Walk back over trailing lines to form the overlap window.
        let mut overlap = 0usize;
        let mut back = i;
        while back > start && overlap < cfg.overlap_chars {
            back -= 1;
            overlap += lines[back].len() + 1;
        }
        // Never stall: the next chunk must start past the previous start.
        i = back.max(start + 1);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max: usize, overlap: usize, chunks: usize) -> ChunkConfig {
        ChunkConfig {
            max_chars: max,
            overlap_chars: overlap,
            max_chunks: chunks,
        }
    }

    #[test]
    fn small_input_is_one_chunk() {
        let out = chunk_lines("a\nb\nc", ChunkConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "a\nb\nc");
        assert_eq!((out[0].start_line, out[0].end_line), (1, 3));
    }

    #[test]
    fn chunks_overlap_and_cover_everything() {
        let content: String = (0..120)
            .map(|i| format!("line number {i:04}"))
            .collect::<Vec<_>>()
            .join("\n");
        let out = chunk_lines(&content, cfg(400, 60, 20));
        assert!(out.len() > 1);

        // Consecutive chunks overlap by at least one line.
        for pair in out.windows(2) {
            assert!(pair[1].start_line <= pair[0].end_line);
            assert!(pair[1].start_line > pair[0].start_line);
        }

        // Every line of the input appears in some chunk.
        for i in 0..120 {
            let needle = format!("line number {i:04}");
            assert!(out.iter().any(|c| c.text.contains(&needle)), "{needle}");
        }
    }

    #[test]
    fn cap_appends_remainder_to_last_chunk() {
        let content: String = (0..500)
            .map(|i| format!("row {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let out = chunk_lines(&content, cfg(100, 20, 3));
        assert_eq!(out.len(), 3);
        assert_eq!(out.last().unwrap().end_line, 500);
        assert!(out.last().unwrap().text.contains("row 499"));
    }
}
