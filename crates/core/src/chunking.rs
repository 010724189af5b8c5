use crate::error::WorkflowError;
use crate::models::IngestionOptions;
use regex::Regex;

/// Splits document text into overlapping chunks, preferring sentence
/// boundaries and falling back to hard character windows when a single
/// sentence exceeds the chunk size.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    boundary: Regex,
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl SentenceChunker {
    pub fn new(options: IngestionOptions) -> Result<Self, WorkflowError> {
        if options.chunk_size == 0 {
            return Err(WorkflowError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if options.chunk_overlap >= options.chunk_size {
            return Err(WorkflowError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                options.chunk_overlap, options.chunk_size
            )));
        }

        Ok(Self {
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
            boundary: Regex::new(r#"[.!?]["')\]]*\s+"#)?,
        })
    }

    /// Empty or whitespace-only input yields no chunks; callers decide
    /// whether that is an error.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0usize;

        for sentence in self.sentences(trimmed) {
            let sentence_len = sentence.chars().count();

            if sentence_len > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(current.concat());
                    current.clear();
                    current_len = 0;
                }
                chunks.extend(self.hard_split(&sentence));
                continue;
            }

            if !current.is_empty() && current_len + sentence_len > self.chunk_size {
                chunks.push(current.concat());
                let (tail, tail_len) = self.overlap_tail(&current, sentence_len);
                current = tail;
                current_len = tail_len;
            }

            current_len += sentence_len;
            current.push(sentence);
        }

        if !current.is_empty() {
            chunks.push(current.concat());
        }

        chunks
    }

    /// Segments text into sentence-sized pieces whose concatenation equals
    /// the input exactly, so no character is lost to chunking.
    fn sentences(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut last = 0;

        for found in self.boundary.find_iter(text) {
            if found.end() > last {
                out.push(text[last..found.end()].to_string());
                last = found.end();
            }
        }

        if last < text.len() {
            out.push(text[last..].to_string());
        }

        out
    }

    /// Trailing sentences of the previous chunk that seed the next one,
    /// bounded by the configured overlap and the chunk size.
    fn overlap_tail(&self, previous: &[String], upcoming_len: usize) -> (Vec<String>, usize) {
        let mut tail = Vec::new();
        let mut tail_len = 0usize;

        for sentence in previous.iter().rev() {
            let sentence_len = sentence.chars().count();
            if tail_len + sentence_len > self.chunk_overlap
                || tail_len + sentence_len + upcoming_len > self.chunk_size
            {
                break;
            }
            tail_len += sentence_len;
            tail.push(sentence.clone());
        }

        tail.reverse();
        (tail, tail_len)
    }

    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            pieces.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> SentenceChunker {
        SentenceChunker::new(IngestionOptions {
            chunk_size,
            chunk_overlap,
        })
        .unwrap()
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");

        // Non-breaking spaces count as whitespace too.
        assert_eq!(normalize_whitespace("a\u{a0}b"), "a b");
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let result = SentenceChunker::new(IngestionOptions {
            chunk_size: 100,
            chunk_overlap: 100,
        });
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = chunker(100, 20);
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text("   \n\t ").is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunker = chunker(100, 20);
        let chunks = chunker.split_text("One sentence only.");
        assert_eq!(chunks, vec!["One sentence only.".to_string()]);
    }

    #[test]
    fn every_sentence_is_covered_by_some_chunk() {
        let chunker = chunker(60, 15);
        let text = "First sentence here. Second sentence follows. Third one is a bit longer than the rest. Fourth closes it.";
        let chunks = chunker.split_text(text);

        assert!(chunks.len() > 1);
        for sentence in ["First sentence here.", "Second sentence follows.", "Fourth closes it."] {
            assert!(
                chunks.iter().any(|chunk| chunk.contains(sentence)),
                "missing sentence: {sentence}"
            );
        }
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 60);
        }
    }

    #[test]
    fn consecutive_chunks_share_sentences() {
        let chunker = chunker(60, 30);
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. Nu xi omicron pi.";
        let chunks = chunker.split_text(text);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let head: String = pair[1].chars().take(10).collect();
            assert!(
                pair[0].contains(&head),
                "chunk {:?} does not overlap into {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn oversized_sentence_is_hard_split_with_exact_overlap() {
        let chunker = chunker(20, 5);
        let text: String = "abcdefghij".repeat(5); // no sentence boundary, 50 chars
        let chunks = chunker.split_text(&text);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 5).collect();
            let head: String = pair[1].chars().take(5).collect();
            assert_eq!(tail, head);
        }

        // Windows advanced by size - overlap reassemble into the input.
        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(5));
        }
        assert_eq!(rebuilt, text);
    }
}
