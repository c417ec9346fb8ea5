//! Chunked delivery of a finished response.
//!
//! The full response text is known before streaming begins; the stream
//! just paces its delivery. Dropping the stream cancels it without side
//! effects, and a fresh stream over the same response starts from the
//! beginning.

use std::time::Duration;

use tokio::time::sleep;

const DEFAULT_CHUNK_CHARS: usize = 48;

/// Paced reader over completed response text.
pub struct ResponseStream {
    chunks: Vec<String>,
    next: usize,
    pace: Duration,
}

impl ResponseStream {
    pub fn new(text: &str, pace: Duration) -> Self {
        Self::with_chunk_size(text, pace, DEFAULT_CHUNK_CHARS)
    }

    pub fn with_chunk_size(text: &str, pace: Duration, chunk_chars: usize) -> Self {
        let chunk_chars = chunk_chars.max(1);
        let mut chunks = Vec::new();
        let mut current = String::new();
        // Split on word boundaries so chunks never cut a word in half
        for word in text.split_inclusive(' ') {
            if !current.is_empty() && current.len() + word.len() > chunk_chars {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        Self {
            chunks,
            next: 0,
            pace,
        }
    }

    pub fn remaining(&self) -> usize {
        self.chunks.len() - self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.chunks.len()
    }

    /// Yields the next chunk after the pacing delay, or None when done.
    pub async fn next_chunk(&mut self) -> Option<&str> {
        if self.is_finished() {
            return None;
        }
        if self.next > 0 && !self.pace.is_zero() {
            sleep(self.pace).await;
        }
        let chunk = &self.chunks[self.next];
        self.next += 1;
        Some(chunk)
    }

    /// Drains the rest of the stream without pacing.
    pub fn collect_remaining(mut self) -> String {
        self.chunks.split_off(self.next).concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_reassemble_exactly() {
        let text = "Here's a plan: three sessions a week, with a rest day between each one.";
        let mut stream = ResponseStream::with_chunk_size(text, Duration::ZERO, 16);

        let mut rebuilt = String::new();
        while let Some(chunk) = stream.next_chunk().await {
            rebuilt.push_str(chunk);
        }
        assert_eq!(rebuilt, text);
    }

    #[tokio::test]
    async fn test_words_never_split() {
        let text = "accountability matters enormously here";
        let mut stream = ResponseStream::with_chunk_size(text, Duration::ZERO, 10);
        while let Some(chunk) = stream.next_chunk().await {
            assert!(text.contains(chunk.trim_end()));
        }
    }

    #[tokio::test]
    async fn test_restart_replays_from_start() {
        let text = "one two three four five six seven eight nine ten";
        let mut first = ResponseStream::with_chunk_size(text, Duration::ZERO, 12);
        let opening = first.next_chunk().await.map(str::to_string);
        drop(first);

        let mut second = ResponseStream::with_chunk_size(text, Duration::ZERO, 12);
        assert_eq!(second.next_chunk().await.map(str::to_string), opening);
        assert_eq!(second.collect_remaining().len(), text.len() - opening.unwrap().len());
    }

    #[test]
    fn test_empty_text_is_immediately_finished() {
        let stream = ResponseStream::new("", Duration::ZERO);
        assert!(stream.is_finished());
        assert_eq!(stream.remaining(), 0);
    }
}
