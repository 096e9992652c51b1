//! Chunking: split one page's text into model-sized pieces.
//!
//! Free text tolerates being cut anywhere between words, so
//! [`ChunkPolicy::Chars`] packs space-joined lines up to a character budget.
//! Tabular text must keep records whole, so [`ChunkPolicy::Rows`] cuts only
//! between lines. Blank lines are dropped under both policies and never force
//! a cut.

use crate::config::ChunkPolicy;
use serde::{Deserialize, Serialize};

/// A bounded piece of one page's text, sent to the model in one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-indexed page the text came from.
    pub page_num: usize,
    /// 1-indexed position within the page.
    pub index: usize,
    pub text: String,
}

/// Split `text` into chunks. A page with no non-blank lines yields none.
pub fn chunk_page(text: &str, page_num: usize, policy: ChunkPolicy) -> Vec<Chunk> {
    let pieces = match policy {
        ChunkPolicy::Chars(max) => chunk_by_chars(text, max.max(1)),
        ChunkPolicy::Rows(max) => chunk_by_rows(text, max.max(1)),
    };
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            page_num,
            index: i + 1,
            text,
        })
        .collect()
}

fn chunk_by_chars(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        for piece in fit_line(line, max) {
            let piece_len = piece.chars().count();
            if buf_len > 0 && buf_len + 1 + piece_len > max {
                chunks.push(std::mem::take(&mut buf));
                buf_len = 0;
            }
            if buf_len > 0 {
                buf.push(' ');
                buf_len += 1;
            }
            buf.push_str(&piece);
            buf_len += piece_len;
        }
    }
    if buf_len > 0 {
        chunks.push(buf);
    }
    chunks
}

/// Break a line longer than `max` characters at whitespace; a single word
/// longer than `max` is cut at character boundaries.
fn fit_line(line: &str, max: usize) -> Vec<String> {
    if line.chars().count() <= max {
        return vec![line.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in line.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len > max {
            let chars: Vec<char> = word.chars().collect();
            for part in chars.chunks(max) {
                if current_len > 0 {
                    pieces.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.extend(part);
                current_len = part.len();
            }
            continue;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if current_len > 0 {
        pieces.push(current);
    }
    pieces
}

fn chunk_by_rows(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf: Vec<&str> = Vec::with_capacity(max);

    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            continue;
        }
        buf.push(line);
        if buf.len() >= max {
            chunks.push(buf.join("\n"));
            buf.clear();
        }
    }
    if !buf.is_empty() {
        chunks.push(buf.join("\n"));
    }
    chunks
}
