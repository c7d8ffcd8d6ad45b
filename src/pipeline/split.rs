//! Two-stage markdown splitting.
//!
//! 1. [`HeaderSplitter`] cuts the document at `#`, `##`, `###` headings and
//!    tags each section with the heading text active above it
//!    (`{"#": "Lejeloven", "###": "Kapitel 2: Husleje"}`).
//! 2. [`CharacterSplitter`] cuts each section into windows of at most
//!    `chunk_size` characters, trying paragraph breaks first, then line
//!    breaks, then spaces, then arbitrary characters, and carries up to
//!    `chunk_overlap` characters of context from one window into the next.
//!
//! Every window inherits its section's metadata.

use crate::chunk::{Chunk, Metadata};
use serde_json::Value;
use std::collections::VecDeque;

/// Split `text` at headings up to `header_depth`, then into overlapping windows.
pub fn split_markdown(
    text: &str,
    header_depth: usize,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    let sections = HeaderSplitter::up_to(header_depth).split(text);
    let windows = CharacterSplitter::new(chunk_size, chunk_overlap);

    sections
        .into_iter()
        .flat_map(|section| {
            windows
                .split_text(&section.content)
                .into_iter()
                .map(move |content| Chunk {
                    content,
                    metadata: section.metadata.clone(),
                })
        })
        .collect()
}

// ── Header splitting ─────────────────────────────────────────────────────────

/// Splits markdown into sections at selected heading levels.
#[derive(Debug, Clone)]
pub struct HeaderSplitter {
    levels: Vec<usize>,
    strip_headers: bool,
}

impl HeaderSplitter {
    /// Split on the given heading levels (1 = `#`).
    pub fn new(levels: impl IntoIterator<Item = usize>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
            strip_headers: true,
        }
    }

    /// Split on every level from `#` down to `depth` hashes.
    pub fn up_to(depth: usize) -> Self {
        Self::new(1..=depth)
    }

    /// Keep heading lines at the top of their section's content.
    pub fn keep_headers(mut self) -> Self {
        self.strip_headers = false;
        self
    }

    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let mut sections = Vec::new();
        let mut active: Vec<(usize, String)> = Vec::new();
        let mut lines: Vec<&str> = Vec::new();
        let mut in_fence = false;

        for line in text.lines() {
            let trimmed = line.trim();

            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                lines.push(line);
                continue;
            }

            if !in_fence {
                if let Some((level, title)) = parse_header(trimmed) {
                    if self.levels.contains(&level) {
                        flush_section(&mut sections, &active, &mut lines);
                        active.retain(|(l, _)| *l < level);
                        active.push((level, title));
                        if !self.strip_headers {
                            lines.push(trimmed);
                        }
                        continue;
                    }
                }
            }

            lines.push(line);
        }
        flush_section(&mut sections, &active, &mut lines);

        sections
    }
}

/// Parse an ATX heading: returns `(level, title)`.
pub fn parse_header(line: &str) -> Option<(usize, String)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        return None;
    }
    Some((hashes, title.to_string()))
}

fn flush_section(sections: &mut Vec<Chunk>, active: &[(usize, String)], lines: &mut Vec<&str>) {
    let content = collapse_blank_lines(lines);
    lines.clear();
    if content.is_empty() {
        return;
    }

    let mut metadata = Metadata::new();
    for (level, title) in active {
        metadata.insert("#".repeat(*level), Value::String(title.clone()));
    }
    sections.push(Chunk { content, metadata });
}

/// Join lines, trimming line ends and keeping at most one blank line in a row.
fn collapse_blank_lines(lines: &[&str]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() && matches!(out.last(), None | Some(&"")) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

// ── Character splitting ──────────────────────────────────────────────────────

/// Recursive character splitter with overlap. Lengths are in `char`s.
#[derive(Debug, Clone)]
pub struct CharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<&'static str>,
}

impl CharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            separators: vec!["\n\n", "\n", " ", ""],
        }
    }

    /// Split `text` into trimmed, non-empty windows of at most `chunk_size` chars.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        // First separator present in the text; "" always matches.
        let (position, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len(), ""));
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut windows = Vec::new();
        let mut short: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                windows.extend(self.merge(&short, separator));
                short.clear();
            }
            if remaining.is_empty() {
                windows.push(piece.to_string());
            } else {
                windows.extend(self.split_recursive(piece, remaining));
            }
        }
        if !short.is_empty() {
            windows.extend(self.merge(&short, separator));
        }

        windows
    }

    /// Greedily pack pieces into windows, keeping a tail of at most
    /// `chunk_overlap` chars as the head of the next window.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                if let Some(window) = join_window(&current, separator) {
                    windows.push(window);
                }
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    let dropped = char_len(first) + if current.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(dropped);
                }
            }

            current.push_back(piece);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        if let Some(window) = join_window(&current, separator) {
            windows.push(window);
        }
        windows
    }
}

fn join_window(pieces: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_levels() {
        assert_eq!(parse_header("# Title"), Some((1, "Title".into())));
        assert_eq!(parse_header("### Kapitel 1: A"), Some((3, "Kapitel 1: A".into())));
        assert_eq!(parse_header("#NoSpace"), None);
        assert_eq!(parse_header("####### seven"), None);
        assert_eq!(parse_header("#   "), None);
    }

    #[test]
    fn header_split_tags_sections() {
        let md = "# Lejeloven\nintro\n### Kapitel 1: A\nfirst\n### Kapitel 2: B\nsecond";
        let sections = HeaderSplitter::up_to(3).split(md);
        assert_eq!(sections.len(), 3);

        assert_eq!(sections[0].content, "intro");
        assert_eq!(sections[0].meta_str("#"), Some("Lejeloven"));
        assert_eq!(sections[0].meta_str("###"), None);

        assert_eq!(sections[1].content, "first");
        assert_eq!(sections[1].meta_str("#"), Some("Lejeloven"));
        assert_eq!(sections[1].meta_str("###"), Some("Kapitel 1: A"));

        assert_eq!(sections[2].meta_str("###"), Some("Kapitel 2: B"));
    }

    #[test]
    fn higher_heading_clears_lower_ones() {
        let md = "# A\n## B\n### C\nx\n## D\ny";
        let sections = HeaderSplitter::up_to(3).split(md);
        let last = sections.last().unwrap();
        assert_eq!(last.content, "y");
        assert_eq!(last.meta_str("##"), Some("D"));
        assert_eq!(last.meta_str("###"), None);
        let keys: Vec<&str> = last.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["#", "##"]);
    }

    #[test]
    fn deeper_headings_stay_in_content() {
        let md = "### C\n#### detail\nbody";
        let sections = HeaderSplitter::up_to(3).split(md);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "#### detail\nbody");
    }

    #[test]
    fn fenced_hash_lines_are_not_headings() {
        let md = "# A\n```\n# not a heading\n```\nafter";
        let sections = HeaderSplitter::up_to(3).split(md);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("# not a heading"));
    }

    #[test]
    fn keep_headers_leaves_heading_line() {
        let md = "intro\n### Kapitel 1: A\nbody";
        let sections = HeaderSplitter::new([3]).keep_headers().split(md);
        assert_eq!(sections[1].content, "### Kapitel 1: A\nbody");
    }

    #[test]
    fn empty_sections_dropped_and_blank_runs_collapsed() {
        let md = "# A\n\n\n# B\npara one\n\n\n\npara two\n\n";
        let sections = HeaderSplitter::up_to(1).split(md);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "para one\n\npara two");
    }

    #[test]
    fn short_text_is_one_window() {
        let s = CharacterSplitter::new(100, 10);
        assert_eq!(s.split_text("  short text \n"), vec!["short text"]);
        assert!(s.split_text("   \n\n ").is_empty());
    }

    #[test]
    fn windows_respect_size_in_chars() {
        let para = "Lejeren skal betale husleje til udlejeren hver måned. ".repeat(40);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let s = CharacterSplitter::new(300, 40);
        let windows = s.split_text(&text);
        assert!(windows.len() > 3);
        for w in &windows {
            assert!(w.chars().count() <= 300, "window of {} chars", w.chars().count());
        }
    }

    #[test]
    fn consecutive_windows_overlap() {
        let words: Vec<String> = (0..200).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let s = CharacterSplitter::new(100, 20);
        let windows = s.split_text(&text);
        for pair in windows.windows(2) {
            let last_word = pair[0].split(' ').next_back().unwrap();
            assert!(
                pair[1].split(' ').any(|w| w == last_word),
                "expected '{last_word}' carried into next window"
            );
        }
    }

    #[test]
    fn zero_overlap_has_no_repeats() {
        let words: Vec<String> = (0..100).map(|i| format!("w{i}")).collect();
        let s = CharacterSplitter::new(50, 0);
        let windows = s.split_text(&words.join(" "));
        let rejoined: Vec<&str> = windows.iter().flat_map(|w| w.split(' ')).collect();
        assert_eq!(rejoined.len(), 100);
    }

    #[test]
    fn unbroken_run_falls_back_to_chars() {
        let text = "x".repeat(250);
        let windows = CharacterSplitter::new(100, 0).split_text(&text);
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.len() <= 100));
    }

    #[test]
    fn split_markdown_copies_section_metadata() {
        let body = "tekst ".repeat(100);
        let md = format!("# Lov\n### Kapitel 1: A\n{body}");
        let chunks = split_markdown(&md, 3, 120, 10);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert_eq!(c.meta_str("#"), Some("Lov"));
            assert_eq!(c.meta_str("###"), Some("Kapitel 1: A"));
            assert!(c.content.chars().count() <= 120);
        }
    }
}
