//! Page-marker injection.
//!
//! Renderers write a page-break sentinel — a `-----` line framed by blank
//! lines — after every page, including the last one. This stage turns those
//! sentinels into numbered page markers so that page provenance survives
//! splitting:
//!
//! ```text
//! "Hello\n\n-----\n\nWorld\n\n-----\n\n"
//!   ──▶ "\n_Page 1 starts_\nHello\n\n\n_Page 2 starts_\n\n\nWorld\n\n\n\n"
//! ```
//!
//! The page-1 marker is prepended, every sentinel but the last becomes the
//! marker for the following page, and the last sentinel (end of document) is
//! dropped. Running this twice on the same text is not supported.

use crate::config::PageMarker;

/// The renderer's page-break line.
pub const PAGE_BREAK_SENTINEL: &str = "-----";

/// Replace page-break sentinels with sequential page markers.
///
/// Numbering follows sentinel order in a single left-to-right pass.
pub fn inject(raw: &str, marker: &PageMarker) -> String {
    let text = format!("{}{}", marker.framed(1), raw);
    let breaks = find_page_breaks(&text);

    let mut out = String::with_capacity(text.len() + breaks.len() * 24);
    let mut cursor = 0;
    let mut page = 2;

    for (i, &start) in breaks.iter().enumerate() {
        out.push_str(&text[cursor..start]);
        if i + 1 < breaks.len() {
            out.push_str(&marker.framed(page));
            page += 1;
        }
        cursor = start + PAGE_BREAK_SENTINEL.len();
    }
    out.push_str(&text[cursor..]);
    out
}

/// Byte offsets of every sentinel preceded and followed by `\n\n`.
///
/// The framing newlines are not consumed, so back-to-back sentinels
/// (an empty page) share them and are both found.
pub fn find_page_breaks(text: &str) -> Vec<usize> {
    text.match_indices(PAGE_BREAK_SENTINEL)
        .map(|(start, _)| start)
        .filter(|&start| {
            text[..start].ends_with("\n\n")
                && text[start + PAGE_BREAK_SENTINEL.len()..].starts_with("\n\n")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> PageMarker {
        PageMarker::default()
    }

    #[test]
    fn two_pages_reference_example() {
        let out = inject("Hello\n\n-----\n\nWorld\n\n-----\n\n", &marker());
        assert_eq!(
            out,
            "\n_Page 1 starts_\nHello\n\n\n_Page 2 starts_\n\n\nWorld\n\n\n\n"
        );
        assert!(!out.contains(PAGE_BREAK_SENTINEL));
    }

    #[test]
    fn k_sentinels_give_k_markers() {
        for k in 1..6 {
            let raw: String = (1..=k).map(|p| format!("page {p}\n\n-----\n\n")).collect();
            let out = inject(&raw, &marker());
            let pages = marker().page_numbers(&out);
            assert_eq!(pages, (1..=k as u32).collect::<Vec<_>>(), "k={k}");
            assert!(find_page_breaks(&out).is_empty());
        }
    }

    #[test]
    fn markers_precede_their_page_text() {
        let out = inject("one\n\n-----\n\ntwo\n\n-----\n\nthree\n\n-----\n\n", &marker());
        let p2 = out.find("_Page 2 starts_").unwrap();
        let p3 = out.find("_Page 3 starts_").unwrap();
        assert!(out.find("one").unwrap() < p2);
        assert!(p2 < out.find("two").unwrap());
        assert!(p3 < out.find("three").unwrap());
    }

    #[test]
    fn premarked_input_gets_a_second_page_one() {
        let out = inject("_Page 1 starts_\nHello\n\n-----\n\nWorld\n\n-----\n\n", &marker());
        assert_eq!(marker().page_numbers(&out), vec![1, 1, 2]);
        assert!(find_page_breaks(&out).is_empty());
    }

    #[test]
    fn no_sentinel_only_gets_page_one() {
        let out = inject("just text", &marker());
        assert_eq!(out, "\n_Page 1 starts_\njust text");
    }

    #[test]
    fn empty_page_sentinels_share_newlines() {
        let text = "a\n\n-----\n\n-----\n\nb";
        assert_eq!(find_page_breaks(text).len(), 2);
        let out = inject(text, &marker());
        // First sentinel becomes page 2; the second is the trailing one.
        assert_eq!(marker().page_numbers(&out), vec![1, 2]);
    }

    #[test]
    fn longer_rules_and_inline_dashes_are_not_sentinels() {
        assert!(find_page_breaks("a\n\n------\n\nb").is_empty());
        assert!(find_page_breaks("a\n-----\nb").is_empty());
        assert!(find_page_breaks("a\n\nx-----\n\nb").is_empty());
    }

    #[test]
    fn custom_marker_template() {
        let m = PageMarker::new("_Side {n} starter_").unwrap();
        let out = inject("a\n\n-----\n\nb\n\n-----\n\n", &m);
        assert!(out.starts_with("\n_Side 1 starter_\n"));
        assert!(out.contains("\n_Side 2 starter_\n"));
    }
}
