//! Chapter-heading normalisation for Danish legal texts.
//!
//! Retsinformation documents open each chapter with two lines:
//!
//! ```text
//! Kapitel 3
//!
//! _Lejerens pligter_
//! ```
//!
//! The header splitter only understands `#` headings, so this rewrites the
//! pair into `### Kapitel 3: Lejerens pligter`. Chapter ids may be arabic or
//! roman numerals. The title may use `_underscore_` or `*asterisk*` emphasis.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_CHAPTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(Kapitel (?:\d+|[IVXLCDM]+))[ \t]*\n\n(?:_([^_\n]+?)_|\*([^*\n]+?)\*)")
        .unwrap()
});

/// Rewrite every chapter heading into a level-3 markdown heading.
///
/// Each match is rewritten independently; the result contains no further
/// matches, so applying this twice is the same as applying it once.
pub fn normalize(text: &str) -> String {
    RE_CHAPTER
        .replace_all(text, |caps: &Captures<'_>| {
            let title = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            format!("### {}: {}", &caps[1], title)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arabic_chapter() {
        let input = "Intro\n\nKapitel 1\n\n_Lovens område_\n\n§ 1. Loven gælder.";
        assert_eq!(
            normalize(input),
            "Intro\n\n### Kapitel 1: Lovens område\n\n§ 1. Loven gælder."
        );
    }

    #[test]
    fn roman_chapter() {
        assert_eq!(
            normalize("Kapitel IV\n\n_Husleje_"),
            "### Kapitel IV: Husleje"
        );
    }

    #[test]
    fn asterisk_emphasis() {
        assert_eq!(
            normalize("Kapitel 2\n\n*Lejerens pligter*"),
            "### Kapitel 2: Lejerens pligter"
        );
    }

    #[test]
    fn bold_title_is_not_italic() {
        let input = "Kapitel 2\n\n**Lejerens pligter**";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn mid_line_reference_untouched() {
        let input = "jf. Kapitel 3\n\n_Noget_";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn requires_blank_line() {
        let input = "Kapitel 3\n_Noget_";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn multiple_chapters_rewritten_independently() {
        let input = "Kapitel 1\n\n_A_\n\ntekst\n\nKapitel 2\n\n_B_\n";
        assert_eq!(
            normalize(input),
            "### Kapitel 1: A\n\ntekst\n\n### Kapitel 2: B\n"
        );
    }

    #[test]
    fn idempotent() {
        let input = "Kapitel 1\n\n_A_\n\nKapitel XII\n\n*B*\n\nplain";
        let once = normalize(input);
        assert_eq!(normalize(&once), once);
    }
}
