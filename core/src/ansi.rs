use regex_lite::Regex;
use std::sync::OnceLock;

/// Matches CSI escape sequences terminated by `m` (color), `G` (cursor
/// column) or `K` (erase line) — the sequences backend build tools emit for
/// progress rendering.
fn csi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[expect(clippy::unwrap_used)]
        let pattern = Regex::new("\u{1b}\\[[0-9;?]*[mGK]").unwrap();
        pattern
    })
}

/// Remove terminal color/cursor escape sequences from a line of command
/// output. Idempotent: already-clean text is returned unchanged.
pub fn scrub_csi(text: &str) -> String {
    csi_pattern().replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_text_is_unchanged() {
        assert_eq!(scrub_csi("plain output"), "plain output");
        assert_eq!(scrub_csi(""), "");
    }

    #[test]
    fn strips_color_sequences() {
        assert_eq!(scrub_csi("\u{1b}[31merror\u{1b}[0m text"), "error text");
    }

    #[test]
    fn strips_cursor_and_erase_sequences() {
        assert_eq!(scrub_csi("\u{1b}[2Kprogress 50%"), "progress 50%");
        assert_eq!(scrub_csi("\u{1b}[1Gcol"), "col");
    }

    #[test]
    fn preserves_surrounding_text() {
        assert_eq!(scrub_csi("a\u{1b}[1;32mb\u{1b}[0mc"), "abc");
    }

    #[test]
    fn scrubbing_is_idempotent() {
        let once = scrub_csi("\u{1b}[33mwarn\u{1b}[0m");
        assert_eq!(scrub_csi(&once), once);
    }

    #[test]
    fn leaves_non_csi_escapes_alone() {
        // Only `m`/`G`/`K` terminated CSI sequences are scrubbed.
        assert_eq!(scrub_csi("\u{1b}[2Jcleared"), "\u{1b}[2Jcleared");
    }
}
