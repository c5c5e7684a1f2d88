use std::sync::LazyLock;

use regex::Regex;
use unaccent::unaccent;

static SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid special chars regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\([^)]*\)|\[[^\]]*\]|\{[^}]*\}").expect("valid bracket regex")
});

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").to_string()
}

fn clean_search_string(s: &str, remove_special: bool) -> String {
    if remove_special {
        collapse_whitespace(&SPECIAL_CHARS.replace_all(s, " "))
    } else {
        collapse_whitespace(s)
    }
}

/// Case folded, diacritic free, alphanumerics and spaces only.
fn fold_alphanumeric(s: &str) -> String {
    let folded = unaccent(s).to_lowercase();
    collapse_whitespace(&SPECIAL_CHARS.replace_all(&folded, ""))
}

fn strip_brackets(s: &str) -> String {
    collapse_whitespace(&BRACKETED.replace_all(s, " "))
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the ordered search queries for a request.
///
/// Index `n` of the returned list is fallback level `n`; empty and repeated
/// queries are dropped so every entry costs exactly one network search.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryComposer {
    pub remove_special_chars: bool,
}

impl QueryComposer {
    pub fn new(remove_special_chars: bool) -> Self {
        Self {
            remove_special_chars,
        }
    }

    pub fn track_queries(&self, artist: &str, title: &str, album: &str) -> Vec<String> {
        let levels = [
            join_parts(&[artist, album, title]),
            album.trim().to_string(),
            fold_alphanumeric(album),
        ];
        self.finish(levels)
    }

    pub fn album_queries(&self, artist: &str, album: &str) -> Vec<String> {
        let levels = [
            join_parts(&[artist, album]),
            strip_brackets(album),
            fold_alphanumeric(album),
        ];
        self.finish(levels)
    }

    fn finish<const N: usize>(&self, levels: [String; N]) -> Vec<String> {
        let mut queries: Vec<String> = Vec::with_capacity(N);
        for level in levels {
            let query = clean_search_string(&level, self.remove_special_chars);
            if query.is_empty() || queries.contains(&query) {
                continue;
            }
            queries.push(query);
        }
        queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_queries_levels() {
        let queries = QueryComposer::default().track_queries("Artist A", "Song X", "Album Y!");
        assert_eq!(
            queries,
            vec![
                "Artist A Album Y! Song X".to_string(),
                "Album Y!".to_string(),
                "album y".to_string(),
            ]
        );
    }

    #[test]
    fn test_track_queries_without_album() {
        let queries = QueryComposer::default().track_queries("Artist", "Song", "");
        assert_eq!(queries, vec!["Artist Song".to_string()]);
    }

    #[test]
    fn test_track_queries_skip_duplicates() {
        // "album" folded is identical to the raw album level
        let queries = QueryComposer::default().track_queries("Artist", "Song", "album");
        assert_eq!(
            queries,
            vec!["Artist album Song".to_string(), "album".to_string()]
        );
    }

    #[test]
    fn test_fold_removes_diacritics_and_punctuation() {
        assert_eq!(fold_alphanumeric("Café  Del Mar (Vol. 1)"), "cafe del mar vol 1");
    }

    #[test]
    fn test_album_queries_levels() {
        let queries =
            QueryComposer::default().album_queries("Radiohead", "OK Computer [OKNOTOK] (Remastered)");
        assert_eq!(
            queries,
            vec![
                "Radiohead OK Computer [OKNOTOK] (Remastered)".to_string(),
                "OK Computer".to_string(),
                "ok computer oknotok remastered".to_string(),
            ]
        );
    }

    #[test]
    fn test_remove_special_chars_applies_to_every_level() {
        let queries = QueryComposer::new(true).track_queries("AC/DC", "T.N.T.", "High Voltage!");
        assert_eq!(queries[0], "AC DC High Voltage T N T");
        assert_eq!(queries[1], "High Voltage");
        assert_eq!(queries[2], "high voltage");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let queries = QueryComposer::default().album_queries("  Artist  ", "  Some   Album ");
        assert_eq!(queries[0], "Artist Some Album");
        assert_eq!(queries[1], "Some Album");
    }

    #[test]
    fn test_empty_request_has_no_queries() {
        assert!(QueryComposer::default().track_queries("", "", "").is_empty());
    }
}
