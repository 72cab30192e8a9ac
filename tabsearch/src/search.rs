//! Snippet extraction
//!
//! Picks the window of a stored body holding the most matched terms,
//! collapses whitespace, escapes HTML and wraps matches in `<b>` markers.
//! All offsets here are char offsets into the whitespace-collapsed body.

use crate::language::LanguageProfile;
use std::collections::HashSet;

pub const HIGHLIGHT_OPEN: &str = "<b>";
pub const HIGHLIGHT_CLOSE: &str = "</b>";
pub const ELLIPSIS: char = '\u{2026}';

/// A matched token, `[start, end)` in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Highlight {
    start: usize,
    end: usize,
}

/// Excerpt of `body` around the densest cluster of `matched_terms`.
///
/// Tokens whose normalized term also occurs in `omit` are not highlighted.
/// The visible text (markers excluded, entities counted as one char) is at
/// most `max_length` chars including ellipses, unless a single word is
/// longer than the window. Returns an empty string when nothing matches.
pub fn snippet(
    profile: &LanguageProfile,
    body: &str,
    max_length: usize,
    omit: &str,
    matched_terms: &HashSet<String>,
) -> String {
    if max_length == 0 || matched_terms.is_empty() || body.trim().is_empty() {
        return String::new();
    }

    let omitted: HashSet<String> = profile.analyze(omit).into_iter().map(|t| t.term).collect();

    let byte_starts: Vec<usize> = body.char_indices().map(|(b, _)| b).collect();
    let to_char = |byte: usize| byte_starts.partition_point(|&b| b < byte);

    let chars: Vec<char> = body.chars().collect();
    let (text, pos_map) = collapse_whitespace(&chars);

    let highlights: Vec<Highlight> = profile
        .analyze(body)
        .into_iter()
        .filter(|t| matched_terms.contains(&t.term) && !omitted.contains(&t.term))
        .filter_map(|t| {
            let start = *pos_map.get(to_char(t.byte_start))?;
            let end = (*pos_map.get(to_char(t.byte_end))?).min(text.len());
            (end > start).then_some(Highlight { start, end })
        })
        .collect();

    if highlights.is_empty() {
        return String::new();
    }

    let (start, end) = choose_window(&text, &highlights, max_length);
    render(&text, &highlights, start, end)
}

/// Collapse whitespace runs to one space and trim both ends. The map gives,
/// for every source char (plus one past the end), its collapsed index.
fn collapse_whitespace(chars: &[char]) -> (Vec<char>, Vec<usize>) {
    let mut result = Vec::with_capacity(chars.len());
    let mut pos_map = Vec::with_capacity(chars.len() + 1);
    let mut last_was_space = true;

    for &ch in chars {
        pos_map.push(result.len());
        if ch.is_whitespace() {
            if last_was_space {
                continue;
            }
            last_was_space = true;
            result.push(' ');
        } else {
            last_was_space = false;
            result.push(ch);
        }
    }
    pos_map.push(result.len());

    if result.last() == Some(&' ') {
        result.pop();
    }
    (result, pos_map)
}

/// Index of the highlight opening the window of `window_size` chars that
/// holds the most highlights. `highlights` must be sorted by start.
fn find_densest_highlight(highlights: &[Highlight], window_size: usize) -> Option<usize> {
    if highlights.is_empty() {
        return None;
    }

    let mut left = 0;
    let mut best_left = 0;
    let mut best_count = 0;

    for right in 0..highlights.len() {
        while highlights[left].start + window_size < highlights[right].end {
            left += 1;
        }
        let count = right - left + 1;
        if count > best_count {
            best_count = count;
            best_left = left;
        }
    }

    Some(best_left)
}

/// `[start, end)` of the excerpt, snapped to whitespace where possible.
fn choose_window(text: &[char], highlights: &[Highlight], max_length: usize) -> (usize, usize) {
    let n = text.len();
    if n <= max_length {
        return (0, n);
    }

    // Room for a leading and a trailing ellipsis.
    let window = max_length.saturating_sub(2).max(1);
    let first = find_densest_highlight(highlights, window).unwrap_or(0);
    let anchor = highlights[first];

    let cluster_end = highlights[first..]
        .iter()
        .take_while(|h| h.end <= anchor.start + window)
        .map(|h| h.end)
        .max()
        .unwrap_or(anchor.end);
    let slack = window.saturating_sub(cluster_end - anchor.start);

    let mut start = anchor.start - (slack / 2).min(anchor.start);
    let mut end = (start + window).min(n);
    if end == n {
        start = n.saturating_sub(window);
    }

    // Start after a space, without passing the anchor. When the anchor is
    // glued to the preceding text, back off to the start of that word.
    if start > 0 && text[start - 1] != ' ' {
        match text[start..anchor.start].iter().position(|&c| c == ' ') {
            Some(space) => start += space + 1,
            None => {
                start = text[..start].iter().rposition(|&c| c == ' ').map_or(0, |p| p + 1);
                end = (start + window).min(n);
            }
        }
    }

    // End before a space; a single word longer than the window runs on.
    if end < n && text[end] != ' ' {
        match text[start..end].iter().rposition(|&c| c == ' ') {
            Some(space) if start + space >= anchor.end => end = start + space,
            _ => {
                end = text[end..].iter().position(|&c| c == ' ').map_or(n, |p| end + p);
            }
        }
    }

    while start < end && text[start] == ' ' {
        start += 1;
    }
    while end > start && text[end - 1] == ' ' {
        end -= 1;
    }
    (start, end)
}

fn render(text: &[char], highlights: &[Highlight], start: usize, end: usize) -> String {
    let mut out = String::with_capacity((end - start) * 2);
    if start > 0 {
        out.push(ELLIPSIS);
    }

    let mut open = false;
    let mut next = highlights.iter().filter(|h| h.end > start && h.start < end).peekable();
    for (i, &ch) in text.iter().enumerate().take(end).skip(start) {
        if !open {
            if let Some(h) = next.peek() {
                if i >= h.start {
                    out.push_str(HIGHLIGHT_OPEN);
                    open = true;
                }
            }
        }
        push_escaped(&mut out, ch);
        if open {
            if let Some(h) = next.peek() {
                if i + 1 >= h.end {
                    out.push_str(HIGHLIGHT_CLOSE);
                    open = false;
                    next.next();
                }
            }
        }
    }
    if open {
        out.push_str(HIGHLIGHT_CLOSE);
    }

    if end < text.len() {
        out.push(ELLIPSIS);
    }
    out
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        c => out.push(c),
    }
}

/// Visible text of a snippet: markers removed and entities decoded.
pub fn visible_text(snippet: &str) -> String {
    snippet
        .replace(HIGHLIGHT_OPEN, "")
        .replace(HIGHLIGHT_CLOSE, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;

    fn english() -> LanguageProfile {
        LanguageProfile::new(Language::English)
    }

    fn terms(words: &str) -> HashSet<String> {
        english().analyze(words).into_iter().map(|t| t.term).collect()
    }

    #[test]
    fn test_highlights_whole_body_when_it_fits() {
        let body = "Rust ownership rules are checked at compile time";
        let out = snippet(&english(), body, 300, "", &terms("ownership"));
        assert_eq!(out, "Rust <b>ownership</b> rules are checked at compile time");
    }

    #[test]
    fn test_stemmed_matches_are_highlighted() {
        let body = "Programming with programs";
        let out = snippet(&english(), body, 300, "", &terms("program"));
        assert_eq!(out, "<b>Programming</b> with <b>programs</b>");
    }

    #[test]
    fn test_no_match_is_empty() {
        assert_eq!(snippet(&english(), "nothing relevant", 300, "", &terms("rust")), "");
        assert_eq!(snippet(&english(), "rust", 0, "", &terms("rust")), "");
    }

    #[test]
    fn test_omitted_terms_are_not_highlighted() {
        let body = "Rust guide about rust ownership";
        let out = snippet(&english(), body, 300, "Rust Guide", &terms("rust ownership"));
        assert_eq!(out, "Rust guide about rust <b>ownership</b>");
        assert_eq!(snippet(&english(), body, 300, "rust ownership", &terms("rust ownership")), "");
    }

    #[test]
    fn test_escapes_html() {
        let body = "if a < b && \"rust\" > c";
        let out = snippet(&english(), body, 300, "", &terms("rust"));
        assert_eq!(out, "if a &lt; b &amp;&amp; &quot;<b>rust</b>&quot; &gt; c");
        assert_eq!(visible_text(&out), body);
    }

    #[test]
    fn test_collapses_whitespace() {
        let body = "  first line\n\n\tsecond   rust line  ";
        let out = snippet(&english(), body, 300, "", &terms("rust"));
        assert_eq!(out, "first line second <b>rust</b> line");
    }

    #[test]
    fn test_long_body_is_bounded_with_ellipses() {
        let filler = "lorem ipsum dolor sit amet ".repeat(40);
        let body = format!("{filler}the borrow checker enforces ownership {filler}");
        let out = snippet(&english(), &body, 60, "", &terms("ownership"));

        let visible = visible_text(&out);
        assert!(visible.chars().count() <= 60, "{visible}");
        assert!(visible.starts_with(ELLIPSIS));
        assert!(visible.ends_with(ELLIPSIS));
        assert!(out.contains("<b>ownership</b>"));
    }

    #[test]
    fn test_window_prefers_densest_cluster() {
        let filler = "lorem ipsum dolor sit amet ".repeat(20);
        let body = format!("rust intro {filler} rust and more rust with rust {filler}");
        let out = snippet(&english(), &body, 80, "", &terms("rust"));
        assert_eq!(out.matches(HIGHLIGHT_OPEN).count(), 3);
        assert!(visible_text(&out).chars().count() <= 80);
    }

    #[test]
    fn test_single_overlong_word_runs_on() {
        let body = format!("{} rust", "x".repeat(50));
        let out = snippet(&english(), &body, 10, "", &terms("rust"));
        assert!(out.contains("<b>rust</b>"));
    }

    #[test]
    fn test_window_never_starts_inside_a_glued_word() {
        let filler = "lorem ipsum dolor sit amet";
        let body = format!("{filler} see docs.rs/ownership today {filler}");
        let out = snippet(&english(), &body, 24, "", &terms("ownership"));
        assert_eq!(out, "\u{2026}docs.rs/<b>ownership</b>\u{2026}");
    }

    #[test]
    fn test_densest_highlight_counts_matches() {
        let highlights = vec![
            Highlight { start: 0, end: 4 },
            Highlight { start: 100, end: 104 },
            Highlight { start: 110, end: 114 },
        ];
        assert_eq!(find_densest_highlight(&highlights, 20), Some(1));
        assert_eq!(find_densest_highlight(&[], 20), None);
    }
}
