//! Character-budget text chunking.

use regex::Regex;
use std::sync::LazyLock;

/// Whitespace that follows a CJK or Latin sentence terminator.
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。！？.!?;；]\s+").expect("valid sentence boundary pattern"));

/// Splits `text` into chunks of at most `limit` characters.
///
/// A `limit` of zero, or text that already fits, returns `[text]` unchanged.
/// Otherwise paragraphs that fit are kept whole, longer paragraphs are packed
/// sentence by sentence (joined by a single space), and anything still over
/// budget is hard-split into `limit`-sized slices.
///
/// Lengths are counted in characters, not bytes.
#[must_use]
pub fn segment_text(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || char_len(text) <= limit {
        return vec![text.to_string()];
    }

    let content = text.replace('\r', "");
    let mut paragraphs: Vec<&str> = content
        .split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.is_empty() {
        paragraphs.push(content.trim());
    }

    let mut parts: Vec<String> = Vec::new();
    for para in paragraphs {
        if char_len(para) <= limit {
            parts.push(para.to_string());
            continue;
        }
        pack_sentences(&split_sentences(para), limit, &mut parts);
    }

    let mut segments = Vec::with_capacity(parts.len());
    for part in parts {
        if char_len(&part) <= limit {
            segments.push(part);
        } else {
            hard_split(&part, limit, &mut segments);
        }
    }
    segments
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_sentences(para: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in SENTENCE_BOUNDARY.find_iter(para) {
        // The terminator belongs to the sentence; the whitespace run is dropped.
        let terminator_len = m.as_str().chars().next().map_or(0, char::len_utf8);
        sentences.push(&para[last..m.start() + terminator_len]);
        last = m.end();
    }
    sentences.push(&para[last..]);

    let sentences: Vec<&str> = sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        vec![para]
    } else {
        sentences
    }
}

fn pack_sentences(sentences: &[&str], limit: usize, out: &mut Vec<String>) {
    let mut buf = String::new();
    let mut buf_len = 0;
    for sentence in sentences {
        let len = char_len(sentence);
        if buf.is_empty() {
            buf.push_str(sentence);
            buf_len = len;
        } else if buf_len + 1 + len <= limit {
            buf.push(' ');
            buf.push_str(sentence);
            buf_len += 1 + len;
        } else {
            out.push(std::mem::take(&mut buf));
            buf.push_str(sentence);
            buf_len = len;
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
}

fn hard_split(part: &str, limit: usize, out: &mut Vec<String>) {
    let chars: Vec<char> = part.chars().collect();
    out.extend(chars.chunks(limit).map(|chunk| chunk.iter().collect::<String>()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_short_text_returned_unchanged() {
        assert_eq!(segment_text("hello world", 50), vec!["hello world"]);
        assert_eq!(segment_text("  padded \r\n", 50), vec!["  padded \r\n"]);
    }

    #[test]
    fn test_zero_limit_returns_input() {
        let text = "a".repeat(100);
        assert_eq!(segment_text(&text, 0), vec![text.clone()]);
    }

    #[test]
    fn test_empty_input_returned_unchanged() {
        assert_eq!(segment_text("", 10), vec![String::new()]);
    }

    #[test]
    fn test_paragraphs_kept_whole_when_they_fit() {
        let text = "First paragraph here.\r\n\nSecond one.\nThird.";
        let segments = segment_text(text, 25);
        assert_eq!(
            segments,
            vec!["First paragraph here.", "Second one.", "Third."]
        );
    }

    #[test]
    fn test_sentences_packed_greedily() {
        let text = "One two. Three four! Five six? Seven.";
        let segments = segment_text(text, 20);
        assert_eq!(segments, vec!["One two. Three four!", "Five six? Seven."]);
    }

    #[test]
    fn test_cjk_terminators_split() {
        let text = "第一句话。 第二句话！ 第三句话？ 第四句话；";
        let segments = segment_text(text, 12);
        assert_eq!(segments, vec!["第一句话。 第二句话！", "第三句话？ 第四句话；"]);
    }

    #[test]
    fn test_unsplittable_token_hard_split() {
        let text = "x".repeat(25);
        let segments = segment_text(&text, 10);
        assert_eq!(segments, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    #[test]
    fn test_hard_split_counts_characters_not_bytes() {
        let text = "界".repeat(7);
        let segments = segment_text(&text, 3);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.chars().count() <= 3));
    }

    #[test]
    fn test_every_segment_within_limit_and_content_preserved() {
        let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let text = format!("{paragraph}\n\n{}\n{paragraph}", "y".repeat(300));

        for limit in [7, 50, 120, 499] {
            let segments = segment_text(&text, limit);
            assert!(segments.iter().all(|s| s.chars().count() <= limit));
            assert_eq!(strip_ws(&segments.concat()), strip_ws(&text));
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta. Gamma delta. ".repeat(30);
        assert_eq!(segment_text(&text, 40), segment_text(&text, 40));
    }
}
