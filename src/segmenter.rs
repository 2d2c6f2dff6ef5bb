//! Splits prepared narration text into bounded segments.
//!
//! Paragraphs (blank-line separated) stay whole when they fit the cap;
//! oversized paragraphs are re-split on sentence boundaries. No content is
//! ever dropped: a single sentence with no terminator that exceeds the cap
//! is emitted whole rather than truncated.

/// One bounded chunk of narration text, dispatched atomically to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub order: usize,
    pub text: String,
    pub approx_chars: usize,
}

/// Split narration text into ordered segments of at most `max_chars`
/// characters (soft bound, see module docs).
pub fn segment(text: &str, max_chars: usize) -> Vec<TextSegment> {
    let mut pieces: Vec<String> = Vec::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if paragraph.chars().count() <= max_chars {
            pieces.push(paragraph.to_string());
            continue;
        }

        let mut buffer = String::new();
        for sentence in split_sentences(paragraph) {
            if buffer.is_empty() {
                buffer = sentence;
                continue;
            }
            let joined_len = buffer.chars().count() + 1 + sentence.chars().count();
            if joined_len > max_chars {
                pieces.push(std::mem::take(&mut buffer));
                buffer = sentence;
            } else {
                buffer.push(' ');
                buffer.push_str(&sentence);
            }
        }
        if !buffer.is_empty() {
            pieces.push(buffer);
        }
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(order, text)| {
            let approx_chars = text.chars().count();
            TextSegment {
                order,
                text,
                approx_chars,
            }
        })
        .collect()
}

/// Split a paragraph into sentences at CJK and Latin terminators, keeping
/// the terminating punctuation with its sentence. A run of terminators
/// (e.g. "？！") counts as one boundary.
fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut at_boundary = false;

    for ch in paragraph.chars() {
        if is_terminator(ch) {
            current.push(ch);
            at_boundary = true;
            continue;
        }
        if at_boundary {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
            at_boundary = false;
        }
        current.push(ch);
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '。' | '！' | '？' | '.' | '!' | '?')
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collapse all whitespace, the normalization of the round-trip check.
    fn squash(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn short_paragraph_is_one_verbatim_segment() {
        let text = "诊断结果。\n\n病情分析：检测到早疫病。";
        let segments = segment(text, 300);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "诊断结果。");
        assert_eq!(segments[1].text, "病情分析：检测到早疫病。");
        assert_eq!(segments[0].order, 0);
        assert_eq!(segments[1].order, 1);
    }

    #[test]
    fn oversized_paragraph_splits_on_sentences() {
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let segments = segment(text, 45);
        assert!(segments.len() >= 2);
        for seg in &segments {
            assert!(seg.approx_chars <= 45, "segment over cap: {:?}", seg);
        }
        assert_eq!(squash(&segments.iter().map(|s| s.text.as_str()).collect::<String>()), squash(text));
    }

    #[test]
    fn no_content_lost_or_duplicated() {
        let text = "症状分析：叶片出现褐色斑点，边缘发黄！斑点逐渐扩大。严重时整株枯萎？\n\n\
                    治疗建议：及时摘除病叶。喷施代森锰锌。每隔七天一次。连续三次。";
        for cap in [10, 20, 40, 300] {
            let segments = segment(text, cap);
            let rejoined: String = segments.iter().map(|s| s.text.as_str()).collect();
            assert_eq!(squash(&rejoined), squash(text), "cap {cap}");
        }
    }

    #[test]
    fn terminator_free_oversized_sentence_kept_whole() {
        let long = "一".repeat(400);
        let segments = segment(&long, 300);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].approx_chars, 400);
    }

    #[test]
    fn terminator_runs_are_one_boundary() {
        let sentences = split_sentences("真的吗？！不可能。好吧");
        assert_eq!(sentences, vec!["真的吗？！", "不可能。", "好吧"]);
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(segment("", 300).is_empty());
        assert!(segment("\n\n  \n\n", 300).is_empty());
    }

    #[test]
    fn mixed_cjk_latin_terminators() {
        let text = format!("{}。{}. {}！", "甲".repeat(30), "b".repeat(30), "丙".repeat(30));
        let segments = segment(&text, 40);
        assert_eq!(segments.len(), 3);
        assert!(segments[0].text.ends_with('。'));
        assert!(segments[1].text.ends_with('.'));
        assert!(segments[2].text.ends_with('！'));
    }
}
