//! Splits inline `<think>...</think>` blocks out of answer text.
//!
//! Reasoning models served without a reasoning parser emit their chain of
//! thought inside the regular content channel. Some wrap it in both tags;
//! chat templates that pre-fill `<think>` leave only the closing tag in the
//! output. Until the first tag shows up, content is held back: a `</think>`
//! turns everything before it into thinking, a `<think>` or the end of the
//! stream turns it into answer text.
//!
//! Tags may be cut anywhere by chunking, so a possible tag prefix at the end
//! of a chunk is held back until the next chunk decides it.

use super::Fragment;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    /// No tag seen yet
    #[default]
    Undecided,
    Think,
    Answer,
}

/// Incremental router of content text into thinking/answer fragments
#[derive(Debug, Default)]
pub struct ThinkTagSplitter {
    mode: Mode,
    pending: String,
}

impl ThinkTagSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The server routes reasoning to its own channel, so content is answer
    /// text from here on unless tagged.
    pub fn reasoning_channel_seen(&mut self) -> Vec<Fragment> {
        if self.mode != Mode::Undecided {
            return Vec::new();
        }
        self.mode = Mode::Answer;
        self.push("")
    }

    /// Feed one chunk of content, returning the fragments it completes
    pub fn push(&mut self, chunk: &str) -> Vec<Fragment> {
        let mut out = Vec::new();
        let mut buf = std::mem::take(&mut self.pending);
        buf.push_str(chunk);

        loop {
            match self.mode {
                Mode::Undecided => match first_tag(&buf, &[OPEN_TAG, CLOSE_TAG]) {
                    Some((pos, OPEN_TAG)) => {
                        push_fragment(&mut out, false, &buf[..pos]);
                        buf.drain(..pos + OPEN_TAG.len());
                        self.mode = Mode::Think;
                    }
                    Some((pos, _)) => {
                        push_fragment(&mut out, true, &buf[..pos]);
                        buf.drain(..pos + CLOSE_TAG.len());
                        self.mode = Mode::Answer;
                    }
                    None => {
                        self.pending = buf;
                        break;
                    }
                },
                Mode::Think => match first_tag(&buf, &[CLOSE_TAG]) {
                    Some((pos, _)) => {
                        push_fragment(&mut out, true, &buf[..pos]);
                        buf.drain(..pos + CLOSE_TAG.len());
                        self.mode = Mode::Answer;
                    }
                    None => {
                        self.hold_tail(buf, &[CLOSE_TAG], true, &mut out);
                        break;
                    }
                },
                Mode::Answer => match first_tag(&buf, &[OPEN_TAG, CLOSE_TAG]) {
                    Some((pos, OPEN_TAG)) => {
                        push_fragment(&mut out, false, &buf[..pos]);
                        buf.drain(..pos + OPEN_TAG.len());
                        self.mode = Mode::Think;
                    }
                    // A stray close tag: what precedes it in this buffer was reasoning
                    Some((pos, _)) => {
                        push_fragment(&mut out, true, &buf[..pos]);
                        buf.drain(..pos + CLOSE_TAG.len());
                    }
                    None => {
                        self.hold_tail(buf, &[OPEN_TAG, CLOSE_TAG], false, &mut out);
                        break;
                    }
                },
            }
        }

        out
    }

    /// Flush held-back text at end of stream
    pub fn finish(&mut self) -> Vec<Fragment> {
        let mut out = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        push_fragment(&mut out, self.mode == Mode::Think, &rest);
        out
    }

    /// Emit `buf` except a trailing partial tag, which stays pending
    fn hold_tail(&mut self, buf: String, tags: &[&str], thinking: bool, out: &mut Vec<Fragment>) {
        let held = tags
            .iter()
            .map(|tag| partial_tag_suffix(&buf, tag))
            .max()
            .unwrap_or(0);
        let cut = buf.len() - held;
        push_fragment(out, thinking, &buf[..cut]);
        self.pending = buf[cut..].to_string();
    }
}

fn push_fragment(out: &mut Vec<Fragment>, thinking: bool, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push(if thinking {
        Fragment::Thinking(text.to_string())
    } else {
        Fragment::Answer(text.to_string())
    });
}

/// Earliest occurrence of any of `tags` in `buf`
fn first_tag(buf: &str, tags: &[&'static str]) -> Option<(usize, &'static str)> {
    tags.iter()
        .filter_map(|&tag| buf.find(tag).map(|pos| (pos, tag)))
        .min_by_key(|&(pos, _)| pos)
}

/// Length of the longest proper prefix of `tag` that `buf` ends with.
/// Tags are ASCII, so the split point is always a char boundary.
fn partial_tag_suffix(buf: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&k| buf.ends_with(&tag[..k]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunks: &[&str]) -> Vec<Fragment> {
        let mut splitter = ThinkTagSplitter::new();
        let mut out: Vec<Fragment> = chunks.iter().flat_map(|c| splitter.push(c)).collect();
        out.extend(splitter.finish());
        out
    }

    fn channels(out: &[Fragment]) -> (String, String) {
        let mut thinking = String::new();
        let mut answer = String::new();
        for fragment in out {
            match fragment {
                Fragment::Thinking(text) => thinking.push_str(text),
                Fragment::Answer(text) => answer.push_str(text),
            }
        }
        (thinking, answer)
    }

    #[test]
    fn test_untagged_answer_is_released_at_end() {
        let mut splitter = ThinkTagSplitter::new();
        assert!(splitter.push("{\"action\":").is_empty());
        assert!(splitter.push(" \"hold\"}").is_empty());
        assert_eq!(
            splitter.finish(),
            vec![Fragment::Answer("{\"action\": \"hold\"}".to_string())]
        );
    }

    #[test]
    fn test_reasoning_channel_releases_content_live() {
        let mut splitter = ThinkTagSplitter::new();
        assert!(splitter.push("{\"action\":").is_empty());
        assert_eq!(
            splitter.reasoning_channel_seen(),
            vec![Fragment::Answer("{\"action\":".to_string())]
        );
        assert_eq!(
            splitter.push(" \"hold\"}"),
            vec![Fragment::Answer(" \"hold\"}".to_string())]
        );
        assert!(splitter.finish().is_empty());
    }

    #[test]
    fn test_close_tag_without_open_tag() {
        let out = collect(&[
            "Format must be {\"action\": ...}. Echo is idle.</think>{\"action\":\"hold\",\"reasoning\":\"ok\"}",
        ]);
        assert_eq!(
            out,
            vec![
                Fragment::Thinking("Format must be {\"action\": ...}. Echo is idle.".to_string()),
                Fragment::Answer("{\"action\":\"hold\",\"reasoning\":\"ok\"}".to_string()),
            ]
        );

        let (_, answer) = channels(&out);
        let decision = crate::dispatch::parse_decision(&answer).unwrap();
        assert_eq!(decision.action, crate::dispatch::DecisionAction::Hold);
    }

    #[test]
    fn test_close_tag_without_open_tag_across_chunks() {
        let out = collect(&[
            "Format must be {\"action\": ...}.",
            " Echo is idle.</th",
            "ink>\n{\"action\":\"hold\",",
            "\"reasoning\":\"ok\"}",
        ]);
        let (thinking, answer) = channels(&out);
        assert_eq!(thinking, "Format must be {\"action\": ...}. Echo is idle.");
        assert_eq!(answer, "\n{\"action\":\"hold\",\"reasoning\":\"ok\"}");
        assert!(crate::dispatch::parse_decision(&answer).is_some());
    }

    #[test]
    fn test_think_block_in_one_chunk() {
        assert_eq!(
            collect(&["<think>flood is wide</think>{}"]),
            vec![
                Fragment::Thinking("flood is wide".to_string()),
                Fragment::Answer("{}".to_string()),
            ]
        );
    }

    #[test]
    fn test_tags_split_across_chunks() {
        let out = collect(&["<thi", "nk>route blocked</th", "ink>{\"action\"", ":\"hold\"}"]);
        let (thinking, answer) = channels(&out);
        assert_eq!(thinking, "route blocked");
        assert_eq!(answer, "{\"action\":\"hold\"}");
    }

    #[test]
    fn test_lone_angle_bracket_is_flushed() {
        assert_eq!(
            collect(&["coverage <", " 15%"]),
            vec![Fragment::Answer("coverage < 15%".to_string())]
        );
    }

    #[test]
    fn test_lone_angle_bracket_after_think_block() {
        let out = collect(&["<think>x</think>coverage <", " 15%"]);
        assert_eq!(
            out,
            vec![
                Fragment::Thinking("x".to_string()),
                Fragment::Answer("coverage ".to_string()),
                Fragment::Answer("< 15%".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_think_stays_thinking() {
        assert_eq!(
            collect(&["<think>still going"]),
            vec![Fragment::Thinking("still going".to_string())]
        );
    }
}
