//! Incremental frame splitting for generation streams.
//!
//! Backends terminate each JSON event with a blank line, but some proxies and
//! older endpoints only emit a single newline. The splitter prefers `\n\n`,
//! falls back to `\n`, and always keeps the trailing segment buffered because
//! a chunk boundary can land anywhere inside a frame.

const DOUBLE_NEWLINE: &str = "\n\n";
const NEWLINE: char = '\n';

/// Split `buffer` into complete segments and the unconsumed tail.
///
/// The returned segments are raw: they may be blank or carry SSE field names.
/// Use [`clean_frame`] before interpreting them.
pub fn split_frames(buffer: &str) -> (Vec<&str>, &str) {
    let mut segments: Vec<&str> = if buffer.contains(DOUBLE_NEWLINE) {
        buffer.split(DOUBLE_NEWLINE).collect()
    } else if buffer.contains(NEWLINE) {
        buffer.split(NEWLINE).collect()
    } else {
        return (Vec::new(), buffer);
    };
    let tail = segments.pop().unwrap_or("");
    (segments, tail)
}

/// Reduce one line of a segment to its payload text.
///
/// Returns `None` for blank lines, SSE comments (`:keepalive`) and non-data
/// fields (`event:`, `id:`, `retry:`).
pub fn clean_frame(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(data) = line.strip_prefix("data:") {
        let data = data.trim();
        return (!data.is_empty()).then_some(data);
    }
    if ["event:", "id:", "retry:"]
        .iter()
        .any(|field| line.starts_with(field))
    {
        return None;
    }
    Some(line)
}

fn frames_of(segment: &str, out: &mut Vec<String>) {
    // Payloads are single-line JSON, so every line of a segment stands alone.
    for line in segment.split(NEWLINE) {
        if let Some(frame) = clean_frame(line) {
            out.push(frame.to_string());
        }
    }
}

/// Accumulates decoded text and yields complete frames.
#[derive(Debug, Default, Clone)]
pub struct FrameSplitter {
    buffer: String,
    finished: bool,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let (segments, tail) = split_frames(&self.buffer);
        if segments.is_empty() {
            return Vec::new();
        }

        let mut frames = Vec::new();
        for segment in segments {
            frames_of(segment, &mut frames);
        }
        self.buffer = tail.to_string();
        frames
    }

    /// Flush whatever is left once the stream has ended.
    ///
    /// Only the first call returns anything.
    pub fn finish(&mut self) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let rest = std::mem::take(&mut self.buffer);
        let mut frames = Vec::new();
        frames_of(&rest, &mut frames);
        frames
    }

    /// Text received but not yet part of a complete frame.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

/// Split a whole body in one go, including the end-of-stream flush.
pub fn split_all(text: &str) -> Vec<String> {
    let mut splitter = FrameSplitter::new();
    let mut frames = splitter.push(text);
    frames.extend(splitter.finish());
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_prefers_double_newline() {
        let (segments, tail) = split_frames("a\nb\n\nc\n\nd");
        assert_eq!(segments, vec!["a\nb", "c"]);
        assert_eq!(tail, "d");
    }

    #[test]
    fn split_falls_back_to_single_newline() {
        let (segments, tail) = split_frames("a\nb\nc");
        assert_eq!(segments, vec!["a", "b"]);
        assert_eq!(tail, "c");
    }

    #[test]
    fn split_without_delimiter_keeps_everything() {
        let (segments, tail) = split_frames("{\"status\":");
        assert!(segments.is_empty());
        assert_eq!(tail, "{\"status\":");
    }

    #[test]
    fn trailing_delimiter_leaves_empty_tail() {
        let (segments, tail) = split_frames("x\n\n");
        assert_eq!(segments, vec!["x"]);
        assert_eq!(tail, "");
    }

    #[test]
    fn clean_frame_strips_data_prefix() {
        assert_eq!(clean_frame("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(clean_frame("data:{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(clean_frame("  {\"a\":1}  "), Some("{\"a\":1}"));
    }

    #[test]
    fn clean_frame_drops_fields_and_comments() {
        assert_eq!(clean_frame(""), None);
        assert_eq!(clean_frame("   "), None);
        assert_eq!(clean_frame(":keepalive"), None);
        assert_eq!(clean_frame("event: message"), None);
        assert_eq!(clean_frame("id: 3"), None);
        assert_eq!(clean_frame("retry: 1000"), None);
        assert_eq!(clean_frame("data:"), None);
    }

    #[test]
    fn push_rebuffers_partial_frame() {
        let mut s = FrameSplitter::new();
        assert!(s.push("data: {\"progress\":").is_empty());
        assert_eq!(s.pending(), "data: {\"progress\":");
        let frames = s.push("10}\n\ndata: {\"pro");
        assert_eq!(frames, vec!["{\"progress\":10}"]);
        assert_eq!(s.pending(), "data: {\"pro");
    }

    #[test]
    fn push_handles_single_newline_emitters() {
        let mut s = FrameSplitter::new();
        let frames = s.push("{\"a\":1}\n{\"b\":2}\n{\"c\"");
        assert_eq!(frames, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(s.pending(), "{\"c\"");
    }

    #[test]
    fn push_normalises_crlf_across_chunks() {
        let mut s = FrameSplitter::new();
        assert!(s.push("data: {\"a\":1}\r").is_empty());
        let mut frames = s.push("\n\r\ndata: {\"b\":2}\r\n\r\n");
        frames.extend(s.finish());
        assert_eq!(frames, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn finish_flushes_once() {
        let mut s = FrameSplitter::new();
        s.push("{\"status\":\"complete\"}");
        assert_eq!(s.finish(), vec!["{\"status\":\"complete\"}"]);
        assert!(s.finish().is_empty());
    }

    #[test]
    fn finish_with_whitespace_only_yields_nothing() {
        let mut s = FrameSplitter::new();
        s.push("x\n\n  \n");
        assert!(s.finish().is_empty());
    }

    #[test]
    fn multi_line_segment_yields_data_line_only() {
        let frames = split_all("event: progress\ndata: {\"p\":1}\n\n");
        assert_eq!(frames, vec!["{\"p\":1}"]);
    }

    #[test]
    fn split_all_handles_bare_json_body() {
        let frames = split_all("{\"data\":{\"graph_id\":1}}");
        assert_eq!(frames, vec!["{\"data\":{\"graph_id\":1}}"]);
    }
}
