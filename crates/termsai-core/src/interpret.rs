//! Interpretation of individual stream frames.

use tracing::debug;

use crate::error::{Result, TermsError};
use crate::types::{GraphPayload, StreamEvent};

/// Marker the backend injects when moderation halts a generation.
pub const FILTER_SENTINEL: &str = "[[CONTENT_FILTERED]]";

/// How to treat frames that are not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Skip unparseable frames; they are usually chunking artifacts.
    #[default]
    Tolerant,
    /// Every frame must parse.
    Strict,
}

/// What a single frame asks the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Progress {
        progress: Option<f64>,
        message: Option<String>,
    },
    Complete {
        progress: Option<f64>,
        message: Option<String>,
        payload: Box<GraphPayload>,
    },
    /// Tolerated parse failure.
    Skipped,
}

impl Interpretation {
    pub fn is_complete(&self) -> bool {
        matches!(self, Interpretation::Complete { .. })
    }
}

/// Does this raw text carry the moderation marker?
pub fn contains_sentinel(text: &str) -> bool {
    text.contains(FILTER_SENTINEL)
}

/// Interpret one cleaned frame.
///
/// The sentinel wins over everything else, including frames that happen to
/// parse as JSON.
pub fn interpret(frame: &str, mode: ParseMode) -> Result<Interpretation> {
    if contains_sentinel(frame) {
        return Err(TermsError::ContentFiltered);
    }

    let event: StreamEvent = match serde_json::from_str(frame) {
        Ok(event) => event,
        Err(e) => {
            return match mode {
                ParseMode::Tolerant => {
                    debug!(error = %e, frame = %frame, "Skipping unparseable frame");
                    Ok(Interpretation::Skipped)
                }
                ParseMode::Strict => Err(TermsError::MalformedFrame(format!("{e}: {frame}"))),
            };
        }
    };

    interpret_event(event)
}

/// Interpret an already decoded event.
pub fn interpret_event(event: StreamEvent) -> Result<Interpretation> {
    if event.is_error() {
        let message = event
            .message
            .or(event.error)
            .unwrap_or_else(|| "unknown server error".into());
        return Err(TermsError::ServerReported(message));
    }

    if event.is_complete() {
        if let Some(payload) = event.data {
            return Ok(Interpretation::Complete {
                progress: event.progress,
                message: event.message,
                payload: Box::new(payload),
            });
        }
    }

    Ok(Interpretation::Progress {
        progress: event.progress,
        message: event.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GraphId;

    const COMPLETE: &str = r#"{"status":"complete","progress":100,"message":"生成完成！","data":{"graph_id":"g1","network_data":{"nodes":[],"edges":[]}}}"#;

    #[test]
    fn progress_frame() {
        let result = interpret(
            r#"{"status":"generating_concepts","progress":20,"message":"正在初始化...\n接下来可能需要几分钟"}"#,
            ParseMode::Tolerant,
        )
        .unwrap();
        assert_eq!(
            result,
            Interpretation::Progress {
                progress: Some(20.0),
                message: Some("正在初始化...\n接下来可能需要几分钟".into()),
            }
        );
    }

    #[test]
    fn complete_frame_carries_payload() {
        match interpret(COMPLETE, ParseMode::Tolerant).unwrap() {
            Interpretation::Complete {
                payload, message, ..
            } => {
                assert_eq!(payload.graph_id, GraphId::Text("g1".into()));
                assert_eq!(message.as_deref(), Some("生成完成！"));
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn complete_without_payload_is_progress() {
        let result = interpret(r#"{"status":"complete","progress":100}"#, ParseMode::Strict).unwrap();
        assert!(matches!(result, Interpretation::Progress { .. }));
    }

    #[test]
    fn error_status_raises_server_error() {
        let err = interpret(
            r#"{"status":"error","message":"图谱ID 9 不存在"}"#,
            ParseMode::Tolerant,
        )
        .unwrap_err();
        assert!(matches!(err, TermsError::ServerReported(m) if m == "图谱ID 9 不存在"));
    }

    #[test]
    fn buffered_error_body_raises_server_error() {
        let err = interpret(r#"{"error":"缺少必要参数"}"#, ParseMode::Tolerant).unwrap_err();
        assert!(matches!(err, TermsError::ServerReported(m) if m == "缺少必要参数"));
    }

    #[test]
    fn tolerant_mode_skips_garbage() {
        let result = interpret(r#"{"status":"progr"#, ParseMode::Tolerant).unwrap();
        assert_eq!(result, Interpretation::Skipped);
    }

    #[test]
    fn strict_mode_rejects_garbage() {
        let err = interpret(r#"{"status":"progr"#, ParseMode::Strict).unwrap_err();
        assert!(matches!(err, TermsError::MalformedFrame(_)));
    }

    #[test]
    fn sentinel_in_raw_text_filters_in_both_modes() {
        for mode in [ParseMode::Tolerant, ParseMode::Strict] {
            let err = interpret("[[CONTENT_FILTERED]]", mode).unwrap_err();
            assert!(err.is_filtered());
        }
    }

    #[test]
    fn sentinel_inside_json_still_filters() {
        let err = interpret(
            r#"{"status":"generating_concepts_partial","message":"x[[CONTENT_FILTERED]]"}"#,
            ParseMode::Tolerant,
        )
        .unwrap_err();
        assert!(err.is_filtered());
    }
}
