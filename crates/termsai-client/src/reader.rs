//! Turn a response body into a cancellable sequence of interpretations.

use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use termsai_core::error::{Result, TermsError};
use termsai_core::frame::{split_all, FrameSplitter};
use termsai_core::interpret::{interpret, Interpretation, ParseMode};

use crate::backend::{ByteStream, ResponseBody};
use crate::decode::Utf8Decoder;

pub type InterpretationStream = Pin<Box<dyn Stream<Item = Result<Interpretation>> + Send>>;

enum Step {
    Cancelled,
    Chunk(Result<Bytes>),
    End,
}

/// Interpret every frame of `body`.
///
/// Tolerated parse failures are filtered out. The stream ends after yielding
/// the first error, which includes `Aborted` once `token` is cancelled and
/// `ContentFiltered` when the sentinel shows up; either way the underlying
/// body is dropped at that point.
///
/// Buffered bodies are always parsed strictly, since they cannot contain
/// partial frames.
pub fn interpretations(
    body: ResponseBody,
    mode: ParseMode,
    token: CancellationToken,
) -> InterpretationStream {
    match body {
        ResponseBody::Stream(bytes) => Box::pin(streamed(bytes, mode, token)),
        ResponseBody::Buffered(text) => Box::pin(buffered(text, token)),
    }
}

fn streamed(
    mut bytes: ByteStream,
    mode: ParseMode,
    token: CancellationToken,
) -> impl Stream<Item = Result<Interpretation>> + Send {
    async_stream::stream! {
        let mut decoder = Utf8Decoder::new();
        let mut splitter = FrameSplitter::new();

        loop {
            let step = tokio::select! {
                biased;
                _ = token.cancelled() => Step::Cancelled,
                next = bytes.next() => match next {
                    Some(chunk) => Step::Chunk(chunk),
                    None => Step::End,
                },
            };

            match step {
                Step::Cancelled => {
                    debug!("stream read cancelled");
                    yield Err(TermsError::Aborted);
                    return;
                }
                Step::Chunk(Err(e)) => {
                    yield Err(e);
                    return;
                }
                Step::Chunk(Ok(chunk)) => {
                    let text = decoder.decode(&chunk);
                    for frame in splitter.push(&text) {
                        match interpret(&frame, mode) {
                            Ok(Interpretation::Skipped) => {}
                            Ok(item) => {
                                yield Ok(item);
                            }
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }
                Step::End => break,
            }
        }

        // Whatever the mode, an unterminated remainder is parsed tolerantly.
        let tail = decoder.finish();
        let mut frames = splitter.push(&tail);
        frames.extend(splitter.finish());
        for frame in frames {
            match interpret(&frame, ParseMode::Tolerant) {
                Ok(Interpretation::Skipped) => {}
                Ok(item) => {
                    yield Ok(item);
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    }
}

fn buffered(text: String, token: CancellationToken) -> impl Stream<Item = Result<Interpretation>> + Send {
    let mut items = Vec::new();
    for frame in split_all(&text) {
        match interpret(&frame, ParseMode::Strict) {
            Ok(Interpretation::Skipped) => {}
            Ok(item) => items.push(Ok(item)),
            Err(e) => {
                items.push(Err(e));
                break;
            }
        }
    }
    if token.is_cancelled() {
        items = vec![Err(TermsError::Aborted)];
    }
    stream::iter(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn chunks(parts: &[&str]) -> ResponseBody {
        let parts: Vec<Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        ResponseBody::Stream(Box::pin(stream::iter(parts)))
    }

    async fn collect(body: ResponseBody, mode: ParseMode) -> Vec<Result<Interpretation>> {
        interpretations(body, mode, CancellationToken::new()).collect().await
    }

    const COMPLETE: &str = r#"{"status":"complete","data":{"graph_id":"g1","network_data":{"nodes":[],"edges":[]}}}"#;

    #[tokio::test]
    async fn progress_then_complete() {
        let complete = format!("data: {COMPLETE}\n\n");
        let body = chunks(&[
            "data: {\"status\":\"generating\",\"progress\":10,\"message\":\"正在生成\"}\n\n",
            complete.as_str(),
        ]);
        let items = collect(body, ParseMode::Tolerant).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Ok(Interpretation::Progress { progress: Some(p), .. }) if *p == 10.0));
        assert!(items[1].as_ref().unwrap().is_complete());
    }

    #[tokio::test]
    async fn multibyte_split_across_chunks() {
        let text = "data: {\"progress\":1,\"message\":\"概念\"}\n\n";
        let bytes = text.as_bytes();
        let cut = text.find('概').unwrap() + 1;
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..cut])),
            Ok(Bytes::copy_from_slice(&bytes[cut..])),
        ];
        let body = ResponseBody::Stream(Box::pin(stream::iter(parts)));
        let items = collect(body, ParseMode::Strict).await;
        match &items[0] {
            Ok(Interpretation::Progress { message, .. }) => {
                assert_eq!(message.as_deref(), Some("概念"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn sentinel_ends_the_stream() {
        let complete = format!("data: {COMPLETE}\n\n");
        let body = chunks(&[
            "data: {\"progress\":5}\n\n",
            "data: [[CONTENT_FILTERED]]\n\n",
            complete.as_str(),
        ]);
        let items = collect(body, ParseMode::Tolerant).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(TermsError::ContentFiltered)));
    }

    #[tokio::test]
    async fn tolerant_skips_garbage_strict_fails() {
        let complete = format!("data: {COMPLETE}\n\n");
        let parts = ["data: not json\n\n", complete.as_str()];
        let tolerant = collect(chunks(&parts), ParseMode::Tolerant).await;
        assert_eq!(tolerant.len(), 1);
        assert!(tolerant[0].as_ref().unwrap().is_complete());

        let strict = collect(chunks(&parts), ParseMode::Strict).await;
        assert_eq!(strict.len(), 1);
        assert!(matches!(strict[0], Err(TermsError::MalformedFrame(_))));
    }

    #[tokio::test]
    async fn unterminated_tail_is_flushed() {
        let unterminated = format!("data: {COMPLETE}");
        let body = chunks(&[unterminated.as_str()]);
        let items = collect(body, ParseMode::Tolerant).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap().is_complete());
    }

    #[tokio::test]
    async fn transport_error_is_yielded_once() {
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"progress\":5}\n\n")),
            Err(TermsError::Network("reset".into())),
            Ok(Bytes::from_static(b"data: {\"progress\":6}\n\n")),
        ];
        let body = ResponseBody::Stream(Box::pin(stream::iter(parts)));
        let items = collect(body, ParseMode::Tolerant).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(TermsError::Network(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_stalled_read() {
        let token = CancellationToken::new();
        let head = stream::iter(vec![Ok(Bytes::from_static(b"data: {\"progress\":5}\n\n"))]);
        let body = ResponseBody::Stream(Box::pin(head.chain(stream::pending())));
        let mut items = interpretations(body, ParseMode::Tolerant, token.clone());

        assert!(items.next().await.unwrap().is_ok());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        assert!(matches!(items.next().await, Some(Err(TermsError::Aborted))));
        assert!(items.next().await.is_none());
    }

    #[tokio::test]
    async fn buffered_json_body() {
        let items = collect(ResponseBody::Buffered(COMPLETE.into()), ParseMode::Tolerant).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap().is_complete());
    }

    #[tokio::test]
    async fn buffered_sse_body_with_error_event() {
        let text = "data: {\"progress\":5}\n\ndata: {\"status\":\"error\",\"message\":\"boom\"}\n\n";
        let items = collect(ResponseBody::Buffered(text.into()), ParseMode::Tolerant).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], Err(TermsError::ServerReported(m)) if m == "boom"));
    }

    #[tokio::test]
    async fn buffered_body_is_parsed_strictly() {
        let items = collect(ResponseBody::Buffered("<html>".into()), ParseMode::Tolerant).await;
        assert!(matches!(items[0], Err(TermsError::MalformedFrame(_))));
    }
}
