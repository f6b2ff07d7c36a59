//! Server-Sent Events decoder.
//!
//! [`SseDecoder`] is a push-based state machine: feed it body chunks as they
//! arrive and it returns the events completed by each chunk. It buffers raw
//! bytes, so a line (or a multi-byte UTF-8 sequence) split across chunks
//! decodes exactly as if it had arrived whole.

use crate::error::{ErrorContext, LlmError};
use crate::execution::http::transport::TransportError;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// `event:` field of the block, if any.
    pub event: Option<String>,
    /// `data:` lines of the block joined with `\n`.
    pub data: String,
    /// `id:` field of the block, if any.
    pub id: Option<String>,
    /// `retry:` field of the block in milliseconds, if it was a valid integer.
    pub retry: Option<u64>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    // A `\r` ended the previous line; a directly following `\n` belongs to it.
    skip_lf: bool,
    seen_first_line: bool,
    data: Option<String>,
    event: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk and return the events it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut out = Vec::new();
        let mut rest = chunk;

        if self.skip_lf && !rest.is_empty() {
            self.skip_lf = false;
            if rest[0] == b'\n' {
                rest = &rest[1..];
            }
        }

        while let Some(pos) = rest.iter().position(|b| *b == b'\n' || *b == b'\r') {
            self.line.extend_from_slice(&rest[..pos]);
            let terminator = rest[pos];
            rest = &rest[pos + 1..];
            self.end_line(&mut out);

            if terminator == b'\r' {
                match rest.first() {
                    Some(b'\n') => rest = &rest[1..],
                    Some(_) => {}
                    None => self.skip_lf = true,
                }
            }
        }
        self.line.extend_from_slice(rest);
        out
    }

    /// End of input: flush a trailing unterminated line and any pending event.
    pub fn finish(mut self) -> Option<SseEvent> {
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.process_line(&line);
        }
        self.take_event()
    }

    fn end_line(&mut self, out: &mut Vec<SseEvent>) {
        let line = std::mem::take(&mut self.line);
        if line.is_empty() {
            out.extend(self.take_event());
        } else {
            self.process_line(&line);
        }
    }

    fn process_line(&mut self, raw: &[u8]) {
        let decoded = String::from_utf8_lossy(raw);
        let mut line: &str = &decoded;
        if !self.seen_first_line {
            self.seen_first_line = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                self.retry = value.parse().ok();
            }
            _ => {}
        }
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        let retry = self.retry.take();
        let data = self.data.take()?;
        Some(SseEvent {
            event,
            data,
            id,
            retry,
        })
    }
}

/// Decode a byte stream into SSE events.
///
/// A body error ends the stream with that error normalized to the taxonomy.
pub fn decode_sse_stream<S, B, E>(
    byte_stream: S,
    context: ErrorContext,
) -> BoxStream<'static, Result<SseEvent, LlmError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TransportError> + Send + 'static,
{
    let out = async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut bytes = Box::pin(byte_stream);
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for event in decoder.feed(chunk.as_ref()) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(LlmError::from_transport(&context, e.into()));
                    return;
                }
            }
        }
        if let Some(event) = decoder.finish() {
            yield Ok(event);
        }
    };
    Box::pin(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.feed(chunk));
        }
        out.extend(decoder.finish());
        out
    }

    fn data(events: &[SseEvent]) -> Vec<&str> {
        events.iter().map(|e| e.data.as_str()).collect()
    }

    #[test]
    fn splits_events_on_blank_lines() {
        let events = decode(&[b"data: a\n\ndata: b\n\n"]);
        assert_eq!(data(&events), ["a", "b"]);
    }

    #[test]
    fn joins_multiline_data() {
        let events = decode(&[b"data: line1\ndata: line2\ndata\n\n"]);
        assert_eq!(data(&events), ["line1\nline2\n"]);
    }

    #[test]
    fn accepts_every_line_ending() {
        let lf = decode(&[b"event: x\ndata: 1\n\n"]);
        let crlf = decode(&[b"event: x\r\ndata: 1\r\n\r\n"]);
        let cr = decode(&[b"event: x\rdata: 1\r\r"]);
        assert_eq!(lf, crlf);
        assert_eq!(lf, cr);
        assert_eq!(lf[0].event.as_deref(), Some("x"));
    }

    #[test]
    fn crlf_split_across_chunks_is_one_terminator() {
        let events = decode(&[b"data: a\r", b"\ndata: b\r", b"\n\r", b"\n"]);
        assert_eq!(data(&events), ["a\nb"]);
    }

    #[test]
    fn utf8_split_across_chunks() {
        let bytes = "data: héllo\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let events = decode(&[&bytes[..split], &bytes[split..]]);
        assert_eq!(data(&events), ["héllo"]);
    }

    #[test]
    fn ignores_comments_unknown_fields_and_dataless_blocks() {
        let events = decode(&[b": ping\n\nfoo: bar\nevent: only\n\nid: 7\ndata: x\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].event, None, "event field does not leak into the next block");
    }

    #[test]
    fn strips_only_one_space_after_colon() {
        let events = decode(&[b"data:no-space\n\ndata:  two\n\n"]);
        assert_eq!(data(&events), ["no-space", " two"]);
    }

    #[test]
    fn retry_field_must_be_digits() {
        let events = decode(&[b"retry: 1500\ndata: a\n\nretry: soon\ndata: b\n\n"]);
        assert_eq!(events[0].retry, Some(1500));
        assert_eq!(events[1].retry, None);
    }

    #[test]
    fn finish_flushes_unterminated_trailing_event() {
        let events = decode(&[b"data: a\n\ndata: {\"tail\":", b"true}"]);
        assert_eq!(data(&events), ["a", "{\"tail\":true}"]);
    }

    #[test]
    fn leading_bom_is_dropped() {
        let events = decode(&[b"\xEF\xBB\xBFdata: x\n\n"]);
        assert_eq!(data(&events), ["x"]);
    }

    #[tokio::test]
    async fn stream_adapter_surfaces_body_errors() {
        use crate::error::Modality;
        let chunks: Vec<Result<&'static [u8], std::io::Error>> = vec![
            Ok(&b"data: 1\n\n"[..]),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(&b"data: 2\n\n"[..]),
        ];
        let ctx = ErrorContext::new("test", Modality::Chat);
        let out: Vec<_> = decode_sse_stream(futures_util::stream::iter(chunks), ctx)
            .collect()
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().data, "1");
        assert!(matches!(out[1], Err(LlmError::NetworkError { .. })));
    }
}
