//! Incremental `text/event-stream` decoder.

use tracing::warn;

use crate::dto::sse::ServerEvent;

/// Longest line kept in memory; longer lines drop their whole frame.
pub const MAX_LINE_BYTES: usize = 256 * 1024;

/// Turns arbitrary byte chunks into complete event-stream frames.
///
/// Lines may be split across chunks (including inside a UTF-8 sequence); only
/// complete lines are interpreted. `\r\n`, `\n` and a lone `\r` all end a line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    /// Last byte seen was `\r`; a following `\n` belongs to the same terminator.
    after_cr: bool,
    /// The current line overflowed and is being skipped.
    overflow: bool,
    /// The current frame lost a line and must not be dispatched.
    drop_frame: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        let mut frames = Vec::new();
        let mut start = 0;
        for (index, &byte) in chunk.iter().enumerate() {
            match byte {
                b'\n' if self.after_cr => {
                    self.after_cr = false;
                    start = index + 1;
                }
                b'\r' | b'\n' => {
                    self.after_cr = byte == b'\r';
                    self.append(&chunk[start..index]);
                    if let Some(frame) = self.finish_line() {
                        frames.push(frame);
                    }
                    start = index + 1;
                }
                _ => self.after_cr = false,
            }
        }
        self.append(&chunk[start..]);
        frames
    }

    fn append(&mut self, bytes: &[u8]) {
        if self.overflow || bytes.is_empty() {
            return;
        }
        if self.pending.len() + bytes.len() > MAX_LINE_BYTES {
            warn!(limit = MAX_LINE_BYTES, "event stream line too long; dropping frame");
            self.pending = Vec::new();
            self.overflow = true;
            self.drop_frame = true;
            return;
        }
        self.pending.extend_from_slice(bytes);
    }

    fn finish_line(&mut self) -> Option<ServerEvent> {
        if self.overflow {
            self.overflow = false;
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&line);
        self.process_line(&line)
    }

    fn process_line(&mut self, line: &str) -> Option<ServerEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // `id` and `retry` carry no meaning for this client.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        let event = self.event.take();
        if std::mem::take(&mut self.drop_frame) {
            self.data.clear();
            return None;
        }
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(ServerEvent::new(event, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: presence_update\ndata: {\"court_id\":3}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("presence_update"));
        assert_eq!(frames[0].data, "{\"court_id\":3}");
    }

    #[test]
    fn reassembles_frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: new_mes").is_empty());
        assert!(decoder.push(b"sage\r\ndata: {\"id\"").is_empty());
        let frames = decoder.push(b":42}\r\n\r\nevent: notification_update\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("new_message"));
        assert_eq!(frames[0].data, "{\"id\":42}");
        assert_eq!(frames[1].event.as_deref(), Some("notification_update"));
        assert_eq!(frames[1].data, "");
    }

    #[test]
    fn joins_multiline_data_and_skips_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\n\ndata: first\ndata: second\nid: 7\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn keeps_utf8_split_inside_a_character() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: café\n\n".as_bytes();
        let split = bytes.len() - 3;
        assert!(decoder.push(&bytes[..split]).is_empty());
        let frames = decoder.push(&bytes[split..]);
        assert_eq!(frames[0].data, "café");
    }

    #[test]
    fn lone_carriage_returns_end_lines() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: ranked_update\rdata: {}\r\rdata: x\r");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("ranked_update"));
        assert_eq!(frames[0].data, "{}");

        // A CRLF split between chunks is a single terminator.
        assert_eq!(decoder.push(b"\r").len(), 1);
        assert!(decoder.push(b"\n").is_empty());
    }

    #[test]
    fn oversized_line_drops_its_frame_only() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: new_message\ndata: ").is_empty());
        let filler = vec![b'a'; MAX_LINE_BYTES];
        assert!(decoder.push(&filler).is_empty());
        assert!(decoder.push(&filler).is_empty());
        assert!(decoder.pending.is_empty());

        let frames = decoder.push(b"\n\nevent: notification_update\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("notification_update"));
    }
}
