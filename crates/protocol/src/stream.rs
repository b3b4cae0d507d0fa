use serde::{Deserialize, Serialize};

/// One message of the live event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamMessage {
    /// A serialized [`TraceEvent`](crate::TraceEvent), still undecoded.
    Event(String),
    /// Terminal signal: no more events will arrive.
    Finish,
    /// The producer reported a failure. Treated like `Finish` by consumers.
    Error(String),
}

/// Line-oriented decoder for the tracer's Server-Sent Events stream.
///
/// Frames are `data:<json>`, a terminal `event:fin`, and `error:<message>`,
/// each closed by a blank line. A bare line starting with `{` outside a
/// frame is taken as a newline-delimited JSON event, so plain NDJSON dumps
/// decode too.
#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
    data: Vec<String>,
    error: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its newline). Returns a message when the line
    /// completes a frame.
    pub fn push_line(&mut self, line: &str) -> Option<StreamMessage> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with('{') && self.is_idle() {
            return Some(StreamMessage::Event(line.to_string()));
        }
        // SSE comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "error" => self.error = Some(value.to_string()),
            _ => {}
        }
        None
    }

    /// Flush a frame left open at end of input.
    pub fn finish(&mut self) -> Option<StreamMessage> {
        self.dispatch()
    }

    fn is_idle(&self) -> bool {
        self.event.is_none() && self.data.is_empty() && self.error.is_none()
    }

    fn dispatch(&mut self) -> Option<StreamMessage> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if let Some(message) = self.error.take() {
            return Some(StreamMessage::Error(message));
        }
        match event.as_deref() {
            Some("fin") => Some(StreamMessage::Finish),
            Some("error") => Some(StreamMessage::Error(data.join("\n"))),
            _ if data.is_empty() => None,
            _ => Some(StreamMessage::Event(data.join("\n"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> Vec<StreamMessage> {
        let mut decoder = SseDecoder::new();
        let mut out: Vec<StreamMessage> =
            input.lines().filter_map(|l| decoder.push_line(l)).collect();
        out.extend(decoder.finish());
        out
    }

    #[test]
    fn data_frames_and_terminal_signal() {
        let input = "data:{\"pid\":1,\"ts\":0}\n\ndata:{\"pid\":2,\"ts\":5}\n\nevent:fin\n\n";
        assert_eq!(
            decode(input),
            vec![
                StreamMessage::Event("{\"pid\":1,\"ts\":0}".into()),
                StreamMessage::Event("{\"pid\":2,\"ts\":5}".into()),
                StreamMessage::Finish,
            ]
        );
    }

    #[test]
    fn error_frame() {
        assert_eq!(
            decode("error:json: unsupported value\n\n"),
            vec![StreamMessage::Error("json: unsupported value".into())]
        );
    }

    #[test]
    fn ndjson_lines() {
        let input = "{\"pid\":1,\"ts\":0}\n{\"pid\":1,\"ts\":1}\n";
        assert_eq!(decode(input).len(), 2);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert!(decode(": keep-alive\n\n\n").is_empty());
    }

    #[test]
    fn unterminated_frame_flushes_at_end() {
        assert_eq!(
            decode("data: {\"pid\":1,\"ts\":0}"),
            vec![StreamMessage::Event("{\"pid\":1,\"ts\":0}".into())]
        );
    }

    #[test]
    fn crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push_line("event:fin\r"), None);
        assert_eq!(decoder.push_line("\r"), Some(StreamMessage::Finish));
    }
}
