//! Caller-facing event sink so capture results reach the embedding code.
//!
//! The pipeline reports through this seam instead of calling the embedder
//! directly: exactly one `on_valid` per successful capture, `on_invalid` for
//! manual-capture rejections and acquisition errors, `on_retake` when the
//! user discards a capture, and `on_status` for status-line updates.

use crate::still::StillImage;
use serde::Serialize;
use std::io::Write;
use tracing::debug;

/// Callbacks invoked by the capture pipeline.
pub trait EventSink {
    fn on_valid(&mut self, image: &StillImage);
    fn on_invalid(&mut self, message: &str);
    fn on_retake(&mut self);
    fn on_status(&mut self, message: &str);
}

/// Wire form of pipeline events for line-oriented consumers.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventRecord<'a> {
    Valid { data_url: &'a str, jpeg_bytes: usize },
    Invalid { message: &'a str },
    Retake,
    Status { message: &'a str },
}

/// Serializes events as JSON lines to a writer. Used by the driver binary
/// with stdout so an embedding process can consume captures over a pipe.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn emit(&mut self, record: &EventRecord<'_>) {
        match serde_json::to_string(record) {
            Ok(json) => {
                if let Err(err) = writeln!(self.writer, "{json}") {
                    debug!("event sink write failed: {err}");
                    return;
                }
                if let Err(err) = self.writer.flush() {
                    debug!("event sink flush failed: {err}");
                }
            }
            Err(err) => debug!("event serialization failed: {err}"),
        }
    }
}

impl<W: Write> EventSink for JsonlSink<W> {
    fn on_valid(&mut self, image: &StillImage) {
        self.emit(&EventRecord::Valid {
            data_url: &image.data_url,
            jpeg_bytes: image.jpeg.len(),
        });
    }

    fn on_invalid(&mut self, message: &str) {
        self.emit(&EventRecord::Invalid { message });
    }

    fn on_retake(&mut self) {
        self.emit(&EventRecord::Retake);
    }

    fn on_status(&mut self, message: &str) {
        self.emit(&EventRecord::Status { message });
    }
}

/// In-memory event log for embedders and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Valid(StillImage),
    Invalid(String),
    Retake,
    Status(String),
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<RecordedEvent>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, RecordedEvent::Valid(_)))
            .count()
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Status(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn on_valid(&mut self, image: &StillImage) {
        self.events.push(RecordedEvent::Valid(image.clone()));
    }

    fn on_invalid(&mut self, message: &str) {
        self.events.push(RecordedEvent::Invalid(message.to_string()));
    }

    fn on_retake(&mut self) {
        self.events.push(RecordedEvent::Retake);
    }

    fn on_status(&mut self, message: &str) {
        self.events.push(RecordedEvent::Status(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> StillImage {
        StillImage {
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            data_url: "data:image/jpeg;base64,/9j/2Q==".to_string(),
        }
    }

    #[test]
    fn jsonl_sink_writes_one_line_per_event() {
        let mut buffer = Vec::new();
        {
            let mut sink = JsonlSink::new(&mut buffer);
            sink.on_status("hold still");
            sink.on_valid(&sample_image());
            sink.on_retake();
            sink.on_invalid("hand not detected");
        }
        let text = String::from_utf8(buffer).expect("utf8 output");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains(r#""event":"status""#));
        assert!(lines[1].contains(r#""event":"valid""#));
        assert!(lines[1].contains(r#""jpeg_bytes":4"#));
        assert!(lines[2].contains(r#""event":"retake""#));
        assert!(lines[3].contains(r#""event":"invalid""#));
        for line in lines {
            serde_json::from_str::<serde_json::Value>(line).expect("valid json line");
        }
    }

    #[test]
    fn memory_sink_counts_valid_captures() {
        let mut sink = MemorySink::new();
        sink.on_status("a");
        sink.on_valid(&sample_image());
        sink.on_status("b");
        assert_eq!(sink.valid_count(), 1);
        assert_eq!(sink.statuses(), vec!["a", "b"]);
    }
}
