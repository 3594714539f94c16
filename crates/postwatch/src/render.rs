//! Output collaborators: renderers for results and records, and the
//! user-facing alert sink.

use std::io::{self, Write};
use std::sync::Mutex;

use postwatch_protocol::Record;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ClientError, UserAction};

/// Maps results to visible output. Every call appends; nothing is replaced.
pub trait Renderer {
    /// One incremental result streamed during a live session.
    fn live_result(&self, content: &str);

    /// Final ordered prediction list.
    fn predictions(&self, predictions: &[String]);

    /// A single record (batch-process result).
    fn record(&self, record: &Record);

    /// A record listing, in retrieval order. Empty input renders nothing.
    fn records(&self, records: &[Record]) {
        for record in records {
            self.record(record);
        }
    }
}

/// Receives user-visible failure alerts.
pub trait Notifier {
    fn alert(&self, message: &str);

    /// Log a failed action and alert with that action's fixed message.
    fn report_failure(&self, action: UserAction, err: &ClientError) {
        warn!(code = err.error_code(), "{:?} failed: {}", action, err);
        self.alert(action.alert_for(err));
    }
}

/// Display label for the prediction at 0-based `index`.
pub fn format_prediction(index: usize, prediction: &str) -> String {
    format!("글 {}: {}", index + 1, prediction)
}

/// Human-readable block for one record, terminated by a separator line.
pub fn format_record(record: &Record) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n", record.title));
    out.push_str(&format!("작성자: {}\n", record.writer));
    out.push_str(&format!("작성일: {}\n", record.date));
    if !record.content.is_empty() {
        out.push_str(&record.content);
        out.push('\n');
    }
    out.push_str(&format!("태그: {}\n", record.tag_list().join(", ")));
    out.push_str(&format!("공감 수: {}\n", record.sympathy));
    out.push_str(&format!("URL: {}\n", record.post_url));
    let ad_images = record.ad_image_urls();
    if ad_images.is_empty() {
        out.push_str("광고 이미지: -\n");
    } else {
        out.push_str("광고 이미지:\n");
        for url in ad_images {
            out.push_str(&format!("  - {url}\n"));
        }
    }
    out.push_str(&format!("광고 감지 상태: {}\n", record.ad_status));
    out.push_str(&"-".repeat(40));
    out.push('\n');
    out
}

/// Plain-text renderer for terminals.
pub struct TerminalRenderer<W: Write> {
    out: Mutex<W>,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            debug!("Failed to write output: {}", e);
        }
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn live_result(&self, content: &str) {
        self.write(&format!("> {content}\n"));
    }

    fn predictions(&self, predictions: &[String]) {
        let mut text = String::new();
        for (index, prediction) in predictions.iter().enumerate() {
            text.push_str(&format_prediction(index, prediction));
            text.push('\n');
        }
        self.write(&text);
    }

    fn record(&self, record: &Record) {
        self.write(&format_record(record));
    }
}

/// Newline-delimited JSON renderer for `--json` output.
pub struct JsonRenderer<W: Write> {
    out: Mutex<W>,
}

impl JsonRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, value: serde_json::Value) {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(out, "{value}").and_then(|_| out.flush()) {
            debug!("Failed to write output: {}", e);
        }
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn live_result(&self, content: &str) {
        self.emit(json!({ "type": "crawl", "content": content }));
    }

    fn predictions(&self, predictions: &[String]) {
        self.emit(json!({ "predictions": predictions }));
    }

    fn record(&self, record: &Record) {
        self.emit(json!({ "record": record }));
    }

    fn records(&self, records: &[Record]) {
        self.emit(json!({ "records": records }));
    }
}

/// Prints alerts to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn alert(&self, message: &str) {
        let _ = writeln!(io::stderr(), "{message}");
    }
}

/// Records everything it is asked to render, for assertions.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct Recorder {
    pub(crate) live: Mutex<Vec<String>>,
    pub(crate) predictions: Mutex<Vec<String>>,
    pub(crate) prediction_calls: Mutex<usize>,
    pub(crate) records: Mutex<Vec<Record>>,
    pub(crate) alerts: Mutex<Vec<String>>,
}

#[cfg(test)]
impl Recorder {
    pub(crate) fn live(&self) -> Vec<String> {
        self.live.lock().unwrap().clone()
    }

    pub(crate) fn predictions(&self) -> Vec<String> {
        self.predictions.lock().unwrap().clone()
    }

    pub(crate) fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Renderer for Recorder {
    fn live_result(&self, content: &str) {
        self.live.lock().unwrap().push(content.to_string());
    }

    fn predictions(&self, predictions: &[String]) {
        *self.prediction_calls.lock().unwrap() += 1;
        self.predictions
            .lock()
            .unwrap()
            .extend(predictions.iter().cloned());
    }

    fn record(&self, record: &Record) {
        self.records.lock().unwrap().push(record.clone());
    }
}

#[cfg(test)]
impl Notifier for Recorder {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postwatch_protocol::AdStatus;

    fn sample_record() -> Record {
        Record {
            id: Some(1),
            title: "제목".into(),
            writer: "작성자A".into(),
            date: "2024. 5. 1.".into(),
            content: "본문 내용".into(),
            tags: "맛집, 카페".into(),
            sympathy: 7,
            post_url: "https://blog.example.com/p/1".into(),
            ad_images: "https://revu.example/a.png".into(),
            ad_status: AdStatus::Detected,
        }
    }

    #[test]
    fn test_report_failure_alerts_once_per_failure() {
        let recorder = Recorder::default();
        recorder.report_failure(
            UserAction::Process,
            &ClientError::Request {
                endpoint: "/process_data".into(),
                status: Some(500),
                message: "500 Internal Server Error".into(),
            },
        );
        recorder.report_failure(UserAction::List, &ClientError::decode("data listing", "eof"));
        recorder.report_failure(UserAction::Predict, &ClientError::invalid_input("empty"));

        assert_eq!(
            recorder.alerts(),
            vec![
                "데이터 처리 중 오류가 발생했습니다.",
                "데이터 조회 중 오류가 발생했습니다.",
                "쿼리를 입력하세요.",
            ]
        );
    }

    #[test]
    fn test_prediction_labels_are_one_based() {
        assert_eq!(format_prediction(0, "a"), "글 1: a");
        assert_eq!(format_prediction(1, "b"), "글 2: b");
    }

    #[test]
    fn test_terminal_renderer_output() {
        let renderer = TerminalRenderer::new(Vec::new());
        renderer.live_result("x");
        renderer.live_result("y");
        renderer.predictions(&["a".to_string(), "b".to_string()]);
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(text, "> x\n> y\n글 1: a\n글 2: b\n");
    }

    #[test]
    fn test_record_block_uses_field_labels() {
        let block = format_record(&sample_record());
        assert!(block.starts_with("# 제목\n"));
        assert!(block.contains("작성자: 작성자A\n"));
        assert!(block.contains("태그: 맛집, 카페\n"));
        assert!(block.contains("공감 수: 7\n"));
        assert!(block.contains("URL: https://blog.example.com/p/1\n"));
        assert!(block.contains("  - https://revu.example/a.png\n"));
        assert!(block.contains("광고 감지 상태: O\n"));
    }

    #[test]
    fn test_empty_listing_renders_nothing() {
        let renderer = TerminalRenderer::new(Vec::new());
        renderer.records(&[]);
        assert!(renderer.into_inner().is_empty());
    }

    #[test]
    fn test_listing_keeps_retrieval_order() {
        let mut second = sample_record();
        second.title = "두번째".into();
        let renderer = TerminalRenderer::new(Vec::new());
        renderer.records(&[sample_record(), second]);
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        let first_at = text.find("# 제목").unwrap();
        let second_at = text.find("# 두번째").unwrap();
        assert!(first_at < second_at);
    }

    #[test]
    fn test_json_renderer_emits_one_document_per_item() {
        let renderer = JsonRenderer::new(Vec::new());
        renderer.live_result("x");
        renderer.predictions(&["a".to_string()]);
        renderer.records(&[sample_record()]);
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["content"], "x");
        assert_eq!(lines[1]["predictions"][0], "a");
        assert_eq!(lines[2]["records"][0]["광고"], "O");
    }
}
