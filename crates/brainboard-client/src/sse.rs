//! Server-sent-event framing over a streamed POST body.
//!
//! The chat endpoint needs a request body to carry the query, so the
//! backend streams `data: <json>` records over a plain chunked response
//! instead of a dedicated EventSource connection. Records are newline
//! delimited; chunk boundaries can fall anywhere, including mid-record.

use anyhow::{anyhow, Result};
use futures_core::Stream;
use tokio_stream::StreamExt;

use brainboard_schema::StreamEvent;

pub(crate) fn parse_event_stream(
    byte_stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>>
        + Send
        + 'static,
) -> impl Stream<Item = Result<StreamEvent>> + Send {
    async_stream::stream! {
        tokio::pin!(byte_stream);
        let mut buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    while let Some(pos) = buffer.find('\n') {
                        let line = buffer[..pos].trim_end_matches('\r').to_string();
                        buffer = buffer[pos + 1..].to_string();

                        if let Some(event) = parse_record(&line) {
                            let is_err = event.is_err();
                            yield event;
                            if is_err {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(anyhow!("stream error: {e}"));
                    return;
                }
            }
        }

        // A final record is valid even when the body ends without a newline.
        if let Some(event) = parse_record(buffer.trim_end()) {
            yield event;
        }
    }
}

/// One framed line. Lines without the `data: ` prefix (blank keep-alives,
/// `event:`/`id:` fields) are skipped.
fn parse_record(line: &str) -> Option<Result<StreamEvent>> {
    let data = line.strip_prefix("data: ")?;
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => Some(Ok(event)),
        Err(e) => Some(Err(anyhow!("invalid stream event payload: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn byte_stream(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static {
        tokio_stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes()))),
        )
    }

    async fn collect(
        chunks: Vec<&'static str>,
    ) -> Vec<Result<StreamEvent>> {
        let stream = parse_event_stream(byte_stream(chunks));
        tokio::pin!(stream);
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn parses_newline_delimited_records() {
        let events = collect(vec![
            "data: {\"type\":\"token\",\"text\":\"Hel\"}\ndata: {\"type\":\"token\",\"text\":\"lo\"}\ndata: {\"type\":\"done\"}\n",
        ])
        .await;
        let events: Vec<StreamEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Token { text: "Hel".into() },
                StreamEvent::Token { text: "lo".into() },
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn record_split_across_chunks() {
        let events = collect(vec![
            "data: {\"type\":\"tok",
            "en\",\"text\":\"hi\"}\n",
        ])
        .await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Token { text: "hi".into() }
        );
    }

    #[tokio::test]
    async fn final_record_without_trailing_newline() {
        let events = collect(vec!["data: {\"type\":\"done\"}"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Done);
    }

    #[tokio::test]
    async fn skips_non_data_lines() {
        let events = collect(vec![
            ": keep-alive\n\ndata: {\"type\":\"done\"}\n",
        ])
        .await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn unknown_event_type_passes_through() {
        let events = collect(vec!["data: {\"type\":\"shiny_new_thing\",\"x\":1}\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Unknown);
    }

    #[tokio::test]
    async fn malformed_json_ends_stream_with_error() {
        let events = collect(vec![
            "data: {not json}\ndata: {\"type\":\"done\"}\n",
        ])
        .await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }

    #[tokio::test]
    async fn crlf_framing_is_tolerated() {
        let events = collect(vec!["data: {\"type\":\"done\"}\r\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Done);
    }
}
