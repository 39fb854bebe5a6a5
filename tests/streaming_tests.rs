use ai_facade::AiError;
use ai_facade::stream::{SseEvents, StreamEvent, parse_sse_line};
use futures::StreamExt;

#[test]
fn test_parse_data_lines() {
    assert_eq!(
        parse_sse_line("data: {\"a\":1}"),
        Some(StreamEvent::Data("{\"a\":1}".to_string()))
    );
    // The leading space is optional and only one is stripped
    assert_eq!(parse_sse_line("data:x"), Some(StreamEvent::Data("x".to_string())));
    assert_eq!(parse_sse_line("data:  x"), Some(StreamEvent::Data(" x".to_string())));
    assert_eq!(parse_sse_line("data: [DONE]\r\n"), Some(StreamEvent::Data("[DONE]".to_string())));
}

#[test]
fn test_parse_event_and_id_lines() {
    assert_eq!(
        parse_sse_line("event: response.output_text.delta"),
        Some(StreamEvent::Event("response.output_text.delta".to_string()))
    );
    assert_eq!(parse_sse_line("id: 42"), Some(StreamEvent::Id("42".to_string())));
}

#[test]
fn test_lines_without_events() {
    assert_eq!(parse_sse_line(""), None);
    assert_eq!(parse_sse_line("   "), None);
    assert_eq!(parse_sse_line(": keep-alive"), None);
    assert_eq!(parse_sse_line("retry: 1000"), None);
}

#[test]
fn test_unknown_lines_are_data() {
    let ndjson = r#"{"message":{"content":"hi"},"done":false}"#;
    assert_eq!(parse_sse_line(ndjson), Some(StreamEvent::Data(ndjson.to_string())));
    assert_eq!(parse_sse_line("plain"), Some(StreamEvent::Data("plain".to_string())));
}

#[test]
fn test_data_accessor() {
    assert_eq!(StreamEvent::Data("x".to_string()).data(), Some("x"));
    assert_eq!(StreamEvent::Event("x".to_string()).data(), None);
}

#[tokio::test]
async fn test_sse_events_skip_empty_lines() {
    let lines = futures::stream::iter(vec![
        Ok("event: message".to_string()),
        Ok("data: one".to_string()),
        Ok(String::new()),
        Ok(": comment".to_string()),
        Ok("data: two".to_string()),
    ]);

    let events: Vec<StreamEvent> = SseEvents::new(lines)
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Event("message".to_string()),
            StreamEvent::Data("one".to_string()),
            StreamEvent::Data("two".to_string()),
        ]
    );
}

#[test]
fn test_sse_events_forward_errors() {
    let lines = futures::stream::iter(vec![
        Ok("data: one".to_string()),
        Err(AiError::Transport("connection reset".to_string())),
    ]);

    tokio_test::block_on(async {
        let mut events = SseEvents::new(lines);
        assert_eq!(events.next().await.unwrap().unwrap(), StreamEvent::Data("one".to_string()));
        assert!(matches!(events.next().await, Some(Err(AiError::Transport(_)))));
        assert!(events.next().await.is_none());
    });
}
