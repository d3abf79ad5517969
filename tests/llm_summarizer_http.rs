//! HTTP tests for the OpenAI-compatible summarizer against a mock server

use history_compactor::{
    CompactionSettings, HistoryCompactor, LLMSummarizer, Message, MessageCountCounter, Summarizer,
    SummarizerConfig, SummarizerError,
};
use mockito::Matcher;
use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;

const PATH: &str = "/v1/chat/completions";

fn config(server: &mockito::Server) -> SummarizerConfig {
    SummarizerConfig {
        endpoint: format!("{}{}", server.url(), PATH),
        api_key: Some(SecretString::new("test-key".to_string())),
        model: "test-model".to_string(),
        ..SummarizerConfig::default()
    }
}

fn completion(content: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
    .to_string()
}

#[tokio::test]
async fn test_summarize_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "test-model",
            "max_tokens": 32,
            "messages": [
                {"role": "user", "content": "Message 1"},
                {"role": "assistant", "content": "Response 1"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("A short summary."))
        .create_async()
        .await;

    let summarizer = LLMSummarizer::new(config(&server)).unwrap();
    let prompt = vec![Message::human("Message 1"), Message::assistant("Response 1")];
    let summary = summarizer.summarize(&prompt, Some(32)).await.unwrap();

    assert_eq!(summary, "A short summary.");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_error_is_reported_after_all_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(500)
        .with_body("upstream down")
        .expect(2)
        .create_async()
        .await;

    let summarizer = LLMSummarizer::new(SummarizerConfig {
        max_attempts: 2,
        ..config(&server)
    })
    .unwrap();

    let err = summarizer
        .summarize(&[Message::human("hi")], None)
        .await
        .unwrap_err();

    match err {
        SummarizerError::ApiError(msg) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("upstream down"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_choices() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"choices": []}).to_string())
        .create_async()
        .await;

    let summarizer = LLMSummarizer::new(config(&server)).unwrap();
    let err = summarizer
        .summarize(&[Message::human("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, SummarizerError::ApiError(_)));
}

#[tokio::test]
async fn test_compactor_with_http_summarizer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({"max_tokens": 2})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("They greeted each other."))
        .expect(1)
        .create_async()
        .await;

    let compactor = HistoryCompactor::new(
        Arc::new(LLMSummarizer::new(config(&server)).unwrap()),
        Arc::new(MessageCountCounter),
        CompactionSettings::new(4, 2),
    );

    let messages = vec![
        Message::human("Hi"),
        Message::assistant("Hello"),
        Message::human("How are you?"),
        Message::assistant("Fine"),
        Message::human("Great"),
    ];

    let result = compactor.compact(&messages, None).await.unwrap();
    assert_eq!(
        result.messages[0].content,
        "Summary of conversation earlier: They greeted each other."
    );
    assert_eq!(result.summary_state.unwrap().total_summarized_count, 4);
    assert_eq!(&result.messages[1..], &messages[4..]);
    mock.assert_async().await;
}
