//! Whole workflow wired from configuration against a stub model endpoint

use std::path::PathBuf;

use rag_query_engine::build_query_service;
use rag_query_engine::config::AppConfig;
use rag_query_engine::infrastructure::services::QueryRequest;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-test",
        "model": "stub-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 50, "completion_tokens": 10, "total_tokens": 60}
    }))
}

/// One identical unit vector per input, so every document matches every query
fn embeddings_reply(request: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
    let count = body["input"].as_array().map(|inputs| inputs.len()).unwrap_or(1);
    let data: Vec<Value> = (0..count)
        .map(|index| json!({"index": index, "embedding": [0.6, 0.8]}))
        .collect();

    ResponseTemplate::new(200).set_body_json(json!({
        "model": "stub-embedding",
        "data": data,
        "usage": {"prompt_tokens": 1, "total_tokens": 1}
    }))
}

fn write_corpus(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{}-{}.json", name, std::process::id()));
    let corpus = json!([
        {"id": "lora-paper", "title": "LoRA", "content": "LoRA freezes pretrained weights and injects trainable low-rank matrices."}
    ]);
    std::fs::write(&path, corpus.to_string()).unwrap();
    path
}

async fn stub_server(grade: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(embeddings_reply)
        .mount(&server)
        .await;

    // Grading requests are the only ones capped at 10 tokens
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 10})))
        .respond_with(chat_reply(grade))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("LoRA trains low-rank update matrices [1]."))
        .mount(&server)
        .await;

    server
}

fn config(server: &MockServer, corpus: &PathBuf) -> AppConfig {
    let mut config = AppConfig::default();
    config.models.base_url = server.uri();
    config.models.api_key = "sk-test".to_string();
    config.retrieval.corpus_path = Some(corpus.display().to_string());
    config.query.query_rewrite_enabled = false;
    config
}

#[tokio::test]
async fn test_grounded_answer_accepted_first_attempt() {
    let server = stub_server("0.92").await;
    let corpus = write_corpus("rag-accepted");
    let service = build_query_service(&config(&server, &corpus)).await.unwrap();

    let outcome = service
        .answer(QueryRequest::new("What is LoRA?").with_request_id("req-e2e-1"))
        .await
        .unwrap();

    let result = outcome.result;
    assert_eq!(outcome.request_id.as_str(), "req-e2e-1");
    assert!(!result.degraded);
    assert_eq!(result.attempts, 1);
    assert!((result.faithfulness_score - 0.92).abs() < 1e-6);
    assert_eq!(result.answer, "LoRA trains low-rank update matrices [1].");

    let citations = result.citations.unwrap();
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].source, "lora-paper");

    std::fs::remove_file(corpus).ok();
}

#[tokio::test]
async fn test_low_faithfulness_exhausts_retries_and_degrades() {
    let server = stub_server("0.3").await;
    let corpus = write_corpus("rag-degraded");
    let mut config = config(&server, &corpus);
    config.query.max_retries = 2;
    let service = build_query_service(&config).await.unwrap();

    let result = service
        .answer(QueryRequest::new("What is LoRA?"))
        .await
        .unwrap()
        .result;

    assert!(result.degraded);
    assert_eq!(result.attempts, 3);
    assert!(!result.answer.is_empty());

    std::fs::remove_file(corpus).ok();
}
