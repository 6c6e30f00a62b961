use super::*;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn passages() -> Vec<ContextPassage> {
    vec![ContextPassage {
        text: "Rust 1.0 was released in May 2015.".to_string(),
        source: "https://example.com/rust".to_string(),
    }]
}

fn config_for(server: &MockServer) -> GenerationConfig {
    GenerationConfig {
        base_url: format!("{}/openai/v1", server.uri()),
        model: "test-model".to_string(),
        ..GenerationConfig::default()
    }
}

fn parse(value: serde_json::Value) -> ChatCompletionResponse {
    serde_json::from_value(value).expect("response should decode")
}

#[test]
fn first_choice_content_is_the_answer() {
    let response = parse(json!({
        "id": "chatcmpl-1",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "  May 2015.  "}, "finish_reason": "stop"},
            {"index": 1, "message": {"role": "assistant", "content": "ignored"}, "finish_reason": "stop"}
        ],
        "usage": {"total_tokens": 12}
    }));

    assert_eq!(
        answer_from_response(response).expect("answer should be extracted"),
        "May 2015."
    );
}

#[test]
fn no_choices_is_an_error() {
    let response = parse(json!({ "choices": [] }));

    assert!(answer_from_response(response).is_err());
}

#[test]
fn empty_or_missing_content_is_an_error() {
    let response = parse(json!({
        "choices": [{"message": {"role": "assistant", "content": "   "}, "finish_reason": "length"}]
    }));
    let err = answer_from_response(response).expect_err("blank content must fail");
    assert!(err.to_string().contains("length"));

    let response = parse(json!({
        "choices": [{"message": {"role": "assistant", "content": null}}]
    }));
    assert!(answer_from_response(response).is_err());
}

#[test]
fn unexpected_shape_does_not_decode() {
    let result = serde_json::from_value::<ChatCompletionResponse>(json!({
        "generations": [[{"text": "hello"}]]
    }));

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn posts_grounded_prompt_and_returns_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("Authorization", "Bearer gsk-test"))
        .and(body_partial_json(json!({ "model": "test-model", "max_tokens": 512 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "In May 2015 [1]."}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let answer = tokio::task::spawn_blocking(move || {
        let generator = ChatCompletionGenerator::new(&config, "gsk-test".to_string())
            .expect("should create generator");
        generator.generate("When was Rust 1.0 released?", &passages())
    })
    .await
    .expect("task should complete")
    .expect("generation should succeed");

    assert_eq!(answer, "In May 2015 [1].");

    let requests = server
        .received_requests()
        .await
        .expect("request recording should be enabled");
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("request body should be JSON");
    let user_prompt = body["messages"][1]["content"]
        .as_str()
        .expect("user message should have content");
    assert!(user_prompt.contains("source: https://example.com/rust"));
    assert!(user_prompt.contains("When was Rust 1.0 released?"));
}

#[tokio::test(flavor = "multi_thread")]
async fn service_unavailable_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let result = tokio::task::spawn_blocking(move || {
        let generator = ChatCompletionGenerator::new(&config, "gsk-test".to_string())
            .expect("should create generator")
            .with_retry(RetryPolicy::none());
        generator.generate("question", &passages())
    })
    .await
    .expect("task should complete");

    assert!(result.is_err());
}
