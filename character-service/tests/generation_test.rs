mod common;

use character_service::services::generation::CHARACTER_STYLE_SUFFIX;
use character_service::services::providers::mock::{MockCall, MockImageProvider, MOCK_CHARACTER_BYTES};
use character_service::services::providers::ProviderError;
use common::{TestApp, TINY_PNG_BASE64};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashSet;

#[tokio::test]
async fn generate_character_returns_url_and_writes_file() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/generate-character", &json!({ "prompt": "a gaunt gravedigger" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);

    let image_url = body["imageUrl"].as_str().expect("imageUrl");
    let filepath = body["filepath"].as_str().expect("filepath");
    assert!(image_url.starts_with(&format!("http://localhost:{}/images/character_", app.port)));
    assert!(std::path::Path::new(filepath).is_absolute());
    assert_eq!(app.image_file_count().await, 1);
    assert_eq!(tokio::fs::read(filepath).await.unwrap(), MOCK_CHARACTER_BYTES);

    let calls = app.provider.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        MockCall::Generate { prompt, params } => {
            assert_eq!(
                prompt,
                &format!("a gaunt gravedigger{}", CHARACTER_STYLE_SUFFIX)
            );
            assert_eq!(params.aspect_ratio, "1:1");
            assert_eq!(params.number_of_images, 1);
        }
        other => panic!("unexpected call: {:?}", other),
    }

    app.cleanup().await;
}

#[tokio::test]
async fn generated_image_is_served_back_verbatim() {
    let app = TestApp::spawn().await;

    let body: Value = app
        .post_json("/generate-character", &json!({ "prompt": "a pale widow" }))
        .await
        .json()
        .await
        .expect("Failed to parse JSON");

    let filename = body["imageUrl"]
        .as_str()
        .and_then(|url| url.rsplit('/').next())
        .expect("filename in url")
        .to_string();

    let response = Client::new()
        .get(format!("{}/images/{}", app.address, filename))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.bytes().await.unwrap().as_ref(), MOCK_CHARACTER_BYTES);

    let missing = Client::new()
        .get(format!("{}/images/does-not-exist.png", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(missing.status().as_u16(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn empty_or_missing_prompt_is_rejected_without_provider_call() {
    let app = TestApp::spawn().await;

    for body in [json!({}), json!({ "prompt": "" }), json!({ "prompt": "   " })] {
        let response = app.post_json("/generate-character", &body).await;
        assert_eq!(response.status().as_u16(), 400, "body: {}", body);

        let error: Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(error["error"], "Prompt is required");
    }

    assert_eq!(app.provider.call_count(), 0);
    assert_eq!(app.image_file_count().await, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let app = TestApp::spawn().await;

    let response = Client::new()
        .post(format!("{}/generate-character", app.address))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.expect("Failed to parse JSON");
    assert!(error["error"].is_string());
    assert_eq!(app.provider.call_count(), 0);

    app.cleanup().await;
}

#[tokio::test]
async fn content_filter_reason_reaches_the_caller() {
    let app = TestApp::spawn_with(MockImageProvider::new(true).with_generate_result(Err(
        ProviderError::ContentFiltered("Prompt contains violent content.".to_string()),
    )))
    .await;

    let response = app
        .post_json("/generate-character", &json!({ "prompt": "a butcher" }))
        .await;
    assert_eq!(response.status().as_u16(), 500);

    let error: Value = response.json().await.expect("Failed to parse JSON");
    assert!(error["error"]
        .as_str()
        .unwrap()
        .contains("Prompt contains violent content."));
    assert_eq!(app.image_file_count().await, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn missing_provider_configuration_is_a_server_error() {
    let app = TestApp::spawn_with(MockImageProvider::new(false)).await;

    let response = app
        .post_json("/generate-character", &json!({ "prompt": "a nun" }))
        .await;
    assert_eq!(response.status().as_u16(), 500);

    let error: Value = response.json().await.expect("Failed to parse JSON");
    assert!(error["error"].as_str().unwrap().contains("not configured"));

    app.cleanup().await;
}

#[tokio::test]
async fn generate_expressions_returns_one_record_per_label() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/generate-expressions",
            &json!({
                "baseImage": TINY_PNG_BASE64,
                "expressions": ["happy", "sad", "terrified"]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);

    let results = body["expressions"].as_array().expect("expressions array");
    assert_eq!(results.len(), 3);

    let labels: Vec<&str> = results
        .iter()
        .map(|r| r["expression"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["happy", "sad", "terrified"]);

    let urls: HashSet<&str> = results
        .iter()
        .map(|r| r["imageUrl"].as_str().unwrap())
        .collect();
    assert_eq!(urls.len(), 3);

    for result in results {
        let label = result["expression"].as_str().unwrap();
        let url = result["imageUrl"].as_str().unwrap();
        assert!(url.contains(&format!("/images/expression_{}_", label)));
        assert!(result["filepath"].is_string());
    }
    assert_eq!(app.image_file_count().await, 3);

    app.cleanup().await;
}

#[tokio::test]
async fn one_failed_expression_does_not_fail_the_batch() {
    let app = TestApp::spawn_with(
        MockImageProvider::new(true).fail_edit_when("be angry", ProviderError::NoImage),
    )
    .await;

    let response = app
        .post_json(
            "/generate-expressions",
            &json!({
                "baseImage": TINY_PNG_BASE64,
                "expressions": ["happy", "angry", "sad"]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    let labels: Vec<&str> = body["expressions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["expression"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["happy", "sad"]);
    assert_eq!(app.provider.call_count(), 3);

    app.cleanup().await;
}

#[tokio::test]
async fn data_url_base_image_is_forwarded_without_prefix() {
    let app = TestApp::spawn().await;

    for base_image in [
        TINY_PNG_BASE64.to_string(),
        format!("data:image/png;base64,{}", TINY_PNG_BASE64),
    ] {
        let response = app
            .post_json(
                "/generate-expressions",
                &json!({ "baseImage": base_image, "expressions": ["smug"] }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let calls = app.provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    match &calls[0] {
        MockCall::Edit { image, .. } => {
            assert_eq!(image.data, TINY_PNG_BASE64);
            assert_eq!(image.mime_type, "image/png");
        }
        other => panic!("unexpected call: {:?}", other),
    }

    app.cleanup().await;
}

#[tokio::test]
async fn invalid_expression_requests_are_rejected() {
    let app = TestApp::spawn().await;

    let cases = [
        json!({ "expressions": ["happy"] }),
        json!({ "baseImage": "", "expressions": ["happy"] }),
        json!({ "baseImage": TINY_PNG_BASE64 }),
        json!({ "baseImage": TINY_PNG_BASE64, "expressions": [] }),
        json!({ "baseImage": "data:image/png;base64,", "expressions": ["happy"] }),
    ];

    for body in cases {
        let response = app.post_json("/generate-expressions", &body).await;
        assert_eq!(response.status().as_u16(), 400, "body: {}", body);
        let error: Value = response.json().await.expect("Failed to parse JSON");
        assert!(error["error"].is_string());
    }

    assert_eq!(app.provider.call_count(), 0);

    app.cleanup().await;
}

#[tokio::test]
async fn concurrent_characters_never_share_a_filename() {
    let app = TestApp::spawn().await;

    let requests = (0..8).map(|i| {
        let address = app.address.clone();
        async move {
            let body: Value = Client::new()
                .post(format!("{}/generate-character", address))
                .json(&json!({ "prompt": format!("villager {}", i) }))
                .send()
                .await
                .expect("Failed to execute request")
                .json()
                .await
                .expect("Failed to parse JSON");
            body["imageUrl"].as_str().unwrap().to_string()
        }
    });

    let urls: HashSet<String> = futures::future::join_all(requests).await.into_iter().collect();
    assert_eq!(urls.len(), 8);
    assert_eq!(app.image_file_count().await, 8);

    app.cleanup().await;
}
