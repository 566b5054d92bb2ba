use serde_json::json;
use squatwatch::notify::TelegramNotifier;
use squatwatch::{
    DownloadStatus, MatchReport, RuleKind, RunReport, SimilarityScore, SquatwatchError,
};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_PATH: &str = "/botTOKEN/sendMessage";

fn notifier(server: &MockServer) -> TelegramNotifier {
    TelegramNotifier::new("TOKEN", "-1001")
        .unwrap()
        .with_api_url(&server.uri())
}

fn match_report(candidate: &str) -> MatchReport {
    MatchReport {
        target: "requests".to_string(),
        target_rank: 7,
        candidate: candidate.to_string(),
        candidate_owners: vec!["mallory".to_string()],
        candidate_version: Some("0.1.0".to_string()),
        candidate_downloads: 3,
        rule: RuleKind::Duplication,
        similarity: Some(SimilarityScore::Semantic { score: 0.99 }),
        download: DownloadStatus::Skipped,
    }
}

#[tokio::test]
async fn test_send_match_posts_markdown_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({ "chat_id": "-1001", "parse_mode": "Markdown" })))
        .and(body_string_contains("requessts"))
        .and(body_string_contains("(#7)"))
        .and(body_string_contains("semantic score 0.990"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .send_match(&match_report("requessts"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_send_summary_counts_distinct_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({ "chat_id": "-1001" })))
        .and(body_string_contains("*Window:* 3 days"))
        .and(body_string_contains("*Recent crates:* 250"))
        .and(body_string_contains("*Suspicious crates:* 1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    // one crate imitating two targets is one suspicious crate
    let mut second = match_report("requessts");
    second.target = "request".to_string();
    let report = RunReport {
        popular_count: 3000,
        recent_count: 250,
        raw_matches: 9,
        matches: vec![match_report("requessts"), second],
        check_days: 3,
        duration_secs: 1.5,
        errors: Vec::new(),
    };

    notifier(&server).send_summary(&report).await.unwrap();
}

#[tokio::test]
async fn test_rejected_message_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"))
        .expect(1)
        .mount(&server)
        .await;

    let err = notifier(&server)
        .send_match(&match_report("requessts"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, SquatwatchError::TelegramError(ref text) if text.contains("chat not found"))
    );
}
