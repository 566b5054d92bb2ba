//! Telegram bot notifications for detected typosquats.

use crate::notify::console::{format_download, format_similarity, format_version};
use crate::types::{MatchReport, Result, RuleKind, RunReport, SquatwatchError};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram message request body.
#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Telegram notification handler.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
    api_url: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            api_url: TELEGRAM_API_URL.to_string(),
        })
    }

    /// Send to a different Bot API host.
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn send_match(&self, report: &MatchReport) -> Result<()> {
        let message = format_match_message(report);
        self.send_message(&message).await
    }

    pub async fn send_summary(&self, report: &RunReport) -> Result<()> {
        let suspicious = report.suspicious_candidates().len();
        let emoji = if suspicious > 0 { "🚨" } else { "✅" };

        let message = format!(
            "{} *Squatwatch Run Complete*\n\n\
             *Window:* {} days\n\
             *Recent crates:* {}\n\
             *Suspicious crates:* {}",
            emoji, report.check_days, report.recent_count, suspicious
        );

        self.send_message(&message).await
    }

    /// Send a raw message via Telegram Bot API.
    async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);

        let body = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if response.status().is_success() {
            debug!("Telegram message sent successfully");
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!("Failed to send Telegram message: {}", error_text);
            Err(SquatwatchError::TelegramError(error_text))
        }
    }
}

/// Format a match as a Telegram message.
fn format_match_message(report: &MatchReport) -> String {
    let emoji = match report.rule {
        RuleKind::BitFlip | RuleKind::Homoglyph => "🔴",
        _ => "🟠",
    };

    format!(
        "{} *Possible Typosquat*\n\n\
         *Crate:* `{}` {}\n\
         *Target:* `{}` (#{})\n\
         *Rule:* {}\n\
         *Owners:* {}\n\
         *Description:* {}\n\
         *Archive:* {}",
        emoji,
        report.candidate,
        format_version(report.candidate_version.as_deref()),
        report.target,
        report.target_rank,
        report.rule,
        report.candidate_owners.join(", "),
        format_similarity(report.similarity.as_ref()),
        format_download(&report.download)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DownloadStatus, SimilarityScore};

    fn make_report() -> MatchReport {
        MatchReport {
            target: "serde".to_string(),
            target_rank: 3,
            candidate: "se2de".to_string(),
            candidate_owners: vec!["mallory".to_string()],
            candidate_version: Some("0.1.0".to_string()),
            candidate_downloads: 12,
            rule: RuleKind::BitFlip,
            similarity: Some(SimilarityScore::Semantic { score: 0.99 }),
            download: DownloadStatus::Skipped,
        }
    }

    #[test]
    fn test_format_match_message() {
        let message = format_match_message(&make_report());
        assert!(message.starts_with("🔴"));
        assert!(message.contains("`se2de` 0.1.0"));
        assert!(message.contains("`serde` (#3)"));
        assert!(message.contains("bit_flip"));
        assert!(message.contains("not downloaded"));
    }

    #[test]
    fn test_with_api_url() {
        let notifier = TelegramNotifier::new("token", "chat")
            .unwrap()
            .with_api_url("http://localhost:1234/");
        assert_eq!(notifier.api_url, "http://localhost:1234");
    }
}
