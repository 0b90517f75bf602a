use crate::constants::FEEDBACK_PATH;
use crate::error::{Result, TinyImgError};
use serde::{Deserialize, Serialize};

const RELAY_TITLE: &str = "TinyIMG Feedback";
const RELAY_SEPARATOR: &str = "---------------";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    pub subject: String,
    pub message: String,
}

impl FeedbackMessage {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Text forwarded to the messaging collaborator
    pub fn relay_text(&self) -> String {
        [
            RELAY_TITLE,
            RELAY_SEPARATOR,
            self.subject.as_str(),
            RELAY_SEPARATOR,
            self.message.as_str(),
        ]
        .join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackClient {
    client: reqwest::Client,
    feedback_url: String,
}

impl FeedbackClient {
    pub fn new(site_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            feedback_url: format!("{}{}", site_url.trim_end_matches('/'), FEEDBACK_PATH),
        }
    }

    pub fn feedback_url(&self) -> &str {
        &self.feedback_url
    }

    /// The relay answers `ok` whether or not forwarding worked, so success here
    /// only means the site accepted the message.
    pub async fn send(&self, feedback: &FeedbackMessage) -> Result<()> {
        if feedback.subject.trim().is_empty() && feedback.message.trim().is_empty() {
            return Err(TinyImgError::RequestFailed(
                "Feedback needs a subject or a message".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.feedback_url)
            .json(feedback)
            .send()
            .await
            .map_err(|e| TinyImgError::RequestFailed(format!("Failed to send feedback: {}", e)))?;

        if !response.status().is_success() {
            return Err(TinyImgError::RequestFailed(format!(
                "Feedback failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
