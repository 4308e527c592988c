// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Slack webhook publishing.

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::info;

use crate::constants::limits::HTTP_TIMEOUT;

#[derive(Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

#[derive(Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// Posts a text message to the configured channel webhook.
    pub async fn post_message(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(HTTP_TIMEOUT)
            .json(&WebhookMessage { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Slack webhook returned {status}: {body}");
        }
        info!(bytes = text.len(), "posted message to Slack");
        Ok(())
    }
}
