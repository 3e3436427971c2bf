//! Expo push API client.
//!
//! Sends push messages through Expo's HTTP/2 push endpoint. One request per
//! user; Expo fans out to the user's registered devices and returns a ticket
//! per message.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::kernel::traits::{
    BasePushNotificationService, DeliveryReceipt, NotificationPriority, PushMessage, Recipient,
};

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

pub struct ExpoClient {
    client: reqwest::Client,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    #[serde(default)]
    data: Vec<ExpoTicket>,
}

impl ExpoClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
        }
    }

    async fn send(&self, token: &str, message: &PushMessage) -> Result<ExpoResponse> {
        let priority = match message.priority {
            NotificationPriority::Normal => "default",
            NotificationPriority::High => "high",
        };
        let body = json!({
            "to": token,
            "title": message.title,
            "body": message.body,
            "data": message.data,
            "priority": priority,
            "sound": "default",
        });

        let mut request = self.client.post(EXPO_PUSH_URL).json(&body);
        if let Some(access_token) = &self.access_token {
            request = request.bearer_auth(access_token);
        }

        let response = request
            .send()
            .await
            .context("expo push request failed")?
            .error_for_status()
            .context("expo push returned an error status")?;

        response
            .json()
            .await
            .context("expo push response was not valid JSON")
    }
}

/// [`BasePushNotificationService`] backed by Expo.
pub struct ExpoPushService {
    client: ExpoClient,
}

impl ExpoPushService {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            client: ExpoClient::new(access_token),
        }
    }
}

#[async_trait]
impl BasePushNotificationService for ExpoPushService {
    async fn send_to_user(
        &self,
        recipient: &Recipient,
        message: &PushMessage,
    ) -> Result<DeliveryReceipt> {
        let Some(token) = &recipient.push_token else {
            debug!(user_id = %recipient.id, "recipient has no push token");
            return Ok(DeliveryReceipt::default());
        };

        let response = self.client.send(token, message).await?;

        let mut receipt = DeliveryReceipt::default();
        for ticket in response.data {
            if ticket.status == "ok" {
                receipt.success += 1;
            } else {
                receipt.failed += 1;
                warn!(
                    user_id = %recipient.id,
                    status = %ticket.status,
                    message = ticket.message.as_deref().unwrap_or(""),
                    "expo push ticket error"
                );
            }
        }
        Ok(receipt)
    }
}
