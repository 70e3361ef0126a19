//! HTTP client for the subset of the Telegram Bot API the relay uses.

use std::time::Duration;

use log::debug;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bot::types::{
    AnswerCallbackQueryRequest, Message, SendMessageRequest, SetWebhookRequest,
    TelegramResponse, Update, User,
};
use crate::error::DeliveryError;

pub struct TelegramClient {
    http: Client,
    /// `https://api.telegram.org/bot{token}` unless overridden.
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        Self::with_base_url(format!("https://api.telegram.org/bot{token}"), timeout)
    }

    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn unwrap_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, DeliveryError> {
        let body: TelegramResponse<T> = resp.json().await?;
        if !body.ok {
            let desc = body.description.unwrap_or_else(|| "unknown error".into());
            return Err(DeliveryError::Api(desc));
        }
        body.result
            .ok_or_else(|| DeliveryError::Api("missing result in response".into()))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, DeliveryError> {
        let resp = self.http.post(self.url(method)).json(body).send().await?;
        Self::unwrap_response(resp).await
    }

    pub async fn send_message(&self, req: &SendMessageRequest) -> Result<Message, DeliveryError> {
        debug!("sendMessage to chat {}", req.chat_id);
        self.post_json("sendMessage", req).await
    }

    pub async fn send_document(
        &self,
        chat_id: &str,
        data: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<Message, DeliveryError> {
        debug!("sendDocument {filename} to chat {chat_id}");
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let resp = self
            .http
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        Self::unwrap_response(resp).await
    }

    pub async fn answer_callback_query(
        &self,
        req: &AnswerCallbackQueryRequest,
    ) -> Result<bool, DeliveryError> {
        self.post_json("answerCallbackQuery", req).await
    }

    /// Recent updates; only usable while no webhook is set.
    pub async fn get_updates(&self) -> Result<Vec<Update>, DeliveryError> {
        let resp = self.http.get(self.url("getUpdates")).send().await?;
        Self::unwrap_response(resp).await
    }

    pub async fn set_webhook(&self, url: &str) -> Result<bool, DeliveryError> {
        self.post_json(
            "setWebhook",
            &SetWebhookRequest {
                url: url.to_string(),
            },
        )
        .await
    }

    pub async fn get_me(&self) -> Result<User, DeliveryError> {
        let resp = self.http.get(self.url("getMe")).send().await?;
        Self::unwrap_response(resp).await
    }
}
