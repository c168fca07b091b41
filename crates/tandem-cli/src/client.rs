//! Async HTTP client wrapping the Tandem JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tandem_core::{
  chat::ChatSummary,
  message::{Message, MessagePage},
  user::User,
};
use uuid::Uuid;

use crate::poll::MessageSource;

/// Ordinary requests give up after this long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A poll request is held open by the server for up to ~25 s; allow for that
/// plus one server poll interval and network slack.
const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

/// Connection settings for the Tandem API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// Bearer session token.
  pub token:    String,
}

// ─── Response shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
  pub is_liked: bool,
  pub is_match: bool,
  pub chat_id:  Option<Uuid>,
  pub message:  String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkToggle {
  pub is_bookmarked: bool,
  pub message:       String,
}

#[derive(Deserialize)]
struct PollBody {
  messages: Vec<Message>,
}

#[derive(Deserialize)]
struct CountBody {
  count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartBody {
  chat_id: Uuid,
}

#[derive(Deserialize)]
struct LikedBody {
  liked: bool,
}

#[derive(Deserialize)]
struct BookmarkedBody {
  bookmarked: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
  receiver_id: Uuid,
}

#[derive(Serialize)]
struct SendRequest<'a> {
  content: &'a str,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Async HTTP client for the Tandem JSON API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder { req.bearer_auth(&self.config.token) }

  /// Send `req` and decode a JSON body, turning non-2xx answers into errors
  /// that carry the server's `error` field when there is one.
  async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    let resp = self
      .auth(req)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    let resp = check(resp, what).await?;
    resp
      .json()
      .await
      .with_context(|| format!("deserialising {what}"))
  }

  // ── Session ───────────────────────────────────────────────────────────────

  /// `GET /api/me`
  pub async fn me(&self) -> Result<User> {
    self.fetch(self.client.get(self.url("/me")), "GET /me").await
  }

  /// `GET /api/unread`
  pub async fn unread(&self) -> Result<u64> {
    let body: CountBody = self
      .fetch(self.client.get(self.url("/unread")), "GET /unread")
      .await?;
    Ok(body.count)
  }

  // ── Chats ─────────────────────────────────────────────────────────────────

  /// `GET /api/chats`
  pub async fn list_chats(&self) -> Result<Vec<ChatSummary>> {
    self
      .fetch(self.client.get(self.url("/chats")), "GET /chats")
      .await
  }

  /// `POST /api/chats`: find or create the chat with `receiver_id`.
  pub async fn start_chat(&self, receiver_id: Uuid) -> Result<Uuid> {
    let req = self
      .client
      .post(self.url("/chats"))
      .json(&StartRequest { receiver_id });
    let body: StartBody = self.fetch(req, "POST /chats").await?;
    Ok(body.chat_id)
  }

  /// `POST /api/chats/{id}/read`
  pub async fn mark_read(&self, chat_id: Uuid) -> Result<()> {
    let req = self.client.post(self.url(&format!("/chats/{chat_id}/read")));
    let _: serde_json::Value = self.fetch(req, "POST /chats/{id}/read").await?;
    Ok(())
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  /// `GET /api/chats/{id}/messages[?cursor=<id>]`
  pub async fn history(&self, chat_id: Uuid, cursor: Option<Uuid>, limit: usize) -> Result<MessagePage> {
    let mut req = self
      .client
      .get(self.url(&format!("/chats/{chat_id}/messages")))
      .query(&[("limit", limit.to_string())]);
    if let Some(cursor) = cursor {
      req = req.query(&[("cursor", cursor.to_string())]);
    }
    self.fetch(req, "GET /chats/{id}/messages").await
  }

  /// `POST /api/chats/{id}/messages`
  pub async fn send(&self, chat_id: Uuid, content: &str) -> Result<Message> {
    let req = self
      .client
      .post(self.url(&format!("/chats/{chat_id}/messages")))
      .json(&SendRequest { content });
    self.fetch(req, "POST /chats/{id}/messages").await
  }

  /// `GET /api/chats/{id}/messages/poll[?since=<rfc3339>]`
  pub async fn poll_messages(
    &self,
    chat_id: Uuid,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Message>> {
    let mut req = self
      .client
      .get(self.url(&format!("/chats/{chat_id}/messages/poll")))
      .timeout(POLL_REQUEST_TIMEOUT);
    if let Some(since) = since {
      req = req.query(&[("since", since.to_rfc3339_opts(SecondsFormat::Micros, true))]);
    }
    let body: PollBody = self.fetch(req, "GET /chats/{id}/messages/poll").await?;
    Ok(body.messages)
  }

  // ── Likes & bookmarks ─────────────────────────────────────────────────────

  /// `POST /api/likes/{userId}/toggle`
  pub async fn toggle_like(&self, user_id: Uuid) -> Result<LikeToggle> {
    let req = self.client.post(self.url(&format!("/likes/{user_id}/toggle")));
    self.fetch(req, "POST /likes/{id}/toggle").await
  }

  /// `GET /api/likes/{userId}`
  pub async fn has_liked(&self, user_id: Uuid) -> Result<bool> {
    let req = self.client.get(self.url(&format!("/likes/{user_id}")));
    let body: LikedBody = self.fetch(req, "GET /likes/{id}").await?;
    Ok(body.liked)
  }

  /// `POST /api/bookmarks/{userId}/toggle`
  pub async fn toggle_bookmark(&self, user_id: Uuid) -> Result<BookmarkToggle> {
    let req = self.client.post(self.url(&format!("/bookmarks/{user_id}/toggle")));
    self.fetch(req, "POST /bookmarks/{id}/toggle").await
  }

  /// `GET /api/bookmarks/{userId}`
  pub async fn has_bookmarked(&self, user_id: Uuid) -> Result<bool> {
    let req = self.client.get(self.url(&format!("/bookmarks/{user_id}")));
    let body: BookmarkedBody = self.fetch(req, "GET /bookmarks/{id}").await?;
    Ok(body.bookmarked)
  }
}

impl MessageSource for ApiClient {
  async fn poll(&self, chat_id: Uuid, since: Option<DateTime<Utc>>) -> Result<Vec<Message>> {
    self.poll_messages(chat_id, since).await
  }
}

/// Pass 2xx responses through; otherwise build an error from the status and
/// the server's `error` message.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let detail = resp
    .json::<serde_json::Value>()
    .await
    .ok()
    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned));
  Err(match detail {
    Some(detail) => anyhow!("{what} → {status}: {detail}"),
    None => anyhow!("{what} → {status}"),
  })
}
