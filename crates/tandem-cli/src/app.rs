//! Application state machine and event dispatcher.

use std::sync::{Arc, Mutex};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use tandem_core::{
  chat::ChatSummary,
  message::MessageContent,
  timeline::MessageLog,
  user::{User, UserSummary},
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::{
  client::ApiClient,
  optimistic::Optimistic,
  poll::{PollEvent, PollTiming, Poller, lock_log},
};

/// History page size when opening a chat or scrolling back.
const HISTORY_PAGE: usize = 20;

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  /// Focus on the chat list.
  ChatList,
  /// An open chat: message log plus input line.
  Conversation,
}

// ─── Conversation ─────────────────────────────────────────────────────────────

/// State of the open chat. Exists only while its poll loop runs.
pub struct Conversation {
  pub chat_id:    Uuid,
  pub partner:    Option<UserSummary>,
  pub log:        Arc<Mutex<MessageLog>>,
  pub liked:      Optimistic,
  pub bookmarked: Optimistic,
  /// Whether older history exists beyond what the log holds.
  pub has_more:   bool,
  /// Lines scrolled up from the newest message.
  pub scroll:     usize,
  poller:         Poller,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  /// Current screen / keyboard focus.
  pub screen: Screen,

  /// The signed-in user.
  pub me: Option<User>,

  /// The caller's chats, most recently active first.
  pub chats: Vec<ChatSummary>,

  /// Current fuzzy-filter string (only active when `filter_active`).
  pub filter: String,

  /// Whether the user is typing a filter query.
  pub filter_active: bool,

  /// Cursor position within the *filtered* chat list.
  pub list_cursor: usize,

  /// The open chat, if any.
  pub conversation: Option<Conversation>,

  /// Draft message for the open chat.
  pub input: String,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  /// Shared HTTP client.
  pub client: Arc<ApiClient>,

  timing:    PollTiming,
  events_tx: UnboundedSender<PollEvent>,
  events_rx: UnboundedReceiver<PollEvent>,
}

impl App {
  pub fn new(client: ApiClient, timing: PollTiming) -> Self {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    Self {
      screen: Screen::ChatList,
      me: None,
      chats: Vec::new(),
      filter: String::new(),
      filter_active: false,
      list_cursor: 0,
      conversation: None,
      input: String::new(),
      status_msg: String::new(),
      client: Arc::new(client),
      timing,
      events_tx,
      events_rx,
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Fetch the signed-in user and their chats.
  pub async fn load(&mut self) -> anyhow::Result<()> {
    self.status_msg = "Loading chats…".into();
    self.me = Some(self.client.me().await?);
    self.load_chats().await
  }

  pub async fn load_chats(&mut self) -> anyhow::Result<()> {
    match self.client.list_chats().await {
      Ok(chats) => {
        self.chats = chats;
        self.list_cursor = self.list_cursor.min(self.chats.len().saturating_sub(1));
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  /// Total unread messages over the loaded chat list.
  pub fn unread_total(&self) -> u64 { self.chats.iter().map(|c| c.unread).sum() }

  // ── Filtered list ─────────────────────────────────────────────────────────

  /// Chats whose partner name or latest message matches the filter.
  pub fn filtered_chats(&self) -> Vec<&ChatSummary> {
    filter_chats(&self.chats, &self.filter)
  }

  /// The chat under the list cursor in the filtered view, if any.
  pub fn cursor_chat(&self) -> Option<&ChatSummary> {
    self.filtered_chats().get(self.list_cursor).copied()
  }

  // ── Conversation lifecycle ────────────────────────────────────────────────

  /// Open `chat_id`: load the newest history page, mark it read, fetch the
  /// partner's like/bookmark state, and start polling.
  pub async fn open_chat(&mut self, chat_id: Uuid, partner: Option<UserSummary>) -> anyhow::Result<()> {
    self.close_chat().await;
    self.status_msg = "Loading…".into();

    let page = self.client.history(chat_id, None, HISTORY_PAGE).await?;
    let log = Arc::new(Mutex::new(MessageLog::from_history(page.messages)));

    if let Err(e) = self.client.mark_read(chat_id).await {
      tracing::warn!(%chat_id, error = %e, "mark read failed");
    }

    let (liked, bookmarked) = match &partner {
      Some(p) => (
        self.client.has_liked(p.id).await.unwrap_or(false),
        self.client.has_bookmarked(p.id).await.unwrap_or(false),
      ),
      None => (false, false),
    };

    let poller = Poller::spawn(
      Arc::clone(&self.client),
      chat_id,
      Arc::clone(&log),
      self.timing,
      self.events_tx.clone(),
    );

    self.conversation = Some(Conversation {
      chat_id,
      partner,
      log,
      liked: Optimistic::new(liked),
      bookmarked: Optimistic::new(bookmarked),
      has_more: page.has_more,
      scroll: 0,
      poller,
    });
    self.input.clear();
    self.screen = Screen::Conversation;
    self.status_msg = String::new();
    Ok(())
  }

  /// Find or create the chat with `user_id`, then open it.
  pub async fn open_with_user(&mut self, user_id: Uuid) -> anyhow::Result<()> {
    let chat_id = self.client.start_chat(user_id).await?;
    self.load_chats().await?;
    let partner = self
      .chats
      .iter()
      .find(|c| c.chat.id == chat_id)
      .and_then(|c| c.other.clone());
    self.open_chat(chat_id, partner).await
  }

  /// Tear down the open chat's poll loop, if any.
  pub async fn close_chat(&mut self) {
    if let Some(conv) = self.conversation.take() {
      conv.poller.stop().await;
    }
  }

  async fn back_to_list(&mut self) -> anyhow::Result<()> {
    self.close_chat().await;
    self.input.clear();
    self.screen = Screen::ChatList;
    // Unread counts changed while the chat was open.
    self.load_chats().await
  }

  // ── Poll events ───────────────────────────────────────────────────────────

  /// Apply everything the poll task reported since the last frame.
  pub async fn drain_poll_events(&mut self) {
    while let Ok(event) = self.events_rx.try_recv() {
      match event {
        PollEvent::Delivered { chat_id, added } => {
          let Some(conv) = &mut self.conversation else { continue };
          if conv.poller.chat_id() != chat_id {
            continue;
          }
          conv.scroll = 0;
          self.status_msg = format!("{added} new message(s)");
          // The chat is on screen, so whatever arrived is read.
          if let Err(e) = self.client.mark_read(chat_id).await {
            tracing::warn!(%chat_id, error = %e, "mark read failed");
          }
        }
        PollEvent::Failed { error, .. } => {
          self.status_msg = format!("Connection problem, retrying: {error}");
        }
      }
    }
  }

  // ── Actions in a conversation ─────────────────────────────────────────────

  async fn send_input(&mut self) {
    let Some(conv) = &mut self.conversation else { return };
    let content = match MessageContent::parse(self.input.as_str()) {
      Ok(content) => content,
      Err(e) => {
        self.status_msg = e.to_string();
        return;
      }
    };
    match self.client.send(conv.chat_id, content.as_str()).await {
      Ok(message) => {
        lock_log(&conv.log).insert_sent(message);
        conv.scroll = 0;
        self.input.clear();
        self.status_msg = String::new();
      }
      Err(e) => {
        // Keep the draft so it can be retried.
        self.status_msg = format!("Send failed: {e}");
      }
    }
  }

  async fn load_older(&mut self) {
    let Some(conv) = &mut self.conversation else { return };
    if !conv.has_more {
      self.status_msg = "Beginning of conversation".into();
      return;
    }
    let cursor = lock_log(&conv.log).first().map(|m| m.id);
    match self.client.history(conv.chat_id, cursor, HISTORY_PAGE).await {
      Ok(page) => {
        conv.has_more = page.has_more;
        lock_log(&conv.log).prepend_history(page.messages);
      }
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }

  async fn toggle_like(&mut self) {
    let Some(conv) = &mut self.conversation else { return };
    let Some(partner) = conv.partner.as_ref().map(|p| p.id) else { return };
    if conv.liked.is_pending() {
      return;
    }
    conv.liked.begin_toggle();
    match self.client.toggle_like(partner).await {
      Ok(resp) => {
        conv.liked.confirm(resp.is_liked);
        self.status_msg = resp.message;
        if resp.is_match {
          tracing::info!(chat_id = ?resp.chat_id, "matched");
        }
      }
      Err(e) => {
        conv.liked.rollback();
        self.status_msg = format!("Like failed: {e}");
      }
    }
  }

  async fn toggle_bookmark(&mut self) {
    let Some(conv) = &mut self.conversation else { return };
    let Some(partner) = conv.partner.as_ref().map(|p| p.id) else { return };
    if conv.bookmarked.is_pending() {
      return;
    }
    conv.bookmarked.begin_toggle();
    match self.client.toggle_bookmark(partner).await {
      Ok(resp) => {
        conv.bookmarked.confirm(resp.is_bookmarked);
        self.status_msg = resp.message;
      }
      Err(e) => {
        conv.bookmarked.rollback();
        self.status_msg = format!("Bookmark failed: {e}");
      }
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    if self.filter_active {
      return self.handle_filter_key(key).await;
    }

    match self.screen {
      Screen::ChatList => self.handle_list_key(key).await,
      Screen::Conversation => self.handle_conversation_key(key).await,
    }
  }

  async fn handle_filter_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter => {
        self.filter_active = false;
        self.list_cursor = 0;
        // Open straight away if there's exactly one match.
        let only = match self.filtered_chats().as_slice() {
          [one] => Some((one.chat.id, one.other.clone())),
          _ => None,
        };
        if let Some((chat_id, partner)) = only {
          self.open_chat(chat_id, partner).await?;
        }
      }
      KeyCode::Backspace => {
        self.filter.pop();
        self.list_cursor = 0;
      }
      KeyCode::Char(c) => {
        self.filter.push(c);
        self.list_cursor = 0;
      }
      _ => {}
    }
    Ok(true)
  }

  async fn handle_list_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_chats().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }

      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some((chat_id, partner)) = self.cursor_chat().map(|c| (c.chat.id, c.other.clone())) {
          self.open_chat(chat_id, partner).await?;
        }
      }

      KeyCode::Char('r') => {
        self.load_chats().await?;
      }

      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.list_cursor = 0;
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_conversation_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => self.back_to_list().await?,

      KeyCode::Enter => self.send_input().await,
      KeyCode::Backspace => {
        self.input.pop();
      }
      KeyCode::Char('l') if ctrl => self.toggle_like().await,
      KeyCode::Char('b') if ctrl => self.toggle_bookmark().await,
      KeyCode::Char(c) if !ctrl => self.input.push(c),

      KeyCode::Up => {
        if let Some(conv) = &mut self.conversation {
          conv.scroll += 1;
        }
      }
      KeyCode::Down => {
        if let Some(conv) = &mut self.conversation {
          conv.scroll = conv.scroll.saturating_sub(1);
        }
      }
      KeyCode::PageUp => self.load_older().await,

      _ => {}
    }
    Ok(true)
  }
}

/// Fuzzy-match chats on the partner's name and the latest message text.
fn filter_chats<'a>(chats: &'a [ChatSummary], query: &str) -> Vec<&'a ChatSummary> {
  if query.is_empty() {
    return chats.iter().collect();
  }
  let matcher = SkimMatcherV2::default();
  chats
    .iter()
    .filter(|c| {
      let name = c.other.as_ref().map(UserSummary::display_name).unwrap_or_default();
      let last = c.last_message.as_ref().map(|m| m.content.as_str()).unwrap_or_default();
      matcher.fuzzy_match(name, query).is_some() || matcher.fuzzy_match(last, query).is_some()
    })
    .collect()
}
