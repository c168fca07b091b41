//! TUI rendering: header, chat list, open conversation, status bar.

pub mod chat_list;
pub mod conversation;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Paragraph},
};

use crate::app::{App, Screen};

/// Columns given to the chat list; the conversation takes the rest.
const CHAT_LIST_WIDTH: u16 = 34;

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Draw one frame.
pub fn draw(f: &mut Frame, app: &App) {
  let [header, body, status] =
    Layout::vertical([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
      .areas(f.area());

  draw_header(f, header, app);
  draw_body(f, body, app);
  draw_status(f, status, app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let who = app
    .me
    .as_ref()
    .map(|u| u.summary().display_name().to_string())
    .unwrap_or_default();
  let unread = app.unread_total();

  let mut left = format!(" tandem  {who}");
  if unread > 0 {
    left.push_str(&format!("  ({unread} unread)"));
  }
  let left = Span::styled(
    left,
    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
  );
  let right = Span::styled(
    format!("{} ", Local::now().format("%H:%M")),
    Style::default().fg(Color::Gray),
  );

  let pad = area
    .width
    .saturating_sub(left.width() as u16)
    .saturating_sub(right.width() as u16);
  let line = Line::from(vec![left, Span::raw(" ".repeat(pad as usize)), right]);

  f.render_widget(Paragraph::new(line).style(Style::default().bg(Color::DarkGray)), area);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body(f: &mut Frame, area: Rect, app: &App) {
  let [list, chat] =
    Layout::horizontal([Constraint::Length(CHAT_LIST_WIDTH), Constraint::Min(0)]).areas(area);

  chat_list::draw(f, list, app);

  match &app.conversation {
    Some(conv) => conversation::draw(f, chat, app, conv),
    None => {
      let hint = Paragraph::new("Select a chat and press Enter.")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::bordered().title(" Chat ").border_style(Style::default().fg(Color::DarkGray)));
      f.render_widget(hint, chat);
    }
  }
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let (mode_label, hints) = match app.screen {
    Screen::ChatList if app.filter_active => ("SEARCH", "Type to filter  Esc cancel  Enter open"),
    Screen::ChatList => ("CHATS", "↑↓/jk navigate  / search  Enter open  r refresh  q quit"),
    Screen::Conversation => (
      "CHAT",
      "Enter send  Esc back  ↑↓ scroll  PgUp older  ^L like  ^B bookmark",
    ),
  };

  let status = if app.status_msg.is_empty() { hints } else { app.status_msg.as_str() };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(format!("  {status}"), Style::default().fg(Color::DarkGray));

  f.render_widget(
    Paragraph::new(Line::from(vec![mode_span, hint_span])).style(Style::default().bg(Color::Black)),
    area,
  );
}
