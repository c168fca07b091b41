//! Open conversation pane, right panel: message log above an input line.

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Paragraph},
};
use tandem_core::message::Message;
use uuid::Uuid;

use crate::{
  app::{App, Conversation, Screen},
  poll::lock_log,
};

pub fn draw(f: &mut Frame, area: Rect, app: &App, conv: &Conversation) {
  let [log, input] = Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

  draw_log(f, log, app, conv);
  draw_input(f, input, app);
}

fn draw_log(f: &mut Frame, area: Rect, app: &App, conv: &Conversation) {
  let partner = conv
    .partner
    .as_ref()
    .map(|p| p.display_name().to_string())
    .unwrap_or_else(|| "someone".into());

  let mut title = vec![Span::styled(
    format!(" {partner} "),
    Style::default().add_modifier(Modifier::BOLD),
  )];
  title.push(flag_span("♥", conv.liked.value(), conv.liked.is_pending(), Color::Red));
  title.push(Span::raw(" "));
  title.push(flag_span("★", conv.bookmarked.value(), conv.bookmarked.is_pending(), Color::Yellow));
  title.push(Span::raw(" "));

  let focused = app.screen == Screen::Conversation;
  let block = Block::bordered()
    .title(Line::from(title))
    .border_style(Style::default().fg(if focused { Color::Gray } else { Color::DarkGray }));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let me = app.me.as_ref().map(|u| u.id);
  let mut lines: Vec<Line> = Vec::new();
  if conv.has_more {
    lines.push(Line::from(Span::styled(
      "  PgUp for older messages",
      Style::default().fg(Color::DarkGray),
    )));
  }
  {
    let log = lock_log(&conv.log);
    for message in log.messages() {
      message_lines(message, me, &mut lines);
    }
  }

  let offset = scroll_offset(lines.len(), inner.height, conv.scroll);
  f.render_widget(Paragraph::new(lines).scroll((offset, 0)), inner);
}

/// First visible line of a bottom-anchored log of `total` lines, where
/// `scroll` counts lines up from the newest. Saturates at `u16::MAX`, the
/// furthest a `Paragraph` can scroll.
fn scroll_offset(total: usize, height: u16, scroll: usize) -> u16 {
  let offset = total.saturating_sub(usize::from(height)).saturating_sub(scroll);
  u16::try_from(offset).unwrap_or(u16::MAX)
}

fn flag_span(symbol: &'static str, on: bool, pending: bool, color: Color) -> Span<'static> {
  let mut style = if on { Style::default().fg(color) } else { Style::default().fg(Color::DarkGray) };
  if pending {
    style = style.add_modifier(Modifier::DIM);
  }
  Span::styled(symbol, style)
}

fn message_lines(message: &Message, me: Option<Uuid>, out: &mut Vec<Line<'static>>) {
  let time = message.created_at.with_timezone(&Local).format("%H:%M").to_string();

  if message.is_system_message {
    let style = Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC);
    for text in message.content.lines() {
      out.push(Line::from(Span::styled(format!("  ✦ {text}"), style)));
    }
    return;
  }

  let mine = me.is_some() && message.author_id == me;
  let (name, name_color) = if mine {
    ("you".to_string(), Color::Cyan)
  } else {
    let name = message
      .author
      .as_ref()
      .map(|a| a.display_name().to_string())
      .unwrap_or_else(|| "someone".into());
    (name, Color::Green)
  };

  let mut body = message.content.lines();
  out.push(Line::from(vec![
    Span::styled(format!("{time} "), Style::default().fg(Color::DarkGray)),
    Span::styled(name, Style::default().fg(name_color).add_modifier(Modifier::BOLD)),
    Span::raw(": "),
    Span::raw(body.next().unwrap_or_default().to_string()),
  ]));
  for rest in body {
    out.push(Line::from(format!("      {rest}")));
  }
}

fn draw_input(f: &mut Frame, area: Rect, app: &App) {
  let focused = app.screen == Screen::Conversation;
  let block = Block::bordered()
    .title(" Message ")
    .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));

  let text = if focused { format!("{}_", app.input) } else { app.input.clone() };
  f.render_widget(Paragraph::new(text).block(block), area);
}
