//! Chat list pane, left panel.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use tandem_core::chat::ChatSummary;

use crate::app::{App, Screen};

/// Longest message preview shown under a chat's name.
const PREVIEW_CHARS: usize = 28;

/// Render the chat list into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let filtered = app.filtered_chats();
  let total = app.chats.len();

  let title = if app.filter_active || !app.filter.is_empty() {
    format!(" Chats ({}/{}) ", filtered.len(), total)
  } else {
    format!(" Chats ({total}) ")
  };

  let border = if app.screen == Screen::ChatList { Color::Gray } else { Color::DarkGray };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(border));

  let open = app.conversation.as_ref().map(|c| c.chat_id);
  let items: Vec<ListItem> = filtered
    .iter()
    .map(|summary| chat_item(summary, open == Some(summary.chat.id)))
    .collect();

  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  if (app.filter_active || !app.filter.is_empty()) && inner_area.height > 2 {
    let filter_area = Rect {
      x:      inner_area.x,
      y:      inner_area.y + inner_area.height - 1,
      width:  inner_area.width,
      height: 1,
    };
    inner_area.height = inner_area.height.saturating_sub(1);

    let filter_text = if app.filter_active {
      format!("/{}_", app.filter)
    } else {
      format!("/{}", app.filter)
    };
    f.render_widget(
      Paragraph::new(filter_text).style(Style::default().fg(Color::Yellow)),
      filter_area,
    );
  }

  let mut state = ListState::default();
  state.select(if filtered.is_empty() { None } else { Some(app.list_cursor) });

  f.render_stateful_widget(
    List::new(items).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    inner_area,
    &mut state,
  );
}

fn chat_item(summary: &ChatSummary, is_open: bool) -> ListItem<'static> {
  let name = summary
    .other
    .as_ref()
    .map(|u| u.display_name().to_string())
    .unwrap_or_else(|| "someone".into());

  let mut name_style = Style::default();
  if summary.unread > 0 || is_open {
    name_style = name_style.add_modifier(Modifier::BOLD);
  }

  let mut head = vec![Span::styled(name, name_style)];
  if summary.unread > 0 {
    head.push(Span::styled(
      format!("  {}", summary.unread),
      Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    ));
  }

  let preview = summary
    .last_message
    .as_ref()
    .map(|m| truncate(&m.content, PREVIEW_CHARS))
    .unwrap_or_default();

  ListItem::new(vec![
    Line::from(head),
    Line::from(Span::styled(format!("  {preview}"), Style::default().fg(Color::DarkGray))),
  ])
}

/// First line of `text`, cut to `max` characters with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
  let line = text.lines().next().unwrap_or_default();
  if line.chars().count() <= max && !text.contains('\n') {
    return line.to_string();
  }
  let cut: String = line.chars().take(max).collect();
  format!("{cut}…")
}
