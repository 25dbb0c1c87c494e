use groq_chat_core::models::{self, VISION_MODEL};
use groq_chat_core::{Attachment, Role};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, InputMode, Page, Popup};
use crate::markdown;

const HOW_TO_USE: &str = "\
1. Get an API key
   Create a free key at https://console.groq.com/keys

2. Save it
   Open Settings (press 3), press i to edit the key field, paste the key,
   press Enter, then s to save. Pick a model with j/k before saving.

3. Start chatting
   Go back to Chat (press 1), press i, type a message and press Enter.
   Replies stream in as they are generated. Alt+Enter inserts a new line.

4. Attach a file
   Press a on the Chat page and enter a path. Text files (.txt, .md, .csv,
   .json, source code) are pasted into your message. Images are sent as
   pictures. Any attachment switches that one message to the vision model.
   Press x to drop a pending attachment.

5. Housekeeping
   C clears the conversation (settings are kept). History and settings are
   stored locally and survive restarts. q or Ctrl+C quits.";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.page {
        Page::Chat => render_chat_page(app, frame, body_area),
        Page::HowToUse => render_how_to_use(app, frame, body_area),
        Page::Settings => render_settings_page(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    match app.popup.clone() {
        Some(Popup::Notice(message)) => render_notice(frame, area, &message),
        Some(Popup::ConfirmClear) => render_confirm_clear(frame, area),
        Some(Popup::AttachPath) => render_attach_prompt(app, frame, area),
        None => {}
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" Groq AI Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
    ];

    for (i, page) in Page::all().iter().enumerate() {
        let label = format!(" {} {} ", i + 1, page.title());
        let style = if *page == app.page {
            Style::default().bg(Color::Cyan).fg(Color::Black).bold()
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(label, style));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = match (app.page, app.input_mode) {
        _ if app.popup.is_some() => match app.popup {
            Some(Popup::ConfirmClear) => vec![("y", "clear"), ("n", "cancel")],
            Some(Popup::AttachPath) => vec![("Enter", "attach"), ("Esc", "cancel")],
            _ => vec![("Enter", "close")],
        },
        (Page::Chat, InputMode::Normal) => vec![
            ("i", "type"),
            ("a", "attach"),
            ("x", "drop file"),
            ("C", "clear"),
            ("j/k", "scroll"),
            ("1-3", "page"),
            ("q", "quit"),
        ],
        (Page::Chat, InputMode::Editing) => vec![
            ("Enter", "send"),
            ("Alt+Enter", "newline"),
            ("Esc", "done"),
        ],
        (Page::HowToUse, _) => vec![("j/k", "scroll"), ("1-3", "page"), ("q", "quit")],
        (Page::Settings, InputMode::Normal) => vec![
            ("i", "edit key"),
            ("j/k", "model"),
            ("s", "save"),
            ("Esc", "revert"),
            ("1-3", "page"),
            ("q", "quit"),
        ],
        (Page::Settings, InputMode::Editing) => vec![("Enter", "done"), ("Esc", "done")],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in pairs {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let messages = app.conversation.messages();

    for (i, msg) in messages.iter().enumerate() {
        match msg.role {
            Role::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            Role::Assistant => {
                lines.push(Line::from(Span::styled(
                    "AI:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                let waiting = app.is_streaming() && i + 1 == messages.len() && msg.content.is_empty();
                if waiting {
                    // Animated ellipsis: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("Thinking{}", dots),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                } else {
                    lines.extend(markdown::render(&msg.content));
                }
            }
        }
        lines.push(Line::default());
    }

    lines
}

fn render_chat_page(app: &mut App, frame: &mut Frame, area: Rect) {
    let badge_height = if app.composer.attachment.is_some() { 1 } else { 0 };
    let [chat_area, badge_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(badge_height),
        Constraint::Length(3),
    ])
    .areas(area);

    app.chat_area = Some(chat_area);

    let inner_width = chat_area.width.saturating_sub(2);
    let inner_height = chat_area.height.saturating_sub(2);
    app.chat_height = inner_height;

    let model = models::model_for_turn(app.settings.model(), app.composer.attachment.is_some());
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Groq: {} ", model));

    let chat = if app.conversation.is_empty() {
        app.chat_max_scroll = 0;
        app.chat_scroll = 0;
        Paragraph::new(Span::styled(
            "Start a conversation. Press i to type a message.",
            Style::default().fg(Color::DarkGray),
        ))
        .wrap(Wrap { trim: false })
    } else {
        // Count rows with the same word wrapping the paragraph renders with
        let paragraph = Paragraph::new(Text::from(chat_lines(app))).wrap(Wrap { trim: false });
        let total = u16::try_from(paragraph.line_count(inner_width)).unwrap_or(u16::MAX);
        app.chat_max_scroll = total.saturating_sub(inner_height);
        if app.follow_output {
            app.chat_scroll = app.chat_max_scroll;
        } else {
            app.chat_scroll = app.chat_scroll.min(app.chat_max_scroll);
        }
        paragraph
    };

    let chat = chat.block(chat_block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    if let Some(attachment) = &app.composer.attachment {
        let detail = match attachment {
            Attachment::Text { .. } => "text, added to message",
            Attachment::Image { mime_type, .. } | Attachment::Other { mime_type, .. } => mime_type.as_str(),
        };
        let label = format!(" 📎 {} ({}) ", attachment.name(), detail);
        let badge = Line::from(vec![
            Span::styled(label, Style::default().bg(Color::Magenta).fg(Color::White)),
            Span::styled(format!("  → {}", VISION_MODEL), Style::default().fg(Color::DarkGray)),
        ]);
        frame.render_widget(Paragraph::new(badge), badge_area);
    }

    render_chat_input(app, frame, input_area);
}

fn render_chat_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.is_streaming() {
        " Message (waiting for reply) "
    } else {
        " Message "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Newlines from attached text files are shown as a single glyph
    let visible_text: String = app
        .composer
        .input
        .chars()
        .map(|c| if c == '\n' { '⏎' } else { c })
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing && !app.is_streaming() && app.popup.is_none() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_how_to_use(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" How to use ");

    let lines: Vec<Line> = HOW_TO_USE
        .lines()
        .map(|line| {
            if line.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                Line::from(Span::styled(line, Style::default().fg(Color::Yellow).bold()))
            } else {
                Line::from(line)
            }
        })
        .collect();

    let max_scroll = (lines.len() as u16).saturating_sub(area.height.saturating_sub(2));
    app.help_scroll = app.help_scroll.min(max_scroll);

    let help = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.help_scroll, 0));
    frame.render_widget(help, area);
}

fn render_settings_page(app: &mut App, frame: &mut Frame, area: Rect) {
    let [info_area, key_area, models_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let label = Style::default().fg(Color::DarkGray);
    // Saved ids outside the catalogue are still sent as-is
    let current_model = match models::find(app.settings.model()) {
        Some(option) => option.display_name(),
        None => format!("{} (custom)", app.settings.model()),
    };
    let info = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Current API key: ", label),
            Span::styled(app.settings.masked_api_key(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::styled("Current model:   ", label),
            Span::styled(current_model, Style::default().fg(Color::Cyan)),
        ]),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Settings "),
    );
    frame.render_widget(info, info_area);

    // Key field, masked while typing
    let editing = app.input_mode == InputMode::Editing;
    let key_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Groq API key ");

    let inner_width = key_area.width.saturating_sub(2) as usize;
    let key_len = app.api_key_input.chars().count();
    let scroll_offset = (app.api_key_cursor + 1).saturating_sub(inner_width);
    let masked: String = "*".repeat(key_len.saturating_sub(scroll_offset).min(inner_width));
    let key_field = if key_len == 0 && !editing {
        Paragraph::new(Span::styled("Press i to enter your key", label))
    } else {
        Paragraph::new(masked).style(Style::default().fg(Color::Cyan))
    };
    frame.render_widget(key_field.block(key_block), key_area);

    if editing && app.popup.is_none() {
        let cursor_x = app.api_key_cursor.saturating_sub(scroll_offset).min(inner_width) as u16;
        frame.set_cursor_position((key_area.x + cursor_x + 1, key_area.y + 1));
    }

    // Model list
    let items: Vec<ListItem> = app
        .model_options()
        .iter()
        .map(|option| ListItem::new(format!(" {} ", option.display_name())))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Model (j/k to choose, s to save) "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, models_area, &mut app.model_state);
}

/// Centered popup area of the given size, clamped to the frame
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

fn render_notice(frame: &mut Frame, area: Rect, message: &str) {
    let popup = popup_area(area, 64, 7);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Notice ");

    let text = vec![
        Line::from(message.to_string()),
        Line::default(),
        Line::from(Span::styled("Press Enter to close", Style::default().fg(Color::DarkGray))),
    ];
    let notice = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(notice, popup);
}

fn render_confirm_clear(frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 50, 5);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear history ");

    let text = vec![
        Line::from("Delete all messages? Settings are kept."),
        Line::from(Span::styled("y to confirm, n to cancel", Style::default().fg(Color::DarkGray))),
    ];
    frame.render_widget(Paragraph::new(text).block(block), popup);
}

fn render_attach_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 70, 6);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Attach file ");
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let instructions = Paragraph::new("Path to a text file or image. Enter to attach, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let width = input_area.width as usize;
    let scroll_offset = (app.attach_cursor + 1).saturating_sub(width);
    let visible: String = app.attach_input.chars().skip(scroll_offset).take(width).collect();
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = app.attach_cursor.saturating_sub(scroll_offset).min(width) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}
