use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode, Page, Popup};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Applies a line-editing key to `text`. Returns false if the key is not an edit.
fn edit_text(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < text.chars().count() {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(text.chars().count()),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = text.chars().count(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::StreamFragment(fragment) => app.on_stream_fragment(&fragment)?,
        AppEvent::StreamFailed(reason) => app.on_stream_failed(&reason)?,
        AppEvent::StreamFinished => app.on_stream_finished(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    if app.popup.is_some() {
        return handle_popup(app, key);
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key)?,
        InputMode::Editing => handle_editing_mode(app, key)?,
    }

    Ok(())
}

fn handle_popup(app: &mut App, key: KeyEvent) -> Result<()> {
    match app.popup {
        Some(Popup::Notice(_)) => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                app.popup = None;
            }
        }
        Some(Popup::ConfirmClear) => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.popup = None;
                app.clear_history()?;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.popup = None,
            _ => {}
        },
        Some(Popup::AttachPath) => match key.code {
            KeyCode::Esc => app.popup = None,
            KeyCode::Enter => app.attach_from_prompt(),
            _ => {
                edit_text(&mut app.attach_input, &mut app.attach_cursor, key);
            }
        },
        None => {}
    }
    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    // Page switching
    let target = match key.code {
        KeyCode::Char('1') => Some(Page::Chat),
        KeyCode::Char('2') => Some(Page::HowToUse),
        KeyCode::Char('3') => Some(Page::Settings),
        KeyCode::Tab => Some(app.page.next()),
        KeyCode::BackTab => Some(app.page.prev()),
        KeyCode::Char('q') => {
            app.should_quit = true;
            return Ok(());
        }
        _ => None,
    };
    if let Some(page) = target {
        app.switch_page(page);
        return Ok(());
    }

    match app.page {
        Page::Chat => handle_chat_normal(app, key)?,
        Page::HowToUse => handle_help_normal(app, key),
        Page::Settings => handle_settings_normal(app, key)?,
    }
    Ok(())
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => {
            if !app.is_streaming() {
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Char('a') => app.open_attach_prompt(),
        KeyCode::Char('x') => {
            if !app.is_streaming() {
                app.composer.clear_attachment();
            }
        }
        KeyCode::Char('C') => {
            if !app.is_streaming() && !app.conversation.is_empty() {
                app.popup = Some(Popup::ConfirmClear);
            }
        }

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.half_page())
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.half_page())
        }
        KeyCode::PageDown => app.scroll_down(app.half_page()),
        KeyCode::PageUp => app.scroll_up(app.half_page()),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),
        _ => {}
    }
    Ok(())
}

fn handle_help_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.help_scroll = app.help_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.help_scroll = app.help_scroll.saturating_sub(1),
        KeyCode::Char('g') => app.help_scroll = 0,
        _ => {}
    }
}

fn handle_settings_normal(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('j') | KeyCode::Down => app.model_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_nav_up(),
        KeyCode::Char('s') => app.save_settings()?,
        KeyCode::Esc => app.reset_settings_form(),
        _ => {}
    }
    Ok(())
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match app.page {
        Page::Chat => handle_chat_editing(app, key)?,
        Page::Settings => match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Tab => app.input_mode = InputMode::Normal,
            _ => {
                edit_text(&mut app.api_key_input, &mut app.api_key_cursor, key);
            }
        },
        Page::HowToUse => app.input_mode = InputMode::Normal,
    }
    Ok(())
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) -> Result<()> {
    // The input is locked while a reply is streaming
    if app.is_streaming() {
        if key.code == KeyCode::Esc {
            app.input_mode = InputMode::Normal;
        }
        return Ok(());
    }

    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
            let byte_pos = char_to_byte_index(&app.composer.input, app.input_cursor);
            app.composer.input.insert(byte_pos, '\n');
            app.input_cursor += 1;
        }
        KeyCode::Enter => app.submit()?,
        _ => {
            edit_text(&mut app.composer.input, &mut app.input_cursor, key);
        }
    }
    Ok(())
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.page != Page::Chat || app.popup.is_some() {
        return;
    }
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
