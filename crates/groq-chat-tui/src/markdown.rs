use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Render markdown from an assistant reply into styled terminal lines.
///
/// Headings are shown as bold text rather than at a larger size. Code blocks
/// keep their line breaks. Anything the terminal can't express (links,
/// images, html) falls back to its plain text.
pub fn render(text: &str) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_TABLES);

    let mut renderer = Renderer::default();
    for event in Parser::new_ext(text, options) {
        renderer.event(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    // None for bullet lists, Some(next number) for ordered ones
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
    // Cells already written on the current table row
    table_cells: usize,
}

impl Renderer {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, modifier: Modifier, fg: Option<Color>) {
        let mut style = self.style().add_modifier(modifier);
        if let Some(color) = fg {
            style = style.fg(color);
        }
        self.styles.push(style);
    }

    fn push_text(&mut self, text: String) {
        if self.current.is_empty() && self.quote_depth > 0 {
            self.current.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ));
        }
        let style = self.style();
        self.current.push(Span::styled(text, style));
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    /// Blank line between blocks, never at the top or doubled
    fn block_gap(&mut self) {
        self.flush();
        if self.lines.last().map(|l| !l.spans.is_empty()).unwrap_or(false) && self.lists.is_empty() {
            self.lines.push(Line::default());
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    let style = Style::default().fg(Color::Green);
                    for (i, line) in text.split('\n').enumerate() {
                        if i > 0 {
                            self.flush();
                        }
                        if !line.is_empty() {
                            self.current.push(Span::styled(format!("  {}", line), style));
                        }
                    }
                } else {
                    self.push_text(text.into_string());
                }
            }
            Event::Code(code) => {
                let style = self.style().fg(Color::Green);
                self.current.push(Span::styled(format!("`{}`", code), style));
            }
            Event::SoftBreak => self.push_text(" ".to_string()),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.block_gap();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            Event::TaskListMarker(done) => {
                self.push_text(if done { "[x] " } else { "[ ] " }.to_string());
            }
            Event::Html(html) => self.push_text(html.into_string()),
            Event::FootnoteReference(name) => self.push_text(format!("[{}]", name)),
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.block_gap();
                }
            }
            Tag::Heading(..) => {
                self.block_gap();
                self.push_style(Modifier::BOLD, None);
            }
            Tag::BlockQuote => {
                self.block_gap();
                self.quote_depth += 1;
                self.push_style(Modifier::ITALIC, None);
            }
            Tag::CodeBlock(kind) => {
                self.block_gap();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::from(Span::styled(
                            format!("  {}", lang),
                            Style::default().fg(Color::DarkGray),
                        )));
                    }
                }
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_gap();
                } else {
                    self.flush();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                self.current.push(Span::styled(marker, Style::default().fg(Color::Yellow)));
            }
            Tag::Emphasis => self.push_style(Modifier::ITALIC, None),
            Tag::Strong => self.push_style(Modifier::BOLD, None),
            Tag::Strikethrough => self.push_style(Modifier::CROSSED_OUT, None),
            Tag::Link(..) => self.push_style(Modifier::UNDERLINED, Some(Color::Cyan)),
            Tag::Table(_) => self.block_gap(),
            Tag::TableHead => {
                self.flush();
                self.table_cells = 0;
                self.push_style(Modifier::BOLD, None);
            }
            Tag::TableRow => {
                self.flush();
                self.table_cells = 0;
            }
            Tag::TableCell => {
                if self.table_cells > 0 {
                    self.current.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
                }
            }
            Tag::Image(..) | Tag::FootnoteDefinition(_) => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.flush(),
            Tag::Heading(..) => {
                self.styles.pop();
                self.flush();
            }
            Tag::BlockQuote => {
                self.styles.pop();
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.in_code_block = false;
            }
            Tag::List(_) => {
                self.flush();
                self.lists.pop();
            }
            Tag::Item => self.flush(),
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link(..) => {
                self.styles.pop();
            }
            Tag::TableCell => self.table_cells += 1,
            Tag::TableHead => {
                self.styles.pop();
                self.flush();
                let width = self.lines.last().map(|l| l.width()).unwrap_or(0);
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(width),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            Tag::TableRow | Tag::Table(_) => self.flush(),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_heading_is_bold_text() {
        let lines = render("# Title\n\nBody text");
        assert_eq!(plain(&lines[0]), "Title");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(plain(&lines[1]), "");
        assert_eq!(plain(&lines[2]), "Body text");
    }

    #[test]
    fn test_inline_styles() {
        let lines = render("plain **bold** *it* ~~gone~~ `code`");
        assert_eq!(lines.len(), 1);
        let spans = &lines[0].spans;
        let bold = spans.iter().find(|s| s.content == "bold").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let italic = spans.iter().find(|s| s.content == "it").unwrap();
        assert!(italic.style.add_modifier.contains(Modifier::ITALIC));
        let struck = spans.iter().find(|s| s.content == "gone").unwrap();
        assert!(struck.style.add_modifier.contains(Modifier::CROSSED_OUT));
        assert!(spans.iter().any(|s| s.content == "`code`"));
    }

    #[test]
    fn test_lists_get_markers() {
        let lines = render("- one\n- two\n\n1. first\n2. second");
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert!(text.contains(&"• one".to_string()));
        assert!(text.contains(&"• two".to_string()));
        assert!(text.contains(&"1. first".to_string()));
        assert!(text.contains(&"2. second".to_string()));
    }

    #[test]
    fn test_code_block_keeps_lines() {
        let lines = render("```rust\nfn main() {\n    run();\n}\n```");
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text, vec!["  rust", "  fn main() {", "      run();", "  }"]);
    }

    #[test]
    fn test_table_rows_join_cells() {
        let lines = render("| Model | Vision |\n|---|---|\n| gpt-oss | no |\n| maverick | yes |");
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(
            text,
            vec!["Model │ Vision", "──────────────", "gpt-oss │ no", "maverick │ yes"]
        );
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_partial_markdown_while_streaming() {
        // An unterminated emphasis mid-stream renders as literal text
        let lines = render("Hello **wor");
        assert_eq!(plain(&lines[0]), "Hello **wor");
    }

    #[test]
    fn test_empty_input() {
        assert!(render("").is_empty());
    }
}
