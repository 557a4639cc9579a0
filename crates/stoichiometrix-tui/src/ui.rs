use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
};
use stoichiometrix_core::{MessageBody, Sender};

use crate::app::{App, HitTarget, InputMode, WelcomeField};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        match after.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after[end + 2..];
            }
            // No closing ** (or nothing between), treat as literal
            _ => break,
        }
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    app.hit_areas.clear();
    app.chat_area = None;

    if !app.container_open {
        render_bubble(app, frame, area);
    } else {
        // Container layout: header, body, footer
        let [header_area, body_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(area);

        render_header(app, frame, header_area);
        if header_area.width >= 3 {
            let close_area = Rect::new(header_area.right() - 3, header_area.y, 3, 1);
            frame.render_widget(
                Paragraph::new("[x]").style(Style::default().bg(Color::DarkGray).fg(Color::White)),
                close_area,
            );
            app.hit_areas.push((close_area, HitTarget::Close));
        }
        if app.welcome_visible {
            render_welcome(app, frame, body_area);
        } else {
            render_chat(app, frame, body_area);
        }
        render_footer(app, frame, footer_area);
    }

    if let Some(alert) = &app.alert {
        render_alert(alert, frame, area);
    }
}

fn render_bubble(app: &mut App, frame: &mut Frame, area: Rect) {
    let width = 30.min(area.width);
    let height = 3.min(area.height);
    let bubble_area = Rect::new(
        area.x + area.width.saturating_sub(width + 1),
        area.y + area.height.saturating_sub(height + 1),
        width,
        height,
    );

    let bubble = Paragraph::new(Line::from(vec![
        Span::styled(" Stoichiometry Buddy ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled("⏎", Style::default().fg(Color::DarkGray)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(bubble, bubble_area);
    app.hit_areas.push((bubble_area, HitTarget::Bubble));
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Stoichiometry Buddy ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled(format!("[{}]", app.model_name), Style::default().fg(Color::Black)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Black),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {key} "), key_style),
            Span::styled(format!(" {label} "), label_style),
        ]
    };

    let (mode_text, mode_style, hints): (&str, Style, Vec<[Span; 2]>) = if app.welcome_visible {
        (
            " WELCOME ",
            Style::default().bg(Color::Magenta).fg(Color::White),
            vec![hint("Tab", "next field"), hint("Enter", "start learning"), hint("Esc", "close")],
        )
    } else {
        match app.input_mode {
            InputMode::Editing => (
                " TYPE ",
                Style::default().bg(Color::Yellow).fg(Color::Black),
                vec![hint("Enter", "send"), hint("Esc", "stop typing")],
            ),
            InputMode::Normal => {
                let mut hints = Vec::new();
                if app.button_count() > 0 {
                    hints.push(hint("←/→", "choose"));
                    hints.push(hint("Enter", "press"));
                }
                hints.extend([
                    hint("i", "type"),
                    hint("j/k", "scroll"),
                    hint("Esc", "close"),
                    hint("q", "quit"),
                ]);
                (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White), hints)
            }
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints.into_iter().flatten())
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_welcome(app: &App, frame: &mut Frame, area: Rect) {
    let [intro_area, nickname_area, age_area, start_area, _] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(2),
        Constraint::Min(0),
    ])
    .areas(area);

    let intro = Paragraph::new(Text::from(vec![
        Line::from(Span::styled(
            "Welcome to your Stoichiometry Buddy!",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from("Tell me a little about yourself so we can start learning."),
    ]))
    .block(Block::default().borders(Borders::NONE))
    .wrap(Wrap { trim: true });
    frame.render_widget(intro, intro_area);

    let field = |title: &'static str, value: &str, focused: bool| {
        let border_color = if focused { Color::Yellow } else { Color::DarkGray };
        Paragraph::new(value.to_string())
            .style(Style::default().fg(Color::Cyan))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border_color))
                    .title(title),
            )
    };

    let nickname_focused = app.welcome_field == WelcomeField::Nickname;
    frame.render_widget(field(" Nickname ", &app.nickname_input, nickname_focused), nickname_area);
    frame.render_widget(field(" Age ", &app.age_input, !nickname_focused), age_area);

    let start = Paragraph::new(Line::from(Span::styled(
        " [ Start Learning ] ",
        Style::default().bg(Color::Cyan).fg(Color::Black).add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(start, Rect::new(start_area.x, start_area.y + 1, start_area.width, 1));

    // Cursor at the end of the focused field
    let (focused_area, value) = if nickname_focused {
        (nickname_area, &app.nickname_input)
    } else {
        (age_area, &app.age_input)
    };
    let max_x = focused_area.width.saturating_sub(2);
    let cursor_x = (value.chars().count() as u16).min(max_x);
    frame.set_cursor_position((focused_area.x + cursor_x + 1, focused_area.y + 1));
}

/// A rendered button's position within the chat text, before scrolling
struct ButtonSlot {
    line: usize,
    col: u16,
    width: u16,
    index: usize,
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area for mouse hit-testing and its inner size for scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_focused = app.input_mode == InputMode::Normal;
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if chat_focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Chat ");
    let inner = chat_block.inner(chat_area);

    let user_label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let bot_label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    // Text is wrapped here rather than by the Paragraph so button rows are known exactly
    let wrap_width = usize::from(inner.width.max(1));
    let wrap = |text: &str| -> Vec<String> {
        text.lines()
            .flat_map(|line| textwrap::wrap(line, wrap_width))
            .map(|line| line.into_owned())
            .collect()
    };

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut slots: Vec<ButtonSlot> = Vec::new();
    let mut button_idx = 0usize;

    for entry in &app.messages {
        match entry.sender {
            Sender::User => lines.push(Line::from(Span::styled("You:", user_label))),
            Sender::Bot => lines.push(Line::from(Span::styled("Buddy:", bot_label))),
        }

        match &entry.body {
            MessageBody::Text(text) => match entry.sender {
                Sender::User => lines.extend(wrap(text).into_iter().map(Line::from)),
                Sender::Bot => lines.extend(wrap(text).iter().map(|l| parse_markdown_line(l))),
            },
            MessageBody::Buttons(buttons) => {
                let mut row: Vec<Span<'static>> = Vec::new();
                let mut col: u16 = 0;
                for button in buttons {
                    let selected = app.selected_button == Some(button_idx);
                    let style = if selected && chat_focused {
                        Style::default().bg(Color::Magenta).fg(Color::White).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(Color::Magenta)
                    };
                    let span = Span::styled(format!("[ {} ]", button.label), style);
                    let width = u16::try_from(span.width()).unwrap_or(u16::MAX);

                    // Flow onto a new row when the button doesn't fit
                    if col > 0 && col.saturating_add(width) > inner.width {
                        lines.push(Line::from(std::mem::take(&mut row)));
                        col = 0;
                    }
                    slots.push(ButtonSlot {
                        line: lines.len(),
                        col,
                        width,
                        index: button_idx,
                    });
                    row.push(span);
                    row.push(Span::raw(" "));
                    col = col.saturating_add(width).saturating_add(1);
                    button_idx += 1;
                }
                lines.push(Line::from(row));
            }
        }
        lines.push(Line::default());
    }

    if app.typing {
        lines.push(Line::from(Span::styled("Buddy:", bot_label)));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            dots,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Only buttons inside the visible window are clickable
    let scroll = usize::from(app.chat_scroll);
    for slot in slots {
        let Some(row) = slot.line.checked_sub(scroll) else {
            continue;
        };
        if row >= usize::from(inner.height) || slot.col >= inner.width {
            continue;
        }
        let rect = Rect::new(
            inner.x + slot.col,
            inner.y + row as u16,
            slot.width.min(inner.width - slot.col),
            1,
        );
        app.hit_areas.push((rect, HitTarget::Button(slot.index)));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, input_area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let title = if app.session.is_busy() {
        " Buddy is thinking... "
    } else {
        " Message (i to type, Enter to send) "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_alert(text: &str, frame: &mut Frame, area: Rect) {
    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 5.min(area.height);
    let popup_area = Rect::new(
        area.x + (area.width.saturating_sub(popup_width)) / 2,
        area.y + (area.height.saturating_sub(popup_height)) / 2,
        popup_width,
        popup_height,
    );

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let popup = Paragraph::new(Text::from(vec![
        Line::from(text.to_string()),
        Line::default(),
        Line::from(Span::styled("Enter to dismiss", Style::default().fg(Color::DarkGray))),
    ]))
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Notice "),
    );
    frame.render_widget(popup, popup_area);
}
