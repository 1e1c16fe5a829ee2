use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, Screen};
use crate::transcript::Role;

pub fn render(app: &mut App, frame: &mut Frame) {
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Settings => render_settings_screen(frame, body_area),
        Screen::Info => render_info_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.show_responder_picker {
        render_responder_picker(app, frame, frame.area());
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let tab = |label: &str, active: bool| {
        if active {
            Span::styled(
                format!(" {label} "),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!(" {label} "), Style::default().fg(Color::DarkGray))
        }
    };

    let title = Line::from(vec![
        Span::styled(
            " END OF LINE ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        tab("[1] Chat", app.screen == Screen::Chat),
        tab("[2] Settings", app.screen == Screen::Settings),
        tab("[3] Info", app.screen == Screen::Info),
    ]);

    let header = Paragraph::new(title)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);

    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = if app.show_responder_picker {
        " j/k navigate  Enter choose  Esc close ".to_string()
    } else {
        match (app.screen, app.input_mode) {
            (Screen::Chat, InputMode::Editing) => {
                " Enter send  Esc normal mode  Ctrl-C quit ".to_string()
            }
            (Screen::Chat, InputMode::Normal) => {
                " i compose  r responder  j/k scroll  1/2/3 pages  q quit ".to_string()
            }
            _ => " 1/2/3 pages  Esc back to chat  q quit ".to_string(),
        }
    };

    let footer = Paragraph::new(Span::styled(hints, Style::default().fg(Color::DarkGray)));
    frame.render_widget(footer, area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Responder: {} ", app.selected_responder));

    let chat_text = if app.transcript.is_empty() && !app.is_sending() {
        Text::from(Span::styled(
            "Speak, program… (Enter to send)",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.transcript.messages() {
            let (label, label_color) = match msg.role {
                Role::User => ("You", Color::Cyan),
                Role::Agent => ("Grid", Color::Yellow),
            };

            let mut label_spans = vec![
                Span::styled(
                    format!("{label}:"),
                    Style::default()
                        .fg(label_color)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  {}", msg.clock_time()),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if msg.pending {
                label_spans.push(Span::styled(
                    "  ⋯",
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.push(Line::from(label_spans));

            let body_style = if msg.pending {
                Style::default().add_modifier(Modifier::ITALIC)
            } else {
                Style::default()
            };
            for body_line in msg.text.lines() {
                lines.push(Line::from(Span::styled(
                    body_line.to_string(),
                    body_style,
                )));
            }
            lines.push(Line::default());
        }

        if app.is_sending() {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Transmitting{dots}"),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    // Composer at the bottom; the border signals whether a send is allowed
    let (input_color, input_title) = if app.is_sending() {
        (Color::DarkGray, " Transmitting… ")
    } else if app.input_mode == InputMode::Editing {
        (Color::Yellow, " Transmit (Enter) ")
    } else {
        (Color::DarkGray, " Transmit (i to compose) ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_color))
        .title(input_title);

    // Horizontal scroll keeps the cursor visible in a long line
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.composer.cursor();
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .composer
        .text()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, input_area);

    if app.input_mode == InputMode::Editing && !app.show_responder_picker {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_responder_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let width = 34.min(area.width);
    let height = ((app.responders.len() + 2) as u16).min(area.height);
    let popup = Rect {
        x: area.width.saturating_sub(width) / 2,
        y: area.height.saturating_sub(height) / 2,
        width,
        height,
    };

    let items: Vec<ListItem> = app
        .responders
        .iter()
        .map(|name| {
            let marker = if *name == app.selected_responder {
                "● "
            } else {
                "  "
            };
            ListItem::new(format!(" {marker}{name} "))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Choose responder "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_widget(Clear, popup);
    frame.render_stateful_widget(list, popup, &mut app.responder_picker_state);
}

fn render_settings_screen(frame: &mut Frame, area: Rect) {
    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "SETTINGS",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("Placeholder controls for future configuration."),
        Line::from("Coming soon: theme toggle, server URL, and agent options."),
        Line::default(),
        Line::from(Span::styled(
            "Tip: press 'r' on the chat page to pick a responder per message.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let page = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });

    frame.render_widget(page, area);
}

fn render_info_screen(app: &App, frame: &mut Frame, area: Rect) {
    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "INFO",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("A tiny Tron-style messenger for the Grid chat backend."),
        Line::from(
            "Messages are sent optimistically: they appear immediately and are",
        ),
        Line::from(
            "confirmed (or marked failed) once the backend answers.",
        ),
        Line::default(),
        Line::from(vec![
            Span::raw("Server: "),
            Span::styled(
                app.client.base_url().to_string(),
                Style::default().fg(Color::Yellow),
            ),
        ]),
    ]);

    let page = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });

    frame.render_widget(page, area);
}
