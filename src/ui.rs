use crate::model::Theme;
use crate::view::{Control, PlaylistView, RowView};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "Nitnem  ";
const KEY_HELP: &str =
    "p play  s stop  ←/h prev  →/l next  ↑/↓ move  Enter select  t theme  y copy  q quit";

/// Shell state that is drawn alongside the projected playlist.
pub struct ShellView<'a> {
    pub theme: Theme,
    pub cursor: usize,
    pub status: &'a str,
    pub busy: Option<Control>,
    pub backend_name: &'a str,
}

#[derive(Clone, Copy)]
struct ThemePalette {
    bg: Color,
    panel_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    done: Color,
    alert: Color,
    selected_bg: Color,
    disabled: Color,
}

fn palette(theme: Theme) -> ThemePalette {
    match theme {
        Theme::Light => ThemePalette {
            bg: Color::Rgb(246, 244, 238),
            panel_bg: Color::Rgb(255, 253, 248),
            border: Color::Rgb(196, 160, 92),
            text: Color::Rgb(38, 38, 46),
            muted: Color::Rgb(112, 112, 124),
            accent: Color::Rgb(28, 86, 160),
            done: Color::Rgb(40, 130, 72),
            alert: Color::Rgb(196, 102, 20),
            selected_bg: Color::Rgb(234, 226, 204),
            disabled: Color::Rgb(184, 184, 190),
        },
        Theme::Dark => ThemePalette {
            bg: Color::Rgb(10, 15, 24),
            panel_bg: Color::Rgb(19, 29, 43),
            border: Color::Rgb(69, 121, 176),
            text: Color::Rgb(214, 228, 248),
            muted: Color::Rgb(149, 173, 204),
            accent: Color::Rgb(100, 203, 184),
            done: Color::Rgb(126, 214, 132),
            alert: Color::Rgb(249, 174, 88),
            selected_bg: Color::Rgb(34, 55, 82),
            disabled: Color::Rgb(70, 84, 104),
        },
    }
}

pub fn draw(frame: &mut Frame, view: &PlaylistView, shell: &ShellView<'_>) {
    let colors = palette(shell.theme);
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, vertical[0], view, shell, &colors);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(vertical[1]);

    draw_rows(frame, body[0], view, shell.cursor, &colors);
    if view.complete {
        draw_completion(frame, body[1], &colors);
    } else {
        draw_now_playing(frame, body[1], view, &colors);
    }

    draw_controls(frame, vertical[2], view, shell.busy, &colors);

    let footer = Paragraph::new(vec![
        Line::from(Span::styled(shell.status, Style::default().fg(colors.alert))),
        Line::from(Span::styled(KEY_HELP, Style::default().fg(colors.muted))),
    ])
    .style(Style::default().bg(colors.bg));
    frame.render_widget(footer, vertical[3]);
}

fn draw_header(
    frame: &mut Frame,
    area: Rect,
    view: &PlaylistView,
    shell: &ShellView<'_>,
    colors: &ThemePalette,
) {
    frame.render_widget(
        panel_block("Status", colors.panel_bg, colors.text, colors.border),
        area,
    );

    let inner = area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(44), Constraint::Percentage(56)])
        .split(inner);

    let left = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(view.progress.as_str(), Style::default().fg(colors.text)),
    ]));
    frame.render_widget(left, chunks[0]);

    let right = Paragraph::new(Line::from(vec![
        Span::styled("output: ", Style::default().fg(colors.muted)),
        Span::styled(shell.backend_name, Style::default().fg(colors.text)),
        Span::styled("  theme: ", Style::default().fg(colors.muted)),
        Span::styled(shell.theme.label(), Style::default().fg(colors.text)),
    ]))
    .alignment(Alignment::Right);
    frame.render_widget(right, chunks[1]);
}

fn draw_rows(
    frame: &mut Frame,
    area: Rect,
    view: &PlaylistView,
    cursor: usize,
    colors: &ThemePalette,
) {
    let items: Vec<ListItem> = view
        .rows
        .iter()
        .map(|row| ListItem::new(row_line(row, colors)))
        .collect();

    let mut state = ListState::default();
    if !view.rows.is_empty() {
        state.select(Some(cursor.min(view.rows.len() - 1)));
    }

    let list = List::new(items)
        .block(panel_block("Playlist", colors.panel_bg, colors.text, colors.border))
        .highlight_style(Style::default().bg(colors.selected_bg))
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn row_line<'a>(row: &'a RowView, colors: &ThemePalette) -> Line<'a> {
    let (marker, marker_color) = if row.active {
        ("▶ ", colors.accent)
    } else if row.completed {
        ("✓ ", colors.done)
    } else {
        ("  ", colors.muted)
    };

    let title_style = if row.active {
        Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD)
    } else if row.completed {
        Style::default().fg(colors.done)
    } else {
        Style::default().fg(colors.text)
    };

    Line::from(vec![
        Span::styled(marker, Style::default().fg(marker_color)),
        Span::styled(format!("{:<9}", row.number), Style::default().fg(colors.muted)),
        Span::styled(row.title.as_str(), title_style),
    ])
}

fn draw_now_playing(frame: &mut Frame, area: Rect, view: &PlaylistView, colors: &ThemePalette) {
    let Some(row) = view.rows.iter().find(|row| row.active) else {
        frame.render_widget(
            panel_block("Now Playing", colors.panel_bg, colors.text, colors.border),
            area,
        );
        return;
    };

    let lines = vec![
        Line::from(Span::styled(
            row.title.as_str(),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            row.number.as_str(),
            Style::default().fg(colors.muted),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("source: ", Style::default().fg(colors.muted)),
            Span::styled(row.source.as_str(), Style::default().fg(colors.text)),
        ]),
    ];

    let panel = Paragraph::new(lines)
        .block(panel_block("Now Playing", colors.panel_bg, colors.text, colors.border))
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, area);
}

fn draw_completion(frame: &mut Frame, area: Rect, colors: &ThemePalette) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Nitnem Complete",
            Style::default().fg(colors.done).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press r to start again",
            Style::default().fg(colors.text),
        )),
    ];

    let panel = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(panel_block("Complete", colors.panel_bg, colors.text, colors.done));
    frame.render_widget(panel, area);
}

fn draw_controls(
    frame: &mut Frame,
    area: Rect,
    view: &PlaylistView,
    busy: Option<Control>,
    colors: &ThemePalette,
) {
    let controls = [
        (Control::Previous, "⏮ Previous"),
        (Control::Play, view.controls.play_label),
        (Control::Stop, "⏹ Stop"),
        (Control::Next, "Next ⏭"),
    ];

    let mut spans = Vec::with_capacity(controls.len() * 2);
    for (control, label) in controls {
        let style = if busy == Some(control) {
            Style::default()
                .fg(colors.alert)
                .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK)
        } else if view.controls.is_enabled(control) {
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(colors.disabled)
        };
        spans.push(Span::styled(format!("[ {label} ]"), style));
        spans.push(Span::raw("  "));
    }

    let bar = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(panel_block("Controls", colors.panel_bg, colors.text, colors.border));
    frame.render_widget(bar, area);
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}
