use crate::core::{PlaybackPhase, PlayerCore};
use crate::model::Theme;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "Sanyatify  ";

#[derive(Clone, Copy)]
struct ThemePalette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    badge: Color,
    selected_bg: Color,
}

fn palette(theme: Theme) -> ThemePalette {
    match theme {
        Theme::Light => ThemePalette {
            bg: Color::Rgb(253, 246, 250),
            panel_bg: Color::Rgb(255, 255, 255),
            panel_alt_bg: Color::Rgb(255, 235, 243),
            border: Color::Rgb(255, 195, 224),
            text: Color::Rgb(45, 41, 48),
            muted: Color::Rgb(130, 120, 128),
            accent: Color::Rgb(230, 0, 95),
            badge: Color::Rgb(255, 107, 157),
            selected_bg: Color::Rgb(255, 214, 231),
        },
        Theme::Dark => ThemePalette {
            bg: Color::Rgb(20, 12, 17),
            panel_bg: Color::Rgb(34, 22, 29),
            panel_alt_bg: Color::Rgb(46, 28, 38),
            border: Color::Rgb(138, 55, 90),
            text: Color::Rgb(244, 232, 239),
            muted: Color::Rgb(168, 142, 156),
            accent: Color::Rgb(255, 107, 157),
            badge: Color::Rgb(230, 0, 95),
            selected_bg: Color::Rgb(74, 33, 52),
        },
    }
}

pub fn playlist_rect(area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
        .split(vertical[1]);

    body[0]
}

pub fn draw(frame: &mut Frame, core: &PlayerCore) {
    let colors = palette(core.theme);
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
        ])
        .split(frame.area());

    draw_header(frame, core, &colors, vertical[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
        .split(vertical[1]);

    draw_playlist(frame, core, &colors, body[0]);
    draw_player(frame, core, &colors, body[1]);
    draw_links(frame, core, &colors, body[2]);
    draw_footer(frame, core, &colors, vertical[2]);
}

fn draw_header(frame: &mut Frame, core: &PlayerCore, colors: &ThemePalette, area: Rect) {
    frame.render_widget(
        panel_block("Status", colors.panel_bg, colors.text, colors.border),
        area,
    );

    let inner = area.inner(Margin {
        vertical: 0,
        horizontal: 1,
    });
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(inner);

    let left = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Tracks {}", core.playlist().len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            if core.state().is_repeat {
                "Repeat on"
            } else {
                "Repeat off"
            },
            Style::default().fg(colors.badge),
        ),
    ]));
    frame.render_widget(left, chunks[0]);

    let right = Paragraph::new(Span::styled(
        "t switches theme",
        Style::default().fg(colors.muted),
    ))
    .alignment(Alignment::Right);
    frame.render_widget(right, chunks[1]);
}

fn draw_playlist(frame: &mut Frame, core: &PlayerCore, colors: &ThemePalette, area: Rect) {
    let state = core.state();
    let items: Vec<ListItem> = core
        .playlist()
        .tracks()
        .iter()
        .enumerate()
        .map(|(idx, track)| {
            let is_current = idx == state.current_index;
            let marker = if is_current { "  > " } else { "    " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(
                    format!("{}  {}", track.id, track.title),
                    if is_current {
                        Style::default()
                            .fg(colors.accent)
                            .add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(colors.text)
                    },
                ),
            ];
            if is_current && state.is_playing {
                spans.push(Span::styled(
                    "  Now Playing",
                    Style::default()
                        .fg(colors.badge)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut list_state = ListState::default();
    list_state.select(Some(core.selected));

    let list = List::new(items)
        .block(panel_block(
            "Playlist",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_player(frame: &mut Frame, core: &PlayerCore, colors: &ThemePalette, area: Rect) {
    let state = core.state();
    let track = core.playlist().current_track();

    let transport = match core.phase() {
        PlaybackPhase::Playing => "Playing",
        PlaybackPhase::Paused => "Paused",
        PlaybackPhase::Loading => "Loading",
        PlaybackPhase::Idle => "Idle",
    };

    let ratio = (state.duration > 0.0).then(|| state.current_time / state.duration);
    let volume_percent = (state.volume * 100.0).round() as u16;

    let lines = vec![
        Line::from(Span::styled(
            track.title.clone(),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("Track {} / {}", state.current_index + 1, core.playlist().len()),
            Style::default().fg(colors.muted),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "{} {} {}",
                format_time(state.current_time),
                progress_bar(ratio, 24),
                format_time(state.duration),
            ),
            Style::default().fg(colors.text),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(transport, Style::default().fg(colors.badge)),
            Span::styled(
                if state.is_repeat { "  |  repeat" } else { "" },
                Style::default().fg(colors.muted),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!("Vol {} {:>3}%", progress_bar(Some(state.volume), 14), volume_percent),
            Style::default().fg(colors.text),
        )),
    ];

    let player = Paragraph::new(lines)
        .block(panel_block(
            "Player",
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(player, area);
}

fn draw_links(frame: &mut Frame, core: &PlayerCore, colors: &ThemePalette, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(6)])
        .split(area);

    let mut lines = Vec::new();
    for link in core.links() {
        lines.push(Line::from(Span::styled(
            link.label.clone(),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            link.url.clone(),
            Style::default().fg(colors.muted),
        )));
        lines.push(Line::from(""));
    }
    let links = Paragraph::new(lines)
        .block(panel_block(
            "関連リンク",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(links, chunks[0]);

    let about = Paragraph::new(vec![
        Line::from(Span::styled("Built with", Style::default().fg(colors.muted))),
        Line::from(Span::styled("ratatui + rodio", Style::default().fg(colors.text))),
        Line::from(Span::styled("crossterm", Style::default().fg(colors.text))),
    ])
    .block(panel_block(
        "About",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(about, chunks[1]);
}

fn draw_footer(frame: &mut Frame, core: &PlayerCore, colors: &ThemePalette, area: Rect) {
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            "Keys: Space play/pause, n next, b previous, Enter select, Left/Right seek, +/- volume, r repeat, q quit",
            Style::default().fg(colors.muted),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(core.status.as_str(), Style::default().fg(colors.text)),
    ]))
    .block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, area);
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

fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return String::from("0:00");
    }
    let total = seconds as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}
