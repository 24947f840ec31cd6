use crate::model::MediaKind;
use crate::playback::PlaybackAdapter;
use crate::session::Session;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::time::Duration;
use time::OffsetDateTime;

const APP_TITLE: &str = "reel  ";

const BG: Color = Color::Rgb(10, 15, 24);
const PANEL_BG: Color = Color::Rgb(19, 29, 43);
const BORDER: Color = Color::Rgb(69, 121, 176);
const TEXT: Color = Color::Rgb(214, 228, 248);
const MUTED: Color = Color::Rgb(149, 173, 204);
const ACCENT: Color = Color::Rgb(100, 203, 184);
const ALERT: Color = Color::Rgb(249, 174, 88);

pub fn draw(
    frame: &mut Frame,
    session: &Session,
    player: &dyn PlaybackAdapter,
    now: OffsetDateTime,
    command_buffer: &str,
    command_mode: bool,
) {
    frame.render_widget(Block::default().style(Style::default().bg(BG)), frame.area());

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(session.kind.label(), Style::default().fg(ALERT)),
        Span::styled("  |  ", Style::default().fg(MUTED)),
        Span::styled(
            format!("Folder: {}", session.folder_label()),
            Style::default().fg(TEXT),
        ),
        Span::styled("  |  ", Style::default().fg(MUTED)),
        Span::styled(player.output_name(), Style::default().fg(MUTED)),
    ]))
    .block(panel_block("Status"));
    frame.render_widget(header, vertical[0]);

    let overlay = session.overlay(player, now);
    let state = session.playback_state(player);
    let mut lines: Vec<Line> = Vec::new();
    if session.scanning {
        lines.push(Line::styled("Scanning...", Style::default().fg(ALERT)));
    } else if session.cycle.is_empty() && session.folder().is_some() {
        lines.push(Line::styled(
            format!("No {} found", session.kind.item_noun()),
            Style::default().fg(ALERT),
        ));
    }
    lines.extend(overlay.lines(session.kind, state).into_iter().enumerate().map(
        |(idx, line)| {
            let style = if idx == 0 && !session.cycle.is_empty() {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(TEXT)
            };
            Line::styled(line, style)
        },
    ));
    let body_title = match session.kind {
        MediaKind::Audio => "Now Playing",
        MediaKind::Video => "Reel",
    };
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(panel_block(body_title)),
        vertical[1],
    );

    let bar_width = usize::from(vertical[2].width.saturating_sub(24)).max(10);
    frame.render_widget(
        Paragraph::new(Span::styled(
            timeline_line(player, bar_width),
            Style::default().fg(TEXT),
        ))
        .block(panel_block("Timeline")),
        vertical[2],
    );

    let footer = if command_mode {
        Line::from(vec![
            Span::styled(":", Style::default().fg(ACCENT)),
            Span::styled(command_buffer, Style::default().fg(TEXT)),
        ])
    } else {
        Line::from(vec![
            Span::styled(session.status.as_str(), Style::default().fg(TEXT)),
            Span::styled(
                "  n/p next/prev  space pause  s stop  r rescan  : command  q quit",
                Style::default().fg(MUTED),
            ),
        ])
    };
    frame.render_widget(
        Paragraph::new(footer).block(panel_block("Controls")),
        vertical[3],
    );
}

fn panel_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(TEXT).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(BORDER))
        .style(Style::default().bg(PANEL_BG))
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
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

fn timeline_line(player: &dyn PlaybackAdapter, bar_width: usize) -> String {
    let elapsed = player.position().unwrap_or(Duration::ZERO);
    let total = player.duration();
    let ratio = total.and_then(|duration| {
        let total_secs = duration.as_secs_f64();
        (total_secs > 0.0).then_some((elapsed.as_secs_f64() / total_secs).clamp(0.0, 1.0))
    });

    format!(
        "{} / {} {}",
        format_duration(elapsed),
        total
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, bar_width),
    )
}
