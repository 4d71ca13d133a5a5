use crate::artwork::ArtworkCache;
use crate::audio::AudioEngine;
use crate::controller::{OverlayController, WidgetButton};
use crate::model::{BackgroundMedia, Rgba};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use std::path::Path;

const WIDGET_WIDTH: u16 = 44;
const WIDGET_HEIGHT: u16 = 7;
const BUTTON_WIDTH: u16 = 5;
const CURSOR_SYMBOL: &str = "●";

#[derive(Clone, Copy)]
struct Palette {
    backdrop: (u8, u8, u8),
    text: Color,
    muted: Color,
    accent: Color,
}

fn palette(dark: bool, theme: [u8; 3], text: Rgba) -> Palette {
    let [r, g, b] = theme;
    let scale = |value: u8, factor: f32| (f32::from(value) * factor).round() as u8;
    let backdrop = if dark {
        (scale(r, 0.08), scale(g, 0.08), scale(b, 0.1))
    } else {
        (scale(r, 0.55), scale(g, 0.55), scale(b, 0.6))
    };
    let text_rgb = text.over(backdrop);
    let muted_rgb = Rgba::new(text.r, text.g, text.b, text.a * 0.55).over(backdrop);
    Palette {
        backdrop,
        text: rgb(text_rgb),
        muted: rgb(muted_rgb),
        accent: Color::Rgb(r, g, b),
    }
}

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(r, g, b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WidgetLayout {
    pub panel: Rect,
    pub cover: Rect,
    pub details: Rect,
    pub prev: Rect,
    pub toggle: Rect,
    pub next: Rect,
    pub mute: Rect,
    pub volume: Rect,
}

impl WidgetLayout {
    pub fn hit_test(&self, x: u16, y: u16) -> Option<WidgetButton> {
        [
            (self.prev, WidgetButton::Prev),
            (self.toggle, WidgetButton::Toggle),
            (self.next, WidgetButton::Next),
            (self.mute, WidgetButton::Mute),
        ]
        .into_iter()
        .find(|(rect, _)| point_in_rect(x, y, *rect))
        .map(|(_, button)| button)
    }
}

pub fn widget_layout(area: Rect) -> WidgetLayout {
    let width = WIDGET_WIDTH.min(area.width);
    let height = WIDGET_HEIGHT.min(area.height);
    let panel = Rect {
        x: area.x.saturating_add(1).min(area.right().saturating_sub(width)),
        y: area.bottom().saturating_sub(height.saturating_add(1)).max(area.y),
        width,
        height,
    };

    let inner = panel.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(8), Constraint::Min(10)])
        .split(inner);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(columns[1]);

    let controls = rows[2];
    let button = |index: u16| Rect {
        x: controls.x.saturating_add(index * (BUTTON_WIDTH + 1)),
        y: controls.y,
        width: BUTTON_WIDTH.min(controls.width.saturating_sub(index * (BUTTON_WIDTH + 1))),
        height: controls.height,
    };
    let after_buttons = 4 * (BUTTON_WIDTH + 1);

    WidgetLayout {
        panel,
        cover: columns[0],
        details: rows[0],
        prev: button(0),
        toggle: button(1),
        next: button(2),
        mute: button(3),
        volume: Rect {
            x: controls.x.saturating_add(after_buttons),
            y: controls.y,
            width: controls.width.saturating_sub(after_buttons),
            height: controls.height,
        },
    }
}

pub fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

pub fn draw<A: AudioEngine + 'static>(
    frame: &mut Frame,
    overlay: &OverlayController<A>,
    artwork: &mut ArtworkCache,
) {
    let config = overlay.config();
    let colors = palette(config.dark, config.theme, config.text_color);
    let area = frame.area();

    frame.render_widget(
        Block::default().style(Style::default().bg(rgb(colors.backdrop))),
        area,
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let logo_area = centered(vertical[1], logo_width(&config.logo_size, area.width));
    draw_logo(frame, logo_area, config.logo.as_deref(), colors);
    draw_progress(frame, vertical[3], overlay.progress(), colors);
    draw_widget(frame, overlay, artwork, colors);
    draw_background_note(frame, vertical[5], config.background.media(), colors);
    draw_cursor(frame, overlay.cursor(), colors);
}

// `logoSize` is a CSS length; `vw` and `%` scale with the terminal width,
// a bare number or `ch` is a column count.
fn logo_width(size: &str, total: u16) -> u16 {
    let size = size.trim();
    let percent = size
        .strip_suffix("vw")
        .or_else(|| size.strip_suffix('%'))
        .and_then(|value| value.trim().parse::<f32>().ok());
    let width = match percent {
        Some(percent) => (f32::from(total) * percent / 100.0).round() as u16,
        None => size
            .strip_suffix("ch")
            .unwrap_or(size)
            .trim()
            .parse::<u16>()
            .unwrap_or(total),
    };
    width.clamp(1, total.max(1)).min(total)
}

fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}

fn draw_logo(frame: &mut Frame, area: Rect, logo: Option<&Path>, colors: Palette) {
    let Some(logo) = logo else {
        return;
    };
    let name = logo
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_uppercase())
        .unwrap_or_default();
    let paragraph = Paragraph::new(Line::from(Span::styled(
        name,
        Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.accent)),
    );
    frame.render_widget(paragraph, area);
}

fn draw_progress(frame: &mut Frame, area: Rect, progress: u8, colors: Palette) {
    let bar = centered(area, (area.width / 2).max(10));
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.muted)),
        )
        .gauge_style(Style::default().fg(colors.accent).bg(rgb(colors.backdrop)))
        .percent(u16::from(progress))
        .label(Span::styled(
            format!("{progress}%"),
            Style::default().fg(colors.text),
        ));
    frame.render_widget(gauge, bar);
}

fn draw_widget<A: AudioEngine + 'static>(
    frame: &mut Frame,
    overlay: &OverlayController<A>,
    artwork: &mut ArtworkCache,
    colors: Palette,
) {
    let config = overlay.config();
    let layout = widget_layout(frame.area());
    let buttons = overlay.button_color();
    let (cursor_x, cursor_y) = overlay.cursor();

    frame.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.muted))
            .style(Style::default().bg(rgb(colors.backdrop))),
        layout.panel,
    );

    let track = overlay.current_track();
    let cover = artwork
        .accent(&track.image)
        .map(rgb)
        .unwrap_or(colors.accent);
    frame.render_widget(
        Block::default().style(Style::default().bg(cover)),
        layout.cover.inner(Margin {
            vertical: 0,
            horizontal: 1,
        }),
    );

    let details = Paragraph::new(vec![
        Line::from(Span::styled(
            track.title.clone(),
            Style::default()
                .fg(colors.text)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            track.author.clone(),
            Style::default().fg(colors.muted),
        )),
    ])
    .wrap(Wrap { trim: true });
    frame.render_widget(details, layout.details);

    let toggle_label = if config.play { "❚❚" } else { "▶" };
    let mute_label = if config.muted { "✕" } else { "♪" };
    for (rect, label, engaged) in [
        (layout.prev, "◀◀", false),
        (layout.toggle, toggle_label, config.play),
        (layout.next, "▶▶", false),
        (layout.mute, mute_label, config.muted),
    ] {
        let fill = if engaged {
            buttons.background_active
        } else if point_in_rect(cursor_x, cursor_y, rect) {
            buttons.background_hover
        } else {
            buttons.background
        };
        let button = Paragraph::new(label)
            .alignment(Alignment::Center)
            .style(
                Style::default()
                    .fg(colors.text)
                    .bg(rgb(fill.over(colors.backdrop))),
            );
        frame.render_widget(button, rect);
    }

    if layout.volume.width > 0 {
        let shown = if config.muted { 0 } else { config.volume };
        let filled = usize::from(layout.volume.width.saturating_sub(5))
            * usize::from(shown)
            / 100;
        let empty = usize::from(layout.volume.width.saturating_sub(5)) - filled;
        let bar = Line::from(vec![
            Span::styled(" ", Style::default()),
            Span::styled("━".repeat(filled), Style::default().fg(colors.accent)),
            Span::styled("─".repeat(empty), Style::default().fg(colors.muted)),
            Span::styled(format!("{:>3}", config.volume), Style::default().fg(colors.text)),
        ]);
        frame.render_widget(Paragraph::new(bar), layout.volume);
    }
}

fn draw_background_note(
    frame: &mut Frame,
    area: Rect,
    media: BackgroundMedia<'_>,
    colors: Palette,
) {
    let note = match media {
        BackgroundMedia::Image(path) => format!("background image: {}", path.display()),
        BackgroundMedia::Video(path) => format!("background video: {}", path.display()),
        BackgroundMedia::None => return,
    };
    let paragraph = Paragraph::new(Span::styled(note, Style::default().fg(colors.muted)))
        .alignment(Alignment::Right);
    frame.render_widget(paragraph, area);
}

fn draw_cursor(frame: &mut Frame, (x, y): (u16, u16), colors: Palette) {
    if !point_in_rect(x, y, frame.area()) {
        return;
    }
    if let Some(cell) = frame.buffer_mut().cell_mut((x, y)) {
        cell.set_symbol(CURSOR_SYMBOL).set_fg(colors.accent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudioEngine;
    use crate::model::OverlayConfig;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    #[test]
    fn buttons_sit_side_by_side_inside_the_panel() {
        let layout = widget_layout(Rect::new(0, 0, 100, 30));
        assert!(layout.prev.right() < layout.toggle.x);
        assert!(layout.toggle.right() < layout.next.x);
        assert!(layout.next.right() < layout.mute.x);
        for rect in [layout.prev, layout.toggle, layout.next, layout.mute] {
            assert!(point_in_rect(rect.x, rect.y, layout.panel));
        }
    }

    #[test]
    fn hit_test_finds_each_button() {
        let layout = widget_layout(Rect::new(0, 0, 100, 30));
        assert_eq!(
            layout.hit_test(layout.toggle.x, layout.toggle.y),
            Some(WidgetButton::Toggle)
        );
        assert_eq!(
            layout.hit_test(layout.mute.x + 1, layout.mute.y),
            Some(WidgetButton::Mute)
        );
        assert_eq!(layout.hit_test(0, 0), None);
    }

    #[test]
    fn logo_size_scales_with_terminal_width() {
        assert_eq!(logo_width("15vw", 100), 15);
        assert_eq!(logo_width("50%", 80), 40);
        assert_eq!(logo_width("12", 80), 12);
        assert_eq!(logo_width("20ch", 10), 10);
        assert_eq!(logo_width("large", 60), 60);
        assert_eq!(logo_width("0vw", 60), 1);
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let layout = widget_layout(Rect::new(0, 0, 6, 2));
        assert!(layout.panel.width <= 6);
        assert_eq!(layout.hit_test(3, 1), layout.hit_test(3, 1));
    }

    #[test]
    fn draws_progress_and_track_title() {
        let mut overlay =
            OverlayController::new(OverlayConfig::default(), NullAudioEngine::new()).expect("new");
        overlay.handle_message(&serde_json::json!({
            "eventName": "loadProgress",
            "loadFraction": 0.42,
        }));
        overlay.update_cursor(2, 2);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("terminal");
        let mut artwork = ArtworkCache::default();
        terminal
            .draw(|frame| draw(frame, &overlay, &mut artwork))
            .expect("draw");

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("42%"));
        assert!(text.contains("Party Monster"));
        assert!(text.contains("LOGO"));
        assert_eq!(buffer[(2, 2)].symbol(), CURSOR_SYMBOL);
    }
}
