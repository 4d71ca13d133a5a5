use crate::artwork::ArtworkCache;
use crate::audio::{AudioEngine, NullAudioEngine, RodioAudioEngine};
use crate::config;
use crate::controller::{InputOutcome, OverlayController};
use crate::input::{InputSource, TerminalInput};
use crate::model::OverlayConfig;
use crate::ui;
use anyhow::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::prelude::Rect;
use std::io::{self, BufReader, IsTerminal, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(33);
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default)]
pub struct AppStartupOptions {
    pub config_path: Option<PathBuf>,
    pub force_mute: bool,
    pub debug: bool,
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let log_dir = config::ensure_config_dir()?;
    let _log_guard = crate::logging::init(&log_dir, options.debug)?;

    let mut overlay_config = config::load_config(options.config_path.as_deref())?;
    if options.force_mute {
        overlay_config.muted = true;
    }

    let audio = open_audio();
    let mut overlay = OverlayController::new(overlay_config, audio)?;

    // Loader messages come in on stdin when it is piped; crossterm reads the
    // keyboard from the controlling terminal in that case.
    let messages = (!io::stdin().is_terminal())
        .then(|| TerminalInput::spawn_line_reader(BufReader::new(io::stdin())));
    let mut input = TerminalInput::new(messages);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    terminal.hide_cursor()?;

    overlay.mount(&mut rand::rng(), &mut input);
    let result = run_loop(&mut terminal, &mut overlay, &mut input);
    overlay.unmount(&mut input);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

fn open_audio() -> Box<dyn AudioEngine> {
    match RodioAudioEngine::new() {
        Ok(engine) => {
            info!(output = ?engine.output_name(), "audio output ready");
            Box::new(engine)
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "no audio output; continuing silently");
            Box::new(NullAudioEngine::new())
        }
    }
}

pub fn run_loop<B, A, I>(
    terminal: &mut Terminal<B>,
    overlay: &mut OverlayController<A>,
    input: &mut I,
) -> Result<()>
where
    B: Backend,
    A: AudioEngine + 'static,
    I: InputSource + ?Sized,
{
    let mut artwork = ArtworkCache::default();
    let mut layout = ui::widget_layout(Rect::default());
    let mut dirty = true;
    let mut last_draw = Instant::now();

    loop {
        overlay.tick();

        if dirty || last_draw.elapsed() > REDRAW_INTERVAL {
            terminal
                .draw(|frame| {
                    layout = ui::widget_layout(frame.area());
                    ui::draw(frame, overlay, &mut artwork);
                })
                .map_err(|err| anyhow::anyhow!("failed to draw overlay: {err}"))?;
            dirty = false;
            last_draw = Instant::now();
        }

        let Some(event) = input.poll(POLL_INTERVAL)? else {
            continue;
        };

        match overlay.handle_input(&event, |x, y| layout.hit_test(x, y)) {
            InputOutcome::Close => return Ok(()),
            InputOutcome::Ignored => {}
            InputOutcome::Handled | InputOutcome::Consumed => dirty = true,
        }
    }
}

pub fn silent_overlay(config: OverlayConfig) -> Result<OverlayController<NullAudioEngine>> {
    OverlayController::new(config, NullAudioEngine::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputEvent, Key, ScriptedInput};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    #[test]
    fn scripted_session_runs_until_close() {
        let mut overlay = silent_overlay(OverlayConfig::default()).expect("overlay");
        let mut input = ScriptedInput::new([
            InputEvent::Message(json!({ "eventName": "loadProgress", "loadFraction": 0.75 })),
            InputEvent::PointerMove { x: 4, y: 3 },
            InputEvent::KeyDown(Key::Space),
            InputEvent::KeyDown(Key::Interrupt),
            InputEvent::KeyDown(Key::Space),
        ]);
        overlay.mount(&mut SmallRng::seed_from_u64(1), &mut input);

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).expect("terminal");
        run_loop(&mut terminal, &mut overlay, &mut input).expect("run loop");
        overlay.unmount(&mut input);

        assert_eq!(overlay.progress(), 75);
        assert_eq!(overlay.cursor(), (4, 3));
        assert!(!overlay.config().play);
        assert_eq!(input.pending(), 1);
        assert_eq!(input.listener_count(), 0);
    }

    #[test]
    fn click_on_next_button_switches_track() {
        let mut overlay = silent_overlay(OverlayConfig::default()).expect("overlay");
        let layout = ui::widget_layout(Rect::new(0, 0, 80, 24));
        let mut input = ScriptedInput::new([
            InputEvent::PointerDown {
                x: layout.next.x,
                y: layout.next.y,
            },
            InputEvent::KeyDown(Key::Escape),
        ]);
        overlay.mount(&mut SmallRng::seed_from_u64(3), &mut input);
        let start = overlay.config().current;

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).expect("terminal");
        run_loop(&mut terminal, &mut overlay, &mut input).expect("run loop");

        assert_eq!(overlay.config().current, (start + 1) % 2);
    }
}
