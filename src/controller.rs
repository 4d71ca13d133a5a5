use crate::audio::AudioEngine;
use crate::input::{InputEvent, InputKind, InputSource, Key, ListenerId};
use crate::message::{InboundMessage, progress_percent};
use crate::model::{ButtonColors, MAX_VOLUME, MIN_VOLUME, OverlayConfig, Track};
use crate::reactive::Store;
use anyhow::{Result, bail};
use rand::{Rng, RngExt};
use serde_json::Value;
use tracing::{debug, info, warn};

const VOLUME_STEP: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetButton {
    Prev,
    Toggle,
    Next,
    Mute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Ignored,
    Handled,
    Consumed,
    Close,
}

pub struct OverlayController<A: AudioEngine> {
    store: Store<OverlayConfig, A>,
    audio: A,
    cursor: (u16, u16),
    progress: u8,
    listeners: Vec<ListenerId>,
    mounted: bool,
}

impl<A: AudioEngine + 'static> OverlayController<A> {
    pub fn new(mut config: OverlayConfig, audio: A) -> Result<Self> {
        if config.list.is_empty() {
            bail!("track list is empty; the overlay needs at least one track");
        }
        config.current = config.current.min(config.list.len() - 1);
        config.volume = config.volume.min(MAX_VOLUME);

        let mut store = Store::new(config);
        register_watchers(&mut store);

        Ok(Self {
            store,
            audio,
            cursor: (0, 0),
            progress: 0,
            listeners: Vec::new(),
            mounted: false,
        })
    }

    pub fn mount<R, I>(&mut self, rng: &mut R, input: &mut I)
    where
        R: Rng + ?Sized,
        I: InputSource + ?Sized,
    {
        if self.mounted {
            return;
        }

        let len = self.store.get().list.len();
        let start = rng.random_range(0..len);
        // Startup loads the source itself; the current watcher must not load
        // it a second time.
        self.store.update_untracked(|config| config.current = start);

        let config = self.store.get();
        let track = &config.list[start];
        info!(index = start, title = %track.title, "overlay mounted");
        if let Err(err) = self.audio.load(&track.music) {
            warn!(error = %format!("{err:#}"), "failed to load starting track");
        }
        self.audio.set_volume(f32::from(config.volume) / 100.0);
        self.audio.set_muted(config.muted);
        if config.play
            && let Err(err) = self.audio.play()
        {
            warn!(error = %format!("{err:#}"), "playback did not start");
        }

        self.listeners = [
            InputKind::PointerMove,
            InputKind::PointerDown,
            InputKind::KeyDown,
            InputKind::Message,
        ]
        .into_iter()
        .map(|kind| input.subscribe(kind))
        .collect();
        self.mounted = true;
    }

    pub fn unmount<I>(&mut self, input: &mut I)
    where
        I: InputSource + ?Sized,
    {
        for id in self.listeners.drain(..) {
            input.unsubscribe(id);
        }
        self.mounted = false;
        info!("overlay unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn config(&self) -> &OverlayConfig {
        self.store.get()
    }

    pub fn current_track(&self) -> &Track {
        let config = self.store.get();
        &config.list[config.current]
    }

    pub fn cursor(&self) -> (u16, u16) {
        self.cursor
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn button_color(&self) -> ButtonColors {
        ButtonColors::for_theme(self.store.get().dark)
    }

    pub fn toggle_music(&mut self) {
        self.store
            .update(&mut self.audio, |config| config.play = !config.play);
    }

    pub fn next_music(&mut self) {
        self.store.update(&mut self.audio, |config| {
            config.current = (config.current + 1) % config.list.len();
        });
    }

    pub fn prev_music(&mut self) {
        self.store.update(&mut self.audio, |config| {
            let len = config.list.len();
            config.current = (config.current + len - 1) % len;
        });
    }

    pub fn update_cursor(&mut self, x: u16, y: u16) {
        self.cursor = (x, y);
    }

    pub fn set_volume(&mut self, volume: u8) {
        let volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        self.store
            .update(&mut self.audio, |config| config.volume = volume);
    }

    pub fn toggle_mute(&mut self) {
        self.store
            .update(&mut self.audio, |config| config.muted = !config.muted);
    }

    pub fn press(&mut self, button: WidgetButton) {
        match button {
            WidgetButton::Prev => self.prev_music(),
            WidgetButton::Toggle => self.toggle_music(),
            WidgetButton::Next => self.next_music(),
            WidgetButton::Mute => self.toggle_mute(),
        }
    }

    pub fn handle_message(&mut self, value: &Value) {
        match InboundMessage::parse(value) {
            Some(InboundMessage::LoadProgress { load_fraction }) => {
                if let Some(percent) = progress_percent(load_fraction) {
                    self.progress = percent;
                }
            }
            None => debug!(message = %value, "ignoring unrecognised message"),
        }
    }

    pub fn handle_input(
        &mut self,
        event: &InputEvent,
        hit_test: impl Fn(u16, u16) -> Option<WidgetButton>,
    ) -> InputOutcome {
        match event {
            InputEvent::PointerMove { x, y } => {
                self.update_cursor(*x, *y);
                InputOutcome::Handled
            }
            InputEvent::PointerDown { x, y } => {
                self.update_cursor(*x, *y);
                match hit_test(*x, *y) {
                    Some(button) => {
                        self.press(button);
                        InputOutcome::Handled
                    }
                    None => InputOutcome::Ignored,
                }
            }
            InputEvent::KeyDown(key) => self.handle_key(*key),
            InputEvent::Message(value) => {
                self.handle_message(value);
                InputOutcome::Handled
            }
        }
    }

    fn handle_key(&mut self, key: Key) -> InputOutcome {
        match key {
            Key::Space => {
                self.toggle_music();
                InputOutcome::Consumed
            }
            Key::Right => {
                self.next_music();
                InputOutcome::Handled
            }
            Key::Left => {
                self.prev_music();
                InputOutcome::Handled
            }
            Key::Up => {
                let volume = self.config().volume.saturating_add(VOLUME_STEP);
                self.set_volume(volume);
                InputOutcome::Handled
            }
            Key::Down => {
                let volume = self.config().volume.saturating_sub(VOLUME_STEP);
                self.set_volume(volume);
                InputOutcome::Handled
            }
            Key::Char('m') => {
                self.toggle_mute();
                InputOutcome::Handled
            }
            Key::Interrupt | Key::Escape | Key::Char('q') => InputOutcome::Close,
            Key::Char(_) => InputOutcome::Ignored,
        }
    }

    pub fn tick(&mut self) {
        let config = self.store.get();
        if !self.mounted || !config.play || !config.auto_advance || !self.audio.is_finished() {
            return;
        }
        debug!(title = %self.current_track().title, "track finished");
        if config.list.len() > 1 {
            self.next_music();
            return;
        }

        // A one-track list never changes `current`, so replay it here.
        let music = self.current_track().music.clone();
        if let Err(err) = self.audio.load(&music) {
            warn!(error = %format!("{err:#}"), "failed to reload track");
            return;
        }
        if let Err(err) = self.audio.play() {
            warn!(error = %format!("{err:#}"), "playback did not start");
        }
    }
}

fn register_watchers<A: AudioEngine + 'static>(store: &mut Store<OverlayConfig, A>) {
    store.watch(
        |config| config.play,
        |play, _, audio: &mut A| {
            if *play {
                if let Err(err) = audio.play() {
                    warn!(error = %format!("{err:#}"), "playback did not start");
                }
            } else {
                audio.pause();
            }
        },
    );

    store.watch(
        |config| config.volume,
        |volume, config, audio: &mut A| {
            audio.set_volume(f32::from(*volume) / 100.0);
            config.muted = *volume == 0;
        },
    );

    store.watch(
        |config| config.muted,
        |muted, _, audio: &mut A| audio.set_muted(*muted),
    );

    store.watch(
        |config| config.current,
        |current, config, audio: &mut A| {
            let Some(track) = config.list.get(*current) else {
                return;
            };
            debug!(index = *current, title = %track.title, "switching track");
            if let Err(err) = audio.load(&track.music) {
                warn!(error = %format!("{err:#}"), "failed to load track");
                return;
            }
            if config.play
                && let Err(err) = audio.play()
            {
                warn!(error = %format!("{err:#}"), "playback did not start");
            }
        },
    );
}
