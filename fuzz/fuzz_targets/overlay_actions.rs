#![no_main]

use libfuzzer_sys::fuzz_target;
use loadscreen::app::silent_overlay;
use loadscreen::input::{InputEvent, Key};
use loadscreen::model::{OverlayConfig, Track};
use std::path::PathBuf;

fuzz_target!(|data: &[u8]| {
    let len = (data.len() % 16).max(1);
    let config = OverlayConfig {
        list: (0..len)
            .map(|idx| Track {
                title: format!("track {idx}"),
                author: String::new(),
                music: PathBuf::from(format!("track_{idx}.mp3")),
                image: PathBuf::from(format!("track_{idx}.png")),
            })
            .collect(),
        ..OverlayConfig::default()
    };
    let Ok(mut overlay) = silent_overlay(config) else {
        return;
    };

    for byte in data {
        match byte % 8 {
            0 => overlay.next_music(),
            1 => overlay.prev_music(),
            2 => overlay.toggle_music(),
            3 => overlay.toggle_mute(),
            4 => overlay.set_volume(*byte),
            5 => {
                overlay.handle_input(&InputEvent::KeyDown(Key::Down), |_, _| None);
            }
            6 => overlay.handle_message(&serde_json::json!({
                "eventName": "loadProgress",
                "loadFraction": f64::from(*byte) / 200.0,
            })),
            _ => overlay.update_cursor(u16::from(*byte), u16::from(*byte)),
        }

        let config = overlay.config();
        assert!(config.current < config.list.len());
        assert!(config.volume <= 100);
        assert!(overlay.progress() <= 100);
    }
});
