use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

pub const MIN_VOLUME: u8 = 0;
pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub author: String,
    pub music: PathBuf,
    pub image: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct Background {
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub video: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMedia<'a> {
    Image(&'a PathBuf),
    Video(&'a PathBuf),
    None,
}

impl Background {
    pub fn media(&self) -> BackgroundMedia<'_> {
        match (&self.image, &self.video) {
            (Some(image), _) => BackgroundMedia::Image(image),
            (None, Some(video)) => BackgroundMedia::Video(video),
            (None, None) => BackgroundMedia::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn over(self, backdrop: (u8, u8, u8)) -> (u8, u8, u8) {
        let alpha = self.a.clamp(0.0, 1.0);
        let mix = |top: u8, bottom: u8| -> u8 {
            (f32::from(top) * alpha + f32::from(bottom) * (1.0 - alpha)).round() as u8
        };
        (
            mix(self.r, backdrop.0),
            mix(self.g, backdrop.1),
            mix(self.b, backdrop.2),
        )
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonColors {
    pub background: Rgba,
    pub background_hover: Rgba,
    pub background_active: Rgba,
}

pub const DARK_BUTTONS: ButtonColors = ButtonColors {
    background: Rgba::new(0, 0, 0, 0.3),
    background_hover: Rgba::new(0, 0, 0, 0.5),
    background_active: Rgba::new(0, 0, 0, 0.6),
};

pub const LIGHT_BUTTONS: ButtonColors = ButtonColors {
    background: Rgba::new(255, 255, 255, 0.05),
    background_hover: Rgba::new(255, 255, 255, 0.1),
    background_active: Rgba::new(255, 255, 255, 0.15),
};

impl ButtonColors {
    pub fn for_theme(dark: bool) -> Self {
        if dark { DARK_BUTTONS } else { LIGHT_BUTTONS }
    }

    pub fn css_variables(&self) -> [(&'static str, String); 3] {
        [
            ("--button-background", self.background.to_string()),
            ("--button-background-hover", self.background_hover.to_string()),
            (
                "--button-background-active",
                self.background_active.to_string(),
            ),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayConfig {
    #[serde(default = "default_dark")]
    pub dark: bool,
    #[serde(default = "default_text_color")]
    pub text_color: Rgba,
    #[serde(default = "default_theme")]
    pub theme: [u8; 3],
    #[serde(default = "default_background")]
    pub background: Background,
    #[serde(default = "default_logo")]
    pub logo: Option<PathBuf>,
    #[serde(default = "default_logo_size")]
    pub logo_size: String,
    #[serde(default = "default_play")]
    pub play: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub current: usize,
    #[serde(default = "default_auto_advance")]
    pub auto_advance: bool,
    #[serde(default = "default_list")]
    pub list: Vec<Track>,
}

fn default_dark() -> bool {
    true
}

fn default_text_color() -> Rgba {
    Rgba::new(255, 255, 255, 0.8)
}

fn default_theme() -> [u8; 3] {
    [255, 255, 255]
}

fn default_background() -> Background {
    Background {
        image: None,
        video: Some(PathBuf::from("assets/bg.mp4")),
    }
}

fn default_logo() -> Option<PathBuf> {
    Some(PathBuf::from("assets/logo.png"))
}

fn default_logo_size() -> String {
    String::from("15vw")
}

fn default_play() -> bool {
    true
}

fn default_volume() -> u8 {
    25
}

fn default_auto_advance() -> bool {
    true
}

fn default_list() -> Vec<Track> {
    vec![
        Track {
            title: String::from("Party Monster"),
            author: String::from("The Weeknd"),
            music: PathBuf::from("assets/music/bigdawgs.mp3"),
            image: PathBuf::from("assets/music/bigdawgs.png"),
        },
        Track {
            title: String::from("São Paulo"),
            author: String::from("The Weeknd"),
            music: PathBuf::from("assets/music/mercury.mp3"),
            image: PathBuf::from("assets/music/mercury.png"),
        },
    ]
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            dark: default_dark(),
            text_color: default_text_color(),
            theme: default_theme(),
            background: default_background(),
            logo: default_logo(),
            logo_size: default_logo_size(),
            play: default_play(),
            muted: false,
            volume: default_volume(),
            current: 0,
            auto_advance: default_auto_advance(),
            list: default_list(),
        }
    }
}
