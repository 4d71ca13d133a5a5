use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "eventName", rename_all = "camelCase")]
pub enum InboundMessage {
    LoadProgress {
        #[serde(rename = "loadFraction")]
        load_fraction: f64,
    },
}

impl InboundMessage {
    pub fn parse(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line.trim()).ok()?;
        Self::parse(&value)
    }
}

pub fn progress_percent(fraction: f64) -> Option<u8> {
    if !fraction.is_finite() {
        return None;
    }
    Some((fraction * 100.0).round().clamp(0.0, 100.0) as u8)
}
