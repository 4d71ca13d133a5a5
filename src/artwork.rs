use anyhow::{Context, Result};
use image::imageops::FilterType;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const SAMPLE_EDGE: u32 = 24;
const MIN_ALPHA: u8 = 128;

pub fn accent_color(path: &Path) -> Result<(u8, u8, u8)> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode artwork {}", path.display()))?;
    let thumb = image
        .resize(SAMPLE_EDGE, SAMPLE_EDGE, FilterType::Triangle)
        .to_rgba8();

    let (mut r, mut g, mut b, mut count) = (0_u64, 0_u64, 0_u64, 0_u64);
    for pixel in thumb.pixels() {
        let [pr, pg, pb, pa] = pixel.0;
        if pa < MIN_ALPHA {
            continue;
        }
        r += u64::from(pr);
        g += u64::from(pg);
        b += u64::from(pb);
        count += 1;
    }

    if count == 0 {
        anyhow::bail!("artwork {} is fully transparent", path.display());
    }
    Ok(((r / count) as u8, (g / count) as u8, (b / count) as u8))
}

#[derive(Debug, Default)]
pub struct ArtworkCache {
    accents: HashMap<PathBuf, Option<(u8, u8, u8)>>,
}

impl ArtworkCache {
    pub fn accent(&mut self, path: &Path) -> Option<(u8, u8, u8)> {
        if let Some(cached) = self.accents.get(path) {
            return *cached;
        }
        let accent = match accent_color(path) {
            Ok(color) => Some(color),
            Err(err) => {
                debug!(error = %format!("{err:#}"), "no accent color for artwork");
                None
            }
        };
        self.accents.insert(path.to_path_buf(), accent);
        accent
    }

    pub fn len(&self) -> usize {
        self.accents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn solid_image_yields_its_color() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cover.png");
        RgbaImage::from_pixel(8, 8, Rgba([200, 40, 10, 255]))
            .save(&path)
            .expect("save png");

        assert_eq!(accent_color(&path).expect("accent"), (200, 40, 10));
    }

    #[test]
    fn transparent_pixels_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cover.png");
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        image.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        image.save(&path).expect("save png");

        let (r, g, b) = accent_color(&path).expect("accent");
        assert!(r <= 10 && g <= 20 && b <= 30);
    }

    #[test]
    fn cache_remembers_missing_files() {
        let mut cache = ArtworkCache::default();
        assert_eq!(cache.accent(Path::new("does/not/exist.png")), None);
        assert_eq!(cache.accent(Path::new("does/not/exist.png")), None);
        assert_eq!(cache.len(), 1);
    }
}
