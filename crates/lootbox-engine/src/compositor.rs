//! Overlays an animated rarity frame onto generated artwork.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, Delay, Frame, Rgba, RgbaImage};
use lootbox_contracts::rarity::FrameChoice;

/// Border added around the artwork so the frame does not cover it.
pub const FRAME_BORDER: u32 = 275;
pub const FRAME_DELAY_MS: u32 = 10;
const GIF_QUANT_SPEED: i32 = 10;

const BORDERLESS_FRAMES: &[&str] = &["speedlines", "rain_of_gold"];

pub fn frame_border(frame: &str) -> u32 {
    if BORDERLESS_FRAMES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(frame))
    {
        0
    } else {
        FRAME_BORDER
    }
}

#[derive(Debug, Clone)]
pub struct FrameCompositor {
    frame_dir: PathBuf,
}

impl FrameCompositor {
    pub fn new(frame_dir: impl Into<PathBuf>) -> Self {
        Self {
            frame_dir: frame_dir.into(),
        }
    }

    pub fn frame_path(&self, name: &str) -> PathBuf {
        self.frame_dir.join(format!("{name}.gif"))
    }

    /// Writes an infinitely looping GIF to `out_path` and returns its frame count.
    pub fn apply_frame(&self, artwork: &Path, frame: FrameChoice, out_path: &Path) -> Result<usize> {
        let art = image::open(artwork)
            .with_context(|| format!("failed to open artwork {}", artwork.display()))?
            .to_rgba8();
        let frames = match frame {
            FrameChoice::None => still_frames(&art),
            FrameChoice::Named(name) => self.framed(&art, name)?,
        };
        let count = frames.len();
        write_gif(out_path, frames)?;
        Ok(count)
    }

    fn framed(&self, art: &RgbaImage, name: &str) -> Result<Vec<Frame>> {
        let path = self.frame_path(name);
        let reader = BufReader::new(
            File::open(&path).with_context(|| format!("missing frame {}", path.display()))?,
        );
        let overlays = GifDecoder::new(reader)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .into_frames()
            .collect_frames()
            .with_context(|| format!("failed to read frames of {}", path.display()))?;

        let base = base_layer(art, frame_border(name));
        let mut frames: Vec<Frame> = overlays
            .into_iter()
            .map(|overlay| {
                let resized = imageops::resize(
                    overlay.buffer(),
                    base.width(),
                    base.height(),
                    FilterType::Triangle,
                );
                let mut canvas = base.clone();
                imageops::overlay(&mut canvas, &resized, 0, 0);
                to_frame(canvas)
            })
            .collect();
        if frames.len() < 2 {
            frames = still_frames(&base);
        }
        Ok(frames)
    }
}

fn base_layer(art: &RgbaImage, border: u32) -> RgbaImage {
    let mut base = RgbaImage::from_pixel(
        art.width() + border,
        art.height() + border,
        Rgba([0, 0, 0, 255]),
    );
    let inset = i64::from(border / 2);
    imageops::overlay(&mut base, art, inset, inset);
    base
}

fn to_frame(buffer: RgbaImage) -> Frame {
    Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1))
}

/// A frameless gift is still a two-frame animation.
fn still_frames(art: &RgbaImage) -> Vec<Frame> {
    vec![to_frame(art.clone()), to_frame(art.clone())]
}

fn write_gif(path: &Path, frames: Vec<Frame>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
    );
    let mut encoder = GifEncoder::new_with_speed(writer, GIF_QUANT_SPEED);
    encoder.set_repeat(Repeat::Infinite)?;
    encoder
        .encode_frames(frames)
        .with_context(|| format!("failed to encode {}", path.display()))
}
