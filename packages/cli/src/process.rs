use std::io::Cursor;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader};

pub const DEFAULT_QUALITY: u8 = 80;

/// Formats the CLI can re-encode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Lossless WebP
    Webp,
    #[value(alias = "jpg")]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::WebP => Some(Self::Webp),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            _ => None,
        }
    }
}

/// Target box given as `W,H`. A zero side follows the other one's scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl Resize {
    pub fn target(self, src_width: u32, src_height: u32) -> (u32, u32) {
        let scale = |side: u32, num: u32, den: u32| -> u32 {
            let scaled = (u64::from(side) * u64::from(num) + u64::from(den) / 2) / u64::from(den);
            u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
        };
        match (self.width, self.height) {
            (0, h) => (scale(src_width, h, src_height.max(1)), h),
            (w, 0) => (w, scale(src_height, w, src_width.max(1))),
            (w, h) => (w, h),
        }
    }
}

impl FromStr for Resize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(',')
            .ok_or_else(|| format!("expected WIDTH,HEIGHT, got `{s}`"))?;
        let parse = |side: &str| {
            side.trim()
                .parse::<u32>()
                .map_err(|_| format!("`{}` is not a pixel count", side.trim()))
        };
        let resize = Self {
            width: parse(w)?,
            height: parse(h)?,
        };
        if resize.width == 0 && resize.height == 0 {
            return Err("width and height cannot both be 0".into());
        }
        Ok(resize)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Output format; `None` keeps the source format.
    pub format: Option<OutputFormat>,
    /// JPEG quality, 1-100.
    pub quality: u8,
    pub resize: Option<Resize>,
    /// Apply the EXIF orientation to the pixels before encoding.
    pub auto_orient: bool,
}

#[derive(Debug)]
pub struct Processed {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Decode, orient, resize and re-encode. Re-encoding drops embedded metadata.
///
/// Fails when no format is requested and the source is not JPEG, PNG or WebP.
pub fn process(bytes: &[u8], opts: &ProcessOptions) -> Result<Processed> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to read image")?;
    let source = reader.format().context("Unrecognized image format")?;
    let format = match opts.format.or_else(|| OutputFormat::from_image_format(source)) {
        Some(format) => format,
        None => bail!("Cannot re-encode {source:?}; pass an output format"),
    };

    let mut decoder = reader.into_decoder().context("Failed to decode image")?;
    let orientation = decoder.orientation().context("Failed to read orientation")?;
    let mut img = DynamicImage::from_decoder(decoder).context("Failed to decode image")?;
    if opts.auto_orient {
        img.apply_orientation(orientation);
    }

    if let Some(resize) = opts.resize {
        let (width, height) = resize.target(img.width(), img.height());
        img = img.resize_exact(width, height, FilterType::Lanczos3);
    }

    let (width, height) = (img.width(), img.height());
    let bytes = encode(img, format, opts.quality)?;
    Ok(Processed {
        bytes,
        format,
        width,
        height,
    })
}

fn encode(img: DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let written = match format {
        OutputFormat::Jpeg => {
            let img = DynamicImage::ImageRgb8(img.to_rgb8());
            img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        }
        OutputFormat::Png => {
            // PNG has no float variant
            let img = match img.color() {
                ColorType::Rgb32F | ColorType::Rgba32F => {
                    DynamicImage::ImageRgba16(img.to_rgba16())
                }
                _ => img,
            };
            img.write_with_encoder(PngEncoder::new(&mut out))
        }
        OutputFormat::Webp => {
            let img = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            img.write_with_encoder(WebPEncoder::new_lossless(&mut out))
        }
    };
    written.with_context(|| format!("Failed to encode {}", format.extension()))?;
    Ok(out)
}

/// Recognized source format, if any.
pub fn sniff(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Whether `bytes` can be re-encoded without choosing a new format.
pub fn keeps_format(bytes: &[u8]) -> bool {
    sniff(bytes).is_some_and(|format| OutputFormat::from_image_format(format).is_some())
}
