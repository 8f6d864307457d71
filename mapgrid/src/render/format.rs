//! Output image formats.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};

use crate::error::{MapError, MapResult};

/// JPEG quality used when the format text does not carry one.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Raster formats the image backend can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg { quality: u8 },
    Tiff,
    Bmp,
}

impl ImageFormat {
    /// Guesses the format from a file extension.
    pub fn from_path(path: impl AsRef<Path>) -> MapResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| unknown_extension(path))?;
        match ext.as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            }),
            "tif" | "tiff" => Ok(ImageFormat::Tiff),
            "bmp" => Ok(ImageFormat::Bmp),
            "pdf" | "svg" | "ps" => Err(vector_unavailable(&ext)),
            _ => Err(unknown_extension(path)),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg { .. } => "jpg",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// Encodes an image into this format.
    pub fn encode(&self, image: &RgbaImage) -> MapResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            ImageFormat::Jpeg { quality } => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
                JpegEncoder::new_with_quality(&mut buf, *quality).encode_image(&rgb)?;
            }
            ImageFormat::Png => {
                image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?
            }
            ImageFormat::Tiff => {
                image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Tiff)?
            }
            ImageFormat::Bmp => {
                image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)?
            }
        }
        Ok(buf)
    }
}

/// Parses format names such as `png`, `png32`, `jpeg80`, `tiff`.
impl FromStr for ImageFormat {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" | "png32" | "png24" => return Ok(ImageFormat::Png),
            "tiff" | "tif" => return Ok(ImageFormat::Tiff),
            "bmp" => return Ok(ImageFormat::Bmp),
            "pdf" | "svg" | "ps" | "ARGB32" | "RGB24" => return Err(vector_unavailable(s)),
            _ => {}
        }

        let digits = s
            .strip_prefix("jpeg")
            .or_else(|| s.strip_prefix("jpg"))
            .ok_or_else(|| MapError::Encoding(format!("unknown image format '{}'", s)))?;
        if digits.is_empty() {
            return Ok(ImageFormat::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            });
        }
        match digits.parse::<u8>() {
            Ok(quality) if (1..=100).contains(&quality) => Ok(ImageFormat::Jpeg { quality }),
            _ => Err(MapError::Encoding(format!(
                "invalid jpeg quality in format '{}' (expected 1-100)",
                s
            ))),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg { quality } => write!(f, "jpeg{}", quality),
            ImageFormat::Tiff => write!(f, "tiff"),
            ImageFormat::Bmp => write!(f, "bmp"),
        }
    }
}

fn vector_unavailable(format: &str) -> MapError {
    MapError::Encoding(format!(
        "vector backend is not available for format '{}'",
        format
    ))
}

fn unknown_extension(path: &Path) -> MapError {
    MapError::Encoding(format!(
        "unknown output extension for '{}'",
        path.display()
    ))
}
