//! Classification request bundle

use snaplabel_core::{CorrelationToken, Error, Orientation, Result};

/// Image pixels as handed over by the image source
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Encoded image file contents (PNG, JPEG, ...)
    Encoded(Vec<u8>),

    /// Packed 8-bit RGB pixels, row-major
    Rgb {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
}

impl ImageInput {
    /// Structural checks that need no decoding
    pub(crate) fn check(&self) -> Result<()> {
        match self {
            Self::Encoded(bytes) if bytes.is_empty() => {
                Err(Error::invalid_input("encoded image is empty"))
            }
            Self::Encoded(_) => Ok(()),
            Self::Rgb {
                width,
                height,
                pixels,
            } => {
                let expected = *width as usize * *height as usize * 3;
                if expected == 0 {
                    return Err(Error::invalid_input(format!(
                        "image has no pixels ({}x{})",
                        width, height
                    )));
                }
                if pixels.len() != expected {
                    return Err(Error::invalid_input(format!(
                        "expected {} bytes for a {}x{} RGB image, got {}",
                        expected,
                        width,
                        height,
                        pixels.len()
                    )));
                }
                Ok(())
            }
        }
    }
}

/// One image to classify, with its orientation and an optional caller token
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub image: ImageInput,
    pub orientation: Orientation,
    pub token: Option<CorrelationToken>,
}

impl ClassificationRequest {
    /// Request for an encoded image file
    pub fn encoded(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            image: ImageInput::Encoded(bytes.into()),
            orientation: Orientation::Up,
            token: None,
        }
    }

    /// Request for raw RGB8 pixels
    pub fn rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            image: ImageInput::Rgb {
                width,
                height,
                pixels,
            },
            orientation: Orientation::Up,
            token: None,
        }
    }

    /// Set the pixel orientation
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Attach a correlation token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(CorrelationToken::new(token));
        self
    }
}
