//! OCR fallback for pages without a usable text layer.

use crate::config::OcrSettings;
use crate::error::ExtractError;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use tokio::process::Command;
use tracing::debug;

/// Recognise text in a rendered page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractError>;
}

/// Runs the `tesseract` executable on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    settings: OcrSettings,
}

impl TesseractCli {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    /// Arguments after the image path: print to stdout with the configured
    /// segmentation mode and language.
    fn args(&self) -> Vec<String> {
        vec![
            "stdout".to_string(),
            "--psm".to_string(),
            self.settings.psm.to_string(),
            "-l".to_string(),
            self.settings.lang.clone(),
        ]
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractError> {
        let tmp = tempfile::Builder::new()
            .prefix("pdf2rows-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ExtractError::OcrFailed(format!("temp file: {e}")))?;

        image
            .save_with_format(tmp.path(), ImageFormat::Png)
            .map_err(|e| ExtractError::OcrFailed(format!("PNG encode: {e}")))?;

        let output = Command::new(&self.settings.tesseract_cmd)
            .arg(tmp.path())
            .args(self.args())
            .output()
            .await
            .map_err(|e| {
                ExtractError::OcrFailed(format!(
                    "could not run '{}': {e}",
                    self.settings.tesseract_cmd
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::OcrFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !output.stderr.is_empty() {
            debug!("tesseract: {}", String::from_utf8_lossy(&output.stderr).trim());
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR recognised {} chars", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn args_carry_psm_and_lang() {
        let cli = TesseractCli::new(OcrSettings {
            psm: 4,
            lang: "eng+fra".into(),
            ..OcrSettings::default()
        });
        assert_eq!(cli.args(), vec!["stdout", "--psm", "4", "-l", "eng+fra"]);
    }

    #[tokio::test]
    async fn missing_binary_is_an_ocr_error() {
        let cli = TesseractCli::new(OcrSettings {
            tesseract_cmd: "/definitely/not/tesseract".into(),
            ..OcrSettings::default()
        });
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])));
        let err = cli.recognize(&img).await.unwrap_err();
        assert!(matches!(err, ExtractError::OcrFailed(_)), "got {err:?}");
    }
}
