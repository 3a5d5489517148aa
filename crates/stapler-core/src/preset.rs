use serde::Deserialize;

/// Named quality level controlling the output size/quality trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityPreset {
    Original,
    High,
    #[default]
    Medium,
    Low,
    UltraLow,
}

/// Concrete image-encoding parameters for one preset. `jpeg_quality` of
/// `None` means no re-encoding at all. Scanned sources are assumed to be
/// 300 dpi, so `rescale` is `target_dpi / 300`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionParams {
    pub jpeg_quality: Option<u8>,
    pub target_dpi: Option<u16>,
    pub rescale: f32,
}

impl QualityPreset {
    pub fn params(&self) -> CompressionParams {
        match self {
            QualityPreset::Original => CompressionParams {
                jpeg_quality: None,
                target_dpi: None,
                rescale: 1.0,
            },
            QualityPreset::High => CompressionParams {
                jpeg_quality: Some(85),
                target_dpi: Some(300),
                rescale: 1.0,
            },
            QualityPreset::Medium => CompressionParams {
                jpeg_quality: Some(75),
                target_dpi: Some(200),
                rescale: 200.0 / 300.0,
            },
            QualityPreset::Low => CompressionParams {
                jpeg_quality: Some(60),
                target_dpi: Some(150),
                rescale: 0.5,
            },
            QualityPreset::UltraLow => CompressionParams {
                jpeg_quality: Some(50),
                target_dpi: Some(100),
                rescale: 100.0 / 300.0,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityPreset::Original => "original",
            QualityPreset::High => "high",
            QualityPreset::Medium => "medium",
            QualityPreset::Low => "low",
            QualityPreset::UltraLow => "ultra-low",
        }
    }
}
