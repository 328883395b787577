//! Platform WebRTC boundary.
//!
//! The engine never looks inside these handles beyond identity, kind and the
//! pause/resume/close operations exposed here.

use crate::errors::EngineError;
use crate::model::MediaKind;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A captured or received media stream.
pub trait MediaStream: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Stop all tracks. Idempotent.
    fn stop(&self);
}

/// Direction of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportDirection {
    Send,
    Recv,
}

/// One simulcast layer.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingLayer {
    pub rid: String,
    pub max_bitrate: u32,
    pub scale_resolution_down_by: f64,
}

/// Options passed to [`Transport::produce`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProduceOptions {
    pub kind: MediaKind,
    pub encodings: Vec<EncodingLayer>,
}

impl ProduceOptions {
    #[must_use]
    pub fn audio() -> Self {
        Self {
            kind: MediaKind::Audio,
            encodings: Vec::new(),
        }
    }

    /// Three-layer simulcast for camera video.
    #[must_use]
    pub fn video() -> Self {
        let layer = |rid: &str, max_bitrate: u32, scale: f64| EncodingLayer {
            rid: rid.to_string(),
            max_bitrate,
            scale_resolution_down_by: scale,
        };
        Self {
            kind: MediaKind::Video,
            encodings: vec![
                layer("r0", 200_000, 4.0),
                layer("r1", 400_000, 2.0),
                layer("r2", 800_000, 1.0),
            ],
        }
    }

    /// Single high-bitrate layer for screen content.
    #[must_use]
    pub fn screen() -> Self {
        Self {
            kind: MediaKind::Screen,
            encodings: vec![EncodingLayer {
                rid: "r0".to_string(),
                max_bitrate: 3_000_000,
                scale_resolution_down_by: 1.0,
            }],
        }
    }
}

/// Screen capture resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenResolution {
    /// 2560x1440
    Qhd,
    /// 1920x1080
    Fhd,
    /// 1280x720
    #[default]
    Hd,
}

impl ScreenResolution {
    /// Parse the preset name used by room settings. Unknown names map to `Hd`.
    #[must_use]
    pub fn from_preset(name: &str) -> Self {
        match name {
            "qhd" => ScreenResolution::Qhd,
            "fhd" => ScreenResolution::Fhd,
            _ => ScreenResolution::Hd,
        }
    }

    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        match self {
            ScreenResolution::Qhd => (2560, 1440),
            ScreenResolution::Fhd => (1920, 1080),
            ScreenResolution::Hd => (1280, 720),
        }
    }
}

/// Display capture constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl From<ScreenResolution> for ScreenConstraints {
    fn from(resolution: ScreenResolution) -> Self {
        let (width, height) = resolution.dimensions();
        Self {
            width,
            height,
            frame_rate: 30,
        }
    }
}

/// Send or receive transport.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn direction(&self) -> TransportDirection;

    /// Attach a local source and start producing.
    async fn produce(
        &self,
        source: Arc<dyn MediaStream>,
        options: ProduceOptions,
    ) -> Result<Arc<dyn Producer>, EngineError>;

    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Outbound media source attached to a send transport.
pub trait Producer: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    fn pause(&self);
    fn resume(&self);
    fn is_paused(&self) -> bool;
    fn close(&self);
}

/// Inbound sink consuming one remote producer.
pub trait Consumer: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn producer_id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    fn pause(&self);
    fn resume(&self);
    fn is_paused(&self) -> bool;
    fn close(&self);

    /// Stream carrying the consumed track.
    fn stream(&self) -> Option<Arc<dyn MediaStream>>;
}

/// Loaded WebRTC device.
#[async_trait]
pub trait Device: Send + Sync {
    /// Build a send transport from server-provided parameters.
    fn create_send_transport(
        &self,
        kind: MediaKind,
        params: &serde_json::Value,
    ) -> Result<Arc<dyn Transport>, EngineError>;

    /// Capture the display for screen sharing.
    async fn capture_display(
        &self,
        constraints: ScreenConstraints,
    ) -> Result<Arc<dyn MediaStream>, EngineError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_presets() {
        assert_eq!(ScreenResolution::from_preset("qhd").dimensions(), (2560, 1440));
        assert_eq!(ScreenResolution::from_preset("fhd").dimensions(), (1920, 1080));
        assert_eq!(ScreenResolution::from_preset("hd").dimensions(), (1280, 720));
        assert_eq!(ScreenResolution::from_preset("8k"), ScreenResolution::Hd);

        let constraints = ScreenConstraints::from(ScreenResolution::Fhd);
        assert_eq!(constraints.width, 1920);
        assert_eq!(constraints.frame_rate, 30);
    }

    #[test]
    fn test_video_produce_options_are_simulcast() {
        let options = ProduceOptions::video();
        assert_eq!(options.kind, MediaKind::Video);
        assert_eq!(options.encodings.len(), 3);
        assert!(ProduceOptions::audio().encodings.is_empty());
    }
}
