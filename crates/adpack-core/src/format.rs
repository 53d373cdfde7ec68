//! Supported aspect ratios and their safe-zone guides.
//!
//! Margins are in pixels of the reference canvas and describe where platform
//! chrome (captions, buttons, progress bars) covers the video.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
}

/// Pixel margins that text and the CTA must stay clear of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeZone {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
    /// Extra clearance above the bottom margin reserved for the CTA.
    pub cta_margin: u32,
}

impl AspectRatio {
    /// Every ratio a job produces, in generation order.
    pub const ALL: [AspectRatio; 3] = [
        AspectRatio::Vertical,
        AspectRatio::Square,
        AspectRatio::Landscape,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Vertical => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
        }
    }

    /// Token safe for file names (`9x16`).
    pub fn file_token(self) -> &'static str {
        match self {
            AspectRatio::Vertical => "9x16",
            AspectRatio::Square => "1x1",
            AspectRatio::Landscape => "16x9",
        }
    }

    /// Reference canvas (width, height).
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Vertical => (1080, 1920),
            AspectRatio::Square => (1080, 1080),
            AspectRatio::Landscape => (1920, 1080),
        }
    }

    pub fn safe_zone(self) -> SafeZone {
        match self {
            // Reels/TikTok UI: caption block at the bottom, action rail on the right.
            AspectRatio::Vertical => SafeZone {
                top: 220,
                bottom: 420,
                left: 60,
                right: 140,
                cta_margin: 180,
            },
            AspectRatio::Square => SafeZone {
                top: 80,
                bottom: 120,
                left: 60,
                right: 60,
                cta_margin: 100,
            },
            AspectRatio::Landscape => SafeZone {
                top: 60,
                bottom: 140,
                left: 120,
                right: 120,
                cta_margin: 90,
            },
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "9:16" | "9x16" => Ok(AspectRatio::Vertical),
            "1:1" | "1x1" => Ok(AspectRatio::Square),
            "16:9" | "16x9" => Ok(AspectRatio::Landscape),
            other => Err(crate::error::Error::Parse(format!(
                "unsupported aspect ratio '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_ratio_notation() {
        let json = serde_json::to_string(&AspectRatio::Vertical).unwrap();
        assert_eq!(json, "\"9:16\"");
        let back: AspectRatio = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(back, AspectRatio::Landscape);
    }

    #[test]
    fn safe_zones_differ_per_ratio() {
        let zones: Vec<SafeZone> = AspectRatio::ALL.iter().map(|r| r.safe_zone()).collect();
        assert_ne!(zones[0], zones[1]);
        assert_ne!(zones[1], zones[2]);
        for r in AspectRatio::ALL {
            let (w, h) = r.dimensions();
            let z = r.safe_zone();
            assert!(z.left + z.right < w);
            assert!(z.top + z.bottom + z.cta_margin < h);
        }
    }

    #[test]
    fn parses_file_tokens() {
        assert_eq!("1x1".parse::<AspectRatio>().unwrap(), AspectRatio::Square);
        assert!("4:5".parse::<AspectRatio>().is_err());
    }
}
