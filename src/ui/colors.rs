//! 24-bit RGB color theme for terminal output.

use owo_colors::Rgb;

/// Colors used for result banners and escalation panels.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Success state color - green (34, 197, 94)
    pub success: Rgb,
    /// Error state color - red (239, 68, 68)
    pub error: Rgb,
    /// Warning state color - yellow (234, 179, 8)
    pub warning: Rgb,
    /// Muted/secondary text color - gray (107, 114, 128)
    pub muted: Rgb,
    /// Backend identifier highlight color - cyan (34, 211, 238)
    pub backend: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            success: Rgb(34, 197, 94),
            error: Rgb(239, 68, 68),
            warning: Rgb(234, 179, 8),
            muted: Rgb(107, 114, 128),
            backend: Rgb(34, 211, 238),
        }
    }
}
