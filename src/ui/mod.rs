//! Console presentation of controller results.
//!
//! Nothing in here makes decisions; it only turns reports into text.

pub mod colors;
pub mod renderer;

pub use colors::Theme;
pub use renderer::ReportRenderer;
