pub mod engine;
pub mod render;
pub mod states;
pub mod types;

pub use engine::{screenshot, screenshot_diff};
pub use render::{assemble_document, render_document, DocumentServer, FileCssBuilder, ServerGuard};
pub use types::{
    CaptureError, CaptureManifest, CaptureOptions, CaptureResult, CapturedImage, CssBuilder,
    Platform, PlatformOutcome, RenderHtml, State, StateDiff, Subject,
};
