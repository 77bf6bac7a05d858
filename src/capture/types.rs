// Core types for the capture engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config;
use crate::diff::DiffError;
use crate::pool::PoolError;

/// Interaction state applied to an element before capture.
///
/// The set is closed and the execution order is fixed: `default`, `active`,
/// `focus`, `hover`, filtered by whatever subset was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Default,
    Active,
    Focus,
    Hover,
}

impl State {
    /// All states in canonical execution order
    pub const ALL: [State; 4] = [State::Default, State::Active, State::Focus, State::Hover];

    /// Name used in baseline filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Default => "default",
            State::Active => "active",
            State::Focus => "focus",
            State::Hover => "hover",
        }
    }

    /// Parse a state name (e.g. from a CLI argument)
    pub fn from_name(name: &str) -> Option<State> {
        match name.to_lowercase().as_str() {
            "default" => Some(State::Default),
            "active" => Some(State::Active),
            "focus" => Some(State::Focus),
            "hover" => Some(State::Hover),
            _ => None,
        }
    }

    /// Filter `configured` down to the canonical execution order
    pub fn ordered(configured: &[State]) -> Vec<State> {
        State::ALL
            .iter()
            .copied()
            .filter(|s| configured.contains(s))
            .collect()
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform a baseline belongs to.
///
/// Symbolic identifiers: screenshots differ across platforms (font
/// rasterization, subpixel rendering) even for byte-identical markup, so
/// baselines are tracked per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Darwin,
    Linux,
    Windows,
}

impl Platform {
    /// All tracked platforms
    pub const ALL: [Platform; 3] = [Platform::Darwin, Platform::Linux, Platform::Windows];

    /// The platform this process is running on
    pub fn current() -> Platform {
        if cfg!(target_os = "macos") {
            Platform::Darwin
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    /// Name used in baseline filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Darwin => "darwin",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
        }
    }

    /// Parse a platform name (e.g. from a CLI argument)
    pub fn from_name(name: &str) -> Option<Platform> {
        match name.to_lowercase().as_str() {
            "darwin" | "macos" => Some(Platform::Darwin),
            "linux" => Some(Platform::Linux),
            "windows" => Some(Platform::Windows),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a capture call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// CSS files to hand to the builder. `None` skips the build step
    /// entirely; the builder is never invoked.
    pub css_paths: Option<Vec<String>>,

    /// Directory where baselines and diff artifacts are stored
    pub output_path: PathBuf,

    /// Overwrite the current platform's baseline even if one exists
    pub force_update: bool,

    /// States to capture (executed in canonical order regardless)
    pub states: Vec<State>,

    /// Platforms to check for content changes
    pub platforms: Vec<Platform>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            css_paths: None,
            output_path: PathBuf::from(&cfg.output_dir),
            force_update: cfg.update,
            states: State::ALL.to_vec(),
            platforms: Platform::ALL.to_vec(),
        }
    }
}

impl CaptureOptions {
    pub fn css_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.css_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn force_update(mut self, force: bool) -> Self {
        self.force_update = force;
        self
    }

    pub fn states(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.states = states.into_iter().collect();
        self
    }

    pub fn platforms(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }
}

/// External renderer for structured elements.
///
/// Implemented by whatever component model the caller uses; invoked exactly
/// once per capture, and only when the subject is not already a markup
/// string.
pub trait RenderHtml {
    /// Serialize the element to a markup string
    fn render_html(&self) -> String;
}

/// The thing being captured: raw markup or a structured element
pub enum Subject<'a> {
    /// A raw markup fragment, used as-is
    Markup(String),
    /// A structured element, serialized through [`RenderHtml`]
    Element(&'a dyn RenderHtml),
}

impl Subject<'_> {
    /// Resolve to a markup string, invoking the renderer if needed
    pub fn into_markup(self) -> String {
        match self {
            Subject::Markup(markup) => markup,
            Subject::Element(el) => el.render_html(),
        }
    }
}

impl From<&str> for Subject<'_> {
    fn from(markup: &str) -> Self {
        Subject::Markup(markup.to_string())
    }
}

impl From<String> for Subject<'_> {
    fn from(markup: String) -> Self {
        Subject::Markup(markup)
    }
}

impl<'a> From<&'a dyn RenderHtml> for Subject<'a> {
    fn from(el: &'a dyn RenderHtml) -> Self {
        Subject::Element(el)
    }
}

/// External CSS build step.
///
/// Receives the CSS-less document (some builders need the markup to
/// tree-shake styles) plus the configured path list, and returns raw CSS
/// text blocks to inline in order.
pub trait CssBuilder {
    fn build(&self, document: &str, css_paths: &[String]) -> CaptureResult<Vec<String>>;
}

/// One pixel capture, coordinates stable within a single capture call
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// State the element was in
    pub state: State,
    /// Zero-based position among qualifying top-level children
    pub idx: usize,
    /// PNG-encoded pixels
    pub png: Vec<u8>,
}

/// Hash-gated mode result, one per configured platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformOutcome {
    /// Platform this outcome describes
    pub platform: Platform,
    /// Content hash differs from this platform's stored baseline
    pub changed: bool,
    /// This platform's baseline was (re)written during the call
    pub updated: bool,
    /// Diff artifacts written for human review (current platform only).
    ///
    /// Populated only by a recovery run: the gate skips pixel work unless
    /// this platform's hash is being (re)written, and a forced update skips
    /// the compare, so artifacts appear exactly when a hash file went
    /// missing while its pixel baselines survived and the fresh capture
    /// differs from them.
    pub diffs: Vec<PathBuf>,
}

/// Metadata sidecar written whenever a platform's baselines are refreshed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureManifest {
    /// Baseline name
    pub name: String,
    /// Platform the refreshed baselines belong to
    pub platform: Platform,
    /// Content hash the baselines were captured from
    pub content_hash: String,
    /// States captured, in execution order
    pub states: Vec<State>,
    /// Number of elements captured per state
    pub elements: usize,
    /// RFC 3339 capture timestamp
    pub generated_at: String,
}

/// Always-diff mode result, one per `(state, element)` pair
#[derive(Debug, Clone)]
pub struct StateDiff {
    /// State the element was in
    pub state: State,
    /// Zero-based position among qualifying top-level children
    pub idx: usize,
    /// Stored baseline pixels, when one existed and no update was forced
    pub before: Option<Vec<u8>>,
    /// Freshly captured pixels
    pub after: Vec<u8>,
    /// Composite before/after/highlight image, when a comparison ran
    pub diff: Option<Vec<u8>>,
    /// Pixel-identical to the stored baseline
    pub identical: bool,
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for capture operations
#[derive(Debug)]
pub enum CaptureError {
    /// Browser/page interaction failure
    Browser(String),

    /// Document assembly or page-load failure
    Render(String),

    /// CSS build step failure
    Css(String),

    /// No top-level children with a non-zero bounding box
    NoElements { name: String, document: String },

    /// Browser pool failure
    Pool(PoolError),

    /// Visual diff failure (undecodable image input)
    Diff(DiffError),

    /// Manifest (de)serialization failure
    Json(serde_json::Error),

    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Browser(msg) => write!(f, "Browser error: {}", msg),
            CaptureError::Render(msg) => write!(f, "Render error: {}", msg),
            CaptureError::Css(msg) => write!(f, "CSS build error: {}", msg),
            CaptureError::NoElements { name, document } => {
                write!(f, "No elements found for \"{}\":\n{}", name, document)
            }
            CaptureError::Pool(err) => write!(f, "Pool error: {}", err),
            CaptureError::Diff(err) => write!(f, "Diff error: {}", err),
            CaptureError::Json(err) => write!(f, "Serialization error: {}", err),
            CaptureError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Pool(err) => Some(err),
            CaptureError::Diff(err) => Some(err),
            CaptureError::Json(err) => Some(err),
            CaptureError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

impl From<PoolError> for CaptureError {
    fn from(err: PoolError) -> Self {
        CaptureError::Pool(err)
    }
}

impl From<DiffError> for CaptureError {
    fn from(err: DiffError) -> Self {
        CaptureError::Diff(err)
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_canonical_order() {
        let names: Vec<&str> = State::ALL.iter().map(State::as_str).collect();
        assert_eq!(names, vec!["default", "active", "focus", "hover"]);
    }

    #[test]
    fn test_state_ordered_filters_and_reorders() {
        let configured = vec![State::Hover, State::Default];
        assert_eq!(
            State::ordered(&configured),
            vec![State::Default, State::Hover]
        );
    }

    #[test]
    fn test_state_from_name() {
        assert_eq!(State::from_name("hover"), Some(State::Hover));
        assert_eq!(State::from_name("HOVER"), Some(State::Hover));
        assert_eq!(State::from_name("pressed"), None);
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(Platform::Darwin.as_str(), "darwin");
        assert_eq!(Platform::from_name("macos"), Some(Platform::Darwin));
        assert_eq!(Platform::from_name("beos"), None);
    }

    #[test]
    fn test_platform_current_is_tracked() {
        assert!(Platform::ALL.contains(&Platform::current()));
    }

    #[test]
    fn test_options_builders() {
        let opts = CaptureOptions::default()
            .states([State::Default])
            .platforms([Platform::Linux])
            .output_path("__tmp__")
            .force_update(true);
        assert_eq!(opts.states, vec![State::Default]);
        assert_eq!(opts.platforms, vec![Platform::Linux]);
        assert!(opts.force_update);
        assert!(opts.css_paths.is_none());
    }

    #[test]
    fn test_subject_markup_passthrough() {
        let subject: Subject = "<div>Hi</div>".into();
        assert_eq!(subject.into_markup(), "<div>Hi</div>");
    }

    #[test]
    fn test_subject_element_invokes_renderer() {
        struct Button;
        impl RenderHtml for Button {
            fn render_html(&self) -> String {
                "<button>Click</button>".to_string()
            }
        }
        let button = Button;
        let subject = Subject::Element(&button);
        assert_eq!(subject.into_markup(), "<button>Click</button>");
    }
}
