//! Capture entry points.
//!
//! Two flavors with different economics:
//!
//! - [`screenshot`]: hash-gated. A platform-independent content hash decides
//!   per platform whether anything changed; pixels are only rendered when
//!   the current platform's baseline is actually being updated. Cheap enough
//!   to run on every test suite invocation.
//! - [`screenshot_diff`]: always renders and compares pixels, returning
//!   in-memory before/after/composite buffers per `(state, element)` pair.
//!   For callers that want a pixel verdict every run.

use log::{debug, info};

use crate::baseline::BaselineStore;
use crate::capture::render::{assemble_document, load_document};
use crate::capture::states::{capture_all, eligible_children};
use crate::capture::types::{
    CaptureError, CaptureManifest, CaptureOptions, CaptureResult, CapturedImage, CssBuilder,
    Platform, PlatformOutcome, State, StateDiff, Subject,
};
use crate::diff::visual_diff;
use crate::pool::BrowserPool;

/// Render the document in a pooled browser and capture every eligible
/// element in every requested state
fn capture_states(
    pool: &BrowserPool,
    name: &str,
    document: &str,
    options: &CaptureOptions,
) -> CaptureResult<Vec<CapturedImage>> {
    let checkout = pool.acquire()?;
    let tab = checkout
        .handle()
        .new_tab()
        .map_err(|e| CaptureError::Browser(e.to_string()))?;

    let result = (|| {
        load_document(&tab, document.to_string())?;

        let children = eligible_children(&tab)?;
        if children.is_empty() {
            return Err(CaptureError::NoElements {
                name: name.to_string(),
                document: document.to_string(),
            });
        }

        capture_all(&tab, &options.states, &children)
    })();

    // Close the tab either way so preserved browsers do not accumulate tabs
    let _ = tab.close(true);
    result
}

/// Hash-gated capture.
///
/// Assembles the document, hashes it, and reports change/update status per
/// configured platform. Pixels are captured only when the current platform's
/// baseline is being (re)written; any capture that differs from a prior
/// stored image gets a composite diff artifact on disk for review.
pub fn screenshot(
    pool: &BrowserPool,
    name: &str,
    subject: Subject<'_>,
    builder: &dyn CssBuilder,
    options: &CaptureOptions,
) -> CaptureResult<Vec<PlatformOutcome>> {
    let markup = subject.into_markup();
    let document = assemble_document(&markup, options.css_paths.as_deref(), builder)?;
    let hash = BaselineStore::content_hash(&document);
    let store = BaselineStore::new(&options.output_path);
    let current = Platform::current();

    let checks = store.check_platforms(
        name,
        &hash,
        &options.platforms,
        options.force_update,
        current,
    )?;

    let mut outcomes: Vec<PlatformOutcome> = checks
        .iter()
        .map(|c| PlatformOutcome {
            platform: c.platform,
            changed: c.changed,
            updated: c.updated,
            diffs: Vec::new(),
        })
        .collect();

    let needs_pixels = checks
        .iter()
        .any(|c| c.platform == current && c.changed && c.updated);

    if !needs_pixels {
        debug!("\"{}\": no baseline refresh needed on {}, skipping render", name, current);
        return Ok(outcomes);
    }

    info!("\"{}\": capturing baselines for {}", name, current);
    let captures = capture_states(pool, name, &document, options)?;

    let mut diffs = Vec::new();
    for capture in &captures {
        let path = store.image_path(name, Some(current), capture.idx, capture.state);
        let prior = store.read_image(&path)?;

        // A prior png here means the hash file went missing while the
        // pixel baselines survived (this refresh only runs when the hash
        // was absent or an update was forced); compare against it so the
        // recovery run still surfaces drift
        if let Some(prior) = prior {
            if !options.force_update {
                let result = visual_diff(&prior, &capture.png)?;
                if !result.identical {
                    let diff_path = store.diff_path(name, current, capture.idx, capture.state);
                    store.write_image(&diff_path, &result.composite)?;
                    diffs.push(diff_path);
                }
            }
        }

        store.write_image(&path, &capture.png)?;
    }

    let elements = captures.iter().map(|c| c.idx + 1).max().unwrap_or(0);
    store.write_manifest(&CaptureManifest {
        name: name.to_string(),
        platform: current,
        content_hash: hash,
        states: State::ordered(&options.states),
        elements,
        generated_at: chrono::Utc::now().to_rfc3339(),
    })?;

    if let Some(outcome) = outcomes.iter_mut().find(|o| o.platform == current) {
        outcome.diffs = diffs;
    }

    Ok(outcomes)
}

/// Always-diff capture.
///
/// Renders and captures unconditionally, comparing each capture against its
/// stored baseline (platform-agnostic filenames). Baselines are written only
/// when missing or when an update is forced; an existing baseline is left in
/// place so the returned composite shows what drifted.
pub fn screenshot_diff(
    pool: &BrowserPool,
    name: &str,
    subject: Subject<'_>,
    builder: &dyn CssBuilder,
    options: &CaptureOptions,
) -> CaptureResult<Vec<StateDiff>> {
    let markup = subject.into_markup();
    let document = assemble_document(&markup, options.css_paths.as_deref(), builder)?;
    let store = BaselineStore::new(&options.output_path);

    let captures = capture_states(pool, name, &document, options)?;

    let mut results = Vec::with_capacity(captures.len());
    for capture in captures {
        let path = store.image_path(name, None, capture.idx, capture.state);
        let prior = store.read_image(&path)?;

        let state_diff = match prior {
            Some(before) if !options.force_update => {
                let diff = visual_diff(&before, &capture.png)?;
                if !diff.identical {
                    info!(
                        "\"{}\": {} pixels differ in state {} (element {})",
                        name, diff.mismatched, capture.state, capture.idx
                    );
                }
                StateDiff {
                    state: capture.state,
                    idx: capture.idx,
                    before: Some(before),
                    after: capture.png,
                    diff: Some(diff.composite),
                    identical: diff.identical,
                }
            }
            _ => {
                store.write_image(&path, &capture.png)?;
                StateDiff {
                    state: capture.state,
                    idx: capture.idx,
                    before: None,
                    after: capture.png,
                    diff: None,
                    identical: true,
                }
            }
        };
        results.push(state_diff);
    }

    Ok(results)
}
