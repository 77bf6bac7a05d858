//! Interaction state machine.
//!
//! Drives an element through its interaction states with real browser input
//! (CDP dispatch, not synthetic DOM events, so `:active`/`:hover`/`:focus`
//! pseudo-classes actually engage), captures pixels, and restores neutral
//! input between states so no state leaks into the next capture.

use std::sync::Arc;

use headless_chrome::protocol::cdp::Input;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Element, Tab};
use log::debug;

use crate::capture::types::{CapturedImage, CaptureError, CaptureResult, State};

/// JS that reports which top-level children qualify for capture
const ELIGIBLE_CHILDREN_JS: &str = "JSON.stringify(Array.from(document.body.children).flatMap((el, i) => { const r = el.getBoundingClientRect(); return (r.width > 0 && r.height > 0) ? [i] : []; }))";

/// JS that freezes every animation at its current frame
const CANCEL_ANIMATIONS_JS: &str = "document.getAnimations().forEach(a => a.cancel())";

/// JS that drops keyboard focus from whatever holds it
const BLUR_JS: &str = "document.activeElement && document.activeElement.blur()";

fn browser_err(e: impl ToString) -> CaptureError {
    CaptureError::Browser(e.to_string())
}

fn dispatch_mouse(
    tab: &Arc<Tab>,
    kind: Input::DispatchMouseEventTypeOption,
    x: f64,
    y: f64,
    button: Option<Input::MouseButton>,
) -> CaptureResult<()> {
    let click_count = button.as_ref().map(|_| 1);
    tab.call_method(Input::DispatchMouseEvent {
        Type: kind,
        x,
        y,
        button,
        click_count,
        modifiers: None,
        timestamp: None,
        buttons: None,
        force: None,
        tangential_pressure: None,
        tilt_x: None,
        tilt_y: None,
        twist: None,
        delta_x: None,
        delta_y: None,
        pointer_Type: None,
    })
    .map_err(browser_err)?;
    Ok(())
}

/// DOM indices of `body`'s direct children with a non-zero bounding box.
///
/// The returned values index into `body.children`; the capture loop numbers
/// elements by their position in this filtered list.
pub fn eligible_children(tab: &Arc<Tab>) -> CaptureResult<Vec<usize>> {
    let result = tab.evaluate(ELIGIBLE_CHILDREN_JS, false).map_err(browser_err)?;
    let raw = result
        .value
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| CaptureError::Browser("child scan returned no value".to_string()))?;
    serde_json::from_str(&raw)
        .map_err(|e| CaptureError::Browser(format!("child scan unparseable: {}", e)))
}

/// Freeze animations so captures are deterministic
pub fn cancel_animations(tab: &Arc<Tab>) -> CaptureResult<()> {
    tab.evaluate(CANCEL_ANIMATIONS_JS, false).map_err(browser_err)?;
    Ok(())
}

/// Put an element into `state` using real input events
pub fn apply(state: State, tab: &Arc<Tab>, element: &Element<'_>) -> CaptureResult<()> {
    match state {
        State::Default => {}
        State::Hover => {
            element.move_mouse_over().map_err(browser_err)?;
        }
        State::Active => {
            // Hover first so the cursor is over the element, then hold the
            // button down for the capture
            element.move_mouse_over().map_err(browser_err)?;
            let mid = element.get_midpoint().map_err(browser_err)?;
            dispatch_mouse(
                tab,
                Input::DispatchMouseEventTypeOption::MousePressed,
                mid.x,
                mid.y,
                Some(Input::MouseButton::Left),
            )?;
        }
        State::Focus => {
            element.focus().map_err(browser_err)?;
            // Park the cursor off-viewport so no hover styling bleeds into
            // the focus capture
            dispatch_mouse(
                tab,
                Input::DispatchMouseEventTypeOption::MouseMoved,
                -1.0,
                -1.0,
                None,
            )?;
        }
    }
    Ok(())
}

/// Return all input to neutral: button up, cursor parked, focus dropped.
///
/// Runs after every state, including after a failed capture, so one state's
/// residue never reaches the next.
pub fn reset_input(tab: &Arc<Tab>) -> CaptureResult<()> {
    dispatch_mouse(
        tab,
        Input::DispatchMouseEventTypeOption::MouseReleased,
        0.0,
        0.0,
        Some(Input::MouseButton::Left),
    )?;
    dispatch_mouse(
        tab,
        Input::DispatchMouseEventTypeOption::MouseMoved,
        0.0,
        0.0,
        None,
    )?;
    // Tab moves keyboard focus off the element; blur clears whatever
    // received it
    tab.press_key("Tab").map_err(browser_err)?;
    tab.evaluate(BLUR_JS, false).map_err(browser_err)?;
    Ok(())
}

/// Capture one element in one state as PNG pixels
fn capture_element(
    tab: &Arc<Tab>,
    state: State,
    dom_idx: usize,
    idx: usize,
) -> CaptureResult<CapturedImage> {
    // nth-child is 1-based and counts all children, so it takes the DOM
    // index rather than the filtered position
    let selector = format!("body > :nth-child({})", dom_idx + 1);
    let element = tab.find_element(&selector).map_err(browser_err)?;

    apply(state, tab, &element)?;
    cancel_animations(tab)?;

    let shot = element
        .capture_screenshot(CaptureScreenshotFormatOption::Png)
        .map_err(browser_err);

    // Reset before propagating any capture failure
    reset_input(tab)?;
    let png = shot?;

    debug!("captured element {} in state {}", idx, state);
    Ok(CapturedImage { state, idx, png })
}

/// Capture every eligible element in every requested state.
///
/// States run in canonical order; within a state, elements run in document
/// order. Indices are stable for the lifetime of the call.
pub fn capture_all(
    tab: &Arc<Tab>,
    states: &[State],
    children: &[usize],
) -> CaptureResult<Vec<CapturedImage>> {
    let mut captured = Vec::with_capacity(states.len() * children.len());
    for &state in &State::ordered(states) {
        for (idx, &dom_idx) in children.iter().enumerate() {
            captured.push(capture_element(tab, state, dom_idx, idx)?);
        }
    }
    Ok(captured)
}
