//! One-shot session restore: replay persisted windows and tabs onto a fresh
//! desktop session.
//!
//! Runs before tracking starts, and only when the store already held state at
//! startup. Individual launch, lookup and move failures are logged and
//! skipped; partial restoration is the accepted outcome. Only failing store
//! reads abort the sequence.

use crate::error::AppError;
use crate::models::{is_browser_name, is_restorable_url, TrackedTab, TrackedWindow};
use crate::platform::WindowSystem;
use crate::process::Launcher;
use crate::settings::{OpenMode, Settings};
use log::{info, warn};
use rusqlite::Connection;
use std::thread;

/// Used for the tab pass when no browser is in the known-executable map.
const DEFAULT_BROWSER_COMMAND: &str = "google-chrome";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    pub windows_attempted: usize,
    pub windows_launched: usize,
    pub windows_positioned: usize,
    pub windows_skipped: usize,
    pub tabs_opened: usize,
}

/// Replay the "open at last exit" view of the store: launch each window's
/// application, wait for it to settle, put its window back, then reopen the
/// recorded browser tabs.
pub fn restore_session(
    conn: &Connection,
    window_system: &dyn WindowSystem,
    launcher: &dyn Launcher,
    settings: &Settings,
) -> Result<RestoreSummary, AppError> {
    let mut summary = RestoreSummary::default();

    let open_windows = TrackedWindow::find_open(conn)?;
    info!("restoring {} windows", open_windows.len());

    for win in &open_windows {
        // Browser windows come back through the tab pass; launching them
        // here as well would duplicate the browser.
        if is_browser_name(&win.app_name) || is_browser_name(&win.title) {
            summary.windows_skipped += 1;
            continue;
        }

        let target = settings
            .known_executable(&win.app_name)
            .or_else(|| win.executable.clone());
        let Some(target) = target else {
            warn!("no launch target for '{}', skipping", win.title);
            summary.windows_skipped += 1;
            continue;
        };

        summary.windows_attempted += 1;
        match launcher.launch(&target, &[]) {
            Ok(()) => {
                summary.windows_launched += 1;
                thread::sleep(settings.settle_delay());
                summary.windows_positioned +=
                    usize::from(position_window(window_system, &win.title, win));
            }
            Err(e) => warn!("{}", e),
        }

        if settings.open_mode == OpenMode::OneByOne {
            thread::sleep(settings.paced_delay());
        }
    }

    summary.tabs_opened = restore_tabs(conn, window_system, launcher, settings, &open_windows)?;

    info!(
        "restore finished: {}/{} windows launched, {} positioned, {} skipped, {} tabs",
        summary.windows_launched,
        summary.windows_attempted,
        summary.windows_positioned,
        summary.windows_skipped,
        summary.tabs_opened,
    );
    Ok(summary)
}

fn position_window(window_system: &dyn WindowSystem, title: &str, win: &TrackedWindow) -> bool {
    match window_system.reposition(title, win.x, win.y, win.width, win.height) {
        Ok(true) => true,
        Ok(false) => {
            warn!("window '{}' not found after launch", title);
            false
        }
        Err(e) => {
            warn!("failed to position '{}': {}", title, e);
            false
        }
    }
}

/// Open every recorded tab in one browser invocation, then move the browser
/// window to wherever the stored browser-like window sat.
fn restore_tabs(
    conn: &Connection,
    window_system: &dyn WindowSystem,
    launcher: &dyn Launcher,
    settings: &Settings,
    open_windows: &[TrackedWindow],
) -> Result<usize, AppError> {
    let tabs = TrackedTab::find_all(conn)?;
    if tabs.is_empty() {
        return Ok(0);
    }

    let urls: Vec<String> = tabs
        .iter()
        .filter(|tab| {
            let ok = is_restorable_url(&tab.url);
            if !ok {
                warn!("skipping unrestorable tab url {}", tab.url);
            }
            ok
        })
        .map(|tab| tab.url.clone())
        .collect();
    if urls.is_empty() {
        return Ok(0);
    }

    let browser = settings
        .known_executable("chrome")
        .unwrap_or_else(|| DEFAULT_BROWSER_COMMAND.to_string());

    if let Err(e) = launcher.launch(&browser, &urls) {
        warn!("failed to reopen tabs: {}", e);
        return Ok(0);
    }
    thread::sleep(settings.settle_delay());

    let Some(stored) = open_windows
        .iter()
        .find(|w| is_browser_name(&w.app_name) || is_browser_name(&w.title))
    else {
        return Ok(urls.len());
    };

    // The relaunched browser will not reuse the stored title; find whatever
    // browser window exists now and move that.
    match window_system.enumerate_windows() {
        Ok(snapshot) => match snapshot.iter().find(|w| is_browser_name(&w.title)) {
            Some(live) => {
                position_window(window_system, &live.title, stored);
            }
            None => warn!("browser window not found after opening tabs"),
        },
        Err(e) => warn!("could not look up browser window: {}", e),
    }

    Ok(urls.len())
}
