//! Session reconciliation: diff each window snapshot against the store.
//!
//! Every tick classifies each tracked window as new, still-open, closed or
//! expired, entirely from title identity. Closure detection runs before the
//! upsert pass so a window that disappears and reappears between ticks is
//! revived instead of duplicated. All mutations of one tick commit as a
//! single transaction.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{derive_app_name, is_browser_name, is_restorable_url, TrackedTab, TrackedWindow};
use crate::platform::{WindowInfo, WindowSystem};
use crate::process::{ExecutableResolver, SysinfoResolver};
use crate::settings::Settings;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// Placeholder tab set recorded the first time a browser window is seen.
/// Real tab discovery needs browser automation; until that is wired in,
/// restore reopens this fixed set.
const FALLBACK_TAB_SEED: &[&str] = &["https://www.google.com/", "https://mail.google.com/"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub live: usize,
    pub inserted: usize,
    pub updated: usize,
    pub closed: usize,
    pub evicted: usize,
    pub tabs_seeded: usize,
}

impl TickSummary {
    fn changed(&self) -> bool {
        self.inserted + self.closed + self.evicted + self.tabs_seeded > 0
    }
}

/// One observe-diff-mutate cycle. Commits fully or rolls back entirely.
pub fn tick(
    conn: &Connection,
    snapshot: &[WindowInfo],
    now: i64,
    settings: &Settings,
    resolver: &dyn ExecutableResolver,
) -> Result<TickSummary, AppError> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = TickSummary::default();

    let stored = TrackedWindow::find_all(&tx)?;
    let index: HashMap<&str, Option<i64>> = stored
        .iter()
        .map(|row| (row.title.as_str(), row.id))
        .collect();

    let live_titles: HashSet<&str> = snapshot
        .iter()
        .filter(|w| !w.title.is_empty())
        .map(|w| w.title.as_str())
        .collect();
    summary.live = live_titles.len();

    // Closure detection first: anything it wrongly marks because the window
    // is still live gets un-closed by the upsert pass below.
    for row in &stored {
        if row.closed_at.is_none() && !live_titles.contains(row.title.as_str()) {
            if let Some(id) = row.id {
                TrackedWindow::mark_closed(&tx, id, now)?;
                summary.closed += 1;
            }
        }
    }

    // Upsert pass over visible, titled windows. Duplicate titles within one
    // snapshot collapse into the first occurrence; title is the identity key.
    let mut seen: HashSet<&str> = HashSet::new();
    for win in snapshot {
        if win.title.is_empty() || !win.visible || !seen.insert(win.title.as_str()) {
            continue;
        }

        let app_name = derive_app_name(&win.title);
        let executable = resolve_executable(win, &app_name, settings, resolver);

        match index.get(win.title.as_str()) {
            Some(Some(id)) => {
                TrackedWindow::update_observed(
                    &tx,
                    *id,
                    &app_name,
                    executable.as_deref(),
                    win.x,
                    win.y,
                    win.width,
                    win.height,
                )?;
                summary.updated += 1;
            }
            _ => {
                let mut row =
                    TrackedWindow::new(&win.title, &app_name, win.x, win.y, win.width, win.height);
                row.executable = executable;
                row.save(&tx)?;
                summary.inserted += 1;
            }
        }
    }

    summary.evicted =
        TrackedWindow::evict_closed_before(&tx, now - settings.closure_grace_secs)?;

    summary.tabs_seeded = seed_tabs_if_needed(&tx, snapshot)?;

    tx.commit()?;
    Ok(summary)
}

fn resolve_executable(
    win: &WindowInfo,
    app_name: &str,
    settings: &Settings,
    resolver: &dyn ExecutableResolver,
) -> Option<String> {
    if let Some(pid) = win.pid {
        match resolver.resolve(pid) {
            Some(path) => return Some(path.to_string_lossy().into_owned()),
            None => debug!("no executable for pid {} ('{}')", pid, win.title),
        }
    }
    settings.known_executable(app_name)
}

/// Record the fallback tab set once, the first time a browser window shows up
/// while the tab table is empty. The count guard keeps later ticks from
/// duplicating the seed.
fn seed_tabs_if_needed(conn: &Connection, snapshot: &[WindowInfo]) -> Result<usize, AppError> {
    let browser_open = snapshot
        .iter()
        .any(|w| !w.title.is_empty() && is_browser_name(&w.title));
    if !browser_open || TrackedTab::count(conn)? > 0 {
        return Ok(0);
    }

    let mut seeded = 0;
    for url in FALLBACK_TAB_SEED {
        if !is_restorable_url(url) {
            warn!("skipping unrestorable seed url {}", url);
            continue;
        }
        TrackedTab::new(url, None).save(conn)?;
        seeded += 1;
    }
    Ok(seeded)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// Polls the window system on a fixed cadence and reconciles each snapshot
/// into the store. Cancellation is cooperative: the running flag is checked
/// once per iteration, so an in-flight tick always completes.
pub struct SessionTracker {
    settings: Settings,
    running: Arc<AtomicBool>,
    db: Arc<Mutex<Database>>,
    window_system: Arc<dyn WindowSystem>,
}

impl SessionTracker {
    pub fn new(
        db: Arc<Mutex<Database>>,
        window_system: Arc<dyn WindowSystem>,
        settings: Settings,
    ) -> Self {
        Self {
            settings,
            running: Arc::new(AtomicBool::new(false)),
            db,
            window_system,
        }
    }

    pub fn start(&self) -> thread::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let db = Arc::clone(&self.db);
        let window_system = Arc::clone(&self.window_system);
        let settings = self.settings.clone();

        thread::spawn(move || {
            let resolver = SysinfoResolver;

            while running.load(Ordering::SeqCst) {
                match window_system.enumerate_windows() {
                    Ok(snapshot) => {
                        if let Ok(db) = db.lock() {
                            match tick(db.connection(), &snapshot, unix_now(), &settings, &resolver)
                            {
                                Ok(summary) if summary.changed() => {
                                    info!("session tick: {:?}", summary);
                                }
                                Ok(summary) => debug!("session tick: {:?}", summary),
                                Err(e) => {
                                    error!("tick failed, retrying next interval: {}", e);
                                }
                            }
                        }
                    }
                    Err(e) => error!("window snapshot failed: {}", e),
                }

                thread::sleep(settings.poll_interval());
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;
    use std::path::PathBuf;
    use std::time::Duration;

    struct NullResolver;

    impl ExecutableResolver for NullResolver {
        fn resolve(&self, _pid: u32) -> Option<PathBuf> {
            None
        }
    }

    struct FixedResolver(PathBuf);

    impl ExecutableResolver for FixedResolver {
        fn resolve(&self, _pid: u32) -> Option<PathBuf> {
            Some(self.0.clone())
        }
    }

    fn window(title: &str) -> WindowInfo {
        WindowInfo {
            title: title.to_string(),
            visible: true,
            x: 10,
            y: 10,
            width: 800,
            height: 600,
            pid: None,
        }
    }

    fn test_settings() -> Settings {
        Settings {
            settle_delay_secs: 0,
            paced_delay_secs: 0,
            ..Settings::default()
        }
    }

    #[test]
    fn test_first_observation_inserts_row() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        let snapshot = vec![window("Editor - file.txt")];
        let summary = tick(conn, &snapshot, 1000, &settings, &NullResolver).unwrap();

        assert_eq!(summary.inserted, 1);
        let rows = TrackedWindow::find_all(conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Editor - file.txt");
        assert_eq!(rows[0].app_name, "file.txt");
        assert!(rows[0].closed_at.is_none());
    }

    #[test]
    fn test_identical_snapshot_is_idempotent() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        let snapshot = vec![window("Editor - file.txt"), window("Terminal")];
        tick(conn, &snapshot, 1000, &settings, &NullResolver).unwrap();
        let before = TrackedWindow::find_all(conn).unwrap();

        let summary = tick(conn, &snapshot, 1005, &settings, &NullResolver).unwrap();
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.closed, 0);

        let after = TrackedWindow::find_all(conn).unwrap();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.title, a.title);
            assert_eq!(b.app_name, a.app_name);
            assert_eq!((b.x, b.y, b.width, b.height), (a.x, a.y, a.width, a.height));
            assert_eq!(b.closed_at, a.closed_at);
        }
    }

    #[test]
    fn test_closure_then_revival() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        let snapshot = vec![window("Editor - file.txt")];
        tick(conn, &snapshot, 1000, &settings, &NullResolver).unwrap();

        let summary = tick(conn, &[], 1005, &settings, &NullResolver).unwrap();
        assert_eq!(summary.closed, 1);
        let row = TrackedWindow::find_by_title(conn, "Editor - file.txt")
            .unwrap()
            .unwrap();
        assert_eq!(row.closed_at, Some(1005));

        let summary = tick(conn, &snapshot, 1010, &settings, &NullResolver).unwrap();
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.updated, 1);
        let rows = TrackedWindow::find_all(conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].closed_at.is_none());
    }

    #[test]
    fn test_grace_period_eviction_boundary() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();
        let grace = settings.closure_grace_secs;
        let now = 10_000;

        let mut expired = TrackedWindow::new("Expired", "Expired", 0, 0, 100, 100);
        expired.save(conn).unwrap();
        TrackedWindow::mark_closed(conn, expired.id.unwrap(), now - grace - 1).unwrap();

        let mut recent = TrackedWindow::new("Recent", "Recent", 0, 0, 100, 100);
        recent.save(conn).unwrap();
        TrackedWindow::mark_closed(conn, recent.id.unwrap(), now - grace + 1).unwrap();

        let summary = tick(conn, &[], now, &settings, &NullResolver).unwrap();
        assert_eq!(summary.evicted, 1);

        let rows = TrackedWindow::find_all(conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Recent");
    }

    #[test]
    fn test_empty_titles_are_filtered() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        let snapshot = vec![window(""), window("Editor")];
        let summary = tick(conn, &snapshot, 1000, &settings, &NullResolver).unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.live, 1);
        let rows = TrackedWindow::find_all(conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Editor");
    }

    #[test]
    fn test_invisible_window_not_upserted_but_keeps_row_open() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        tick(conn, &[window("Editor")], 1000, &settings, &NullResolver).unwrap();

        // Still present in the snapshot, just not viewable: no update, but
        // not a closure either.
        let mut hidden = window("Editor");
        hidden.visible = false;
        let summary = tick(conn, &[hidden], 1005, &settings, &NullResolver).unwrap();
        assert_eq!(summary.closed, 0);
        assert_eq!(summary.updated, 0);

        let row = TrackedWindow::find_by_title(conn, "Editor").unwrap().unwrap();
        assert!(row.closed_at.is_none());
    }

    #[test]
    fn test_duplicate_titles_collapse_to_one_row() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        let snapshot = vec![window("Editor"), window("Editor")];
        let summary = tick(conn, &snapshot, 1000, &settings, &NullResolver).unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(TrackedWindow::count(conn).unwrap(), 1);
    }

    #[test]
    fn test_executable_from_resolver() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        let mut win = window("Editor");
        win.pid = Some(4242);
        let resolver = FixedResolver(PathBuf::from("/usr/bin/editor"));
        tick(conn, &[win], 1000, &settings, &resolver).unwrap();

        let row = TrackedWindow::find_by_title(conn, "Editor").unwrap().unwrap();
        assert_eq!(row.executable.as_deref(), Some("/usr/bin/editor"));
    }

    #[test]
    fn test_executable_falls_back_to_known_mapping() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let mut settings = test_settings();
        settings
            .known_executables
            .insert("terminal".to_string(), "/usr/bin/xterm".to_string());

        let mut win = window("dev - Terminal");
        win.pid = Some(4242);
        tick(conn, &[win], 1000, &settings, &NullResolver).unwrap();

        let row = TrackedWindow::find_by_title(conn, "dev - Terminal")
            .unwrap()
            .unwrap();
        assert_eq!(row.executable.as_deref(), Some("/usr/bin/xterm"));
    }

    #[test]
    fn test_unresolvable_executable_does_not_fail_tick() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        let mut win = window("Mystery Window");
        win.pid = Some(99_999);
        let summary = tick(conn, &[win], 1000, &settings, &NullResolver).unwrap();

        assert_eq!(summary.inserted, 1);
        let row = TrackedWindow::find_by_title(conn, "Mystery Window")
            .unwrap()
            .unwrap();
        assert!(row.executable.is_none());
    }

    #[test]
    fn test_browser_window_seeds_tabs_once() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        let snapshot = vec![window("Gmail - Google Chrome")];
        let summary = tick(conn, &snapshot, 1000, &settings, &NullResolver).unwrap();
        assert_eq!(summary.tabs_seeded, FALLBACK_TAB_SEED.len());

        let summary = tick(conn, &snapshot, 1005, &settings, &NullResolver).unwrap();
        assert_eq!(summary.tabs_seeded, 0);
        assert_eq!(TrackedTab::count(conn).unwrap() as usize, FALLBACK_TAB_SEED.len());
    }

    #[test]
    fn test_no_browser_no_seed() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        tick(conn, &[window("Editor")], 1000, &settings, &NullResolver).unwrap();
        assert_eq!(TrackedTab::count(conn).unwrap(), 0);
    }

    #[test]
    fn test_failed_tick_rolls_back_completely() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();

        // Force a failure late in the tick, at tab seeding.
        conn.execute_batch(
            "CREATE TRIGGER block_tab_seed BEFORE INSERT ON browser_tabs
             BEGIN SELECT RAISE(ABORT, 'seed blocked'); END;",
        )
        .unwrap();

        let snapshot = vec![window("Editor"), window("Gmail - Google Chrome")];
        let result = tick(conn, &snapshot, 1000, &settings, &NullResolver);
        assert!(result.is_err());

        // The window inserts from the same tick must have rolled back too.
        assert_eq!(TrackedWindow::count(conn).unwrap(), 0);
        assert_eq!(TrackedTab::count(conn).unwrap(), 0);
    }

    #[test]
    fn test_end_to_end_lifecycle() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let settings = test_settings();
        let grace = settings.closure_grace_secs;

        let snapshot = vec![window("Editor - file.txt")];
        tick(conn, &snapshot, 1000, &settings, &NullResolver).unwrap();
        let row = TrackedWindow::find_by_title(conn, "Editor - file.txt")
            .unwrap()
            .unwrap();
        assert_eq!(row.app_name, "file.txt");
        assert!(row.closed_at.is_none());

        tick(conn, &[], 1005, &settings, &NullResolver).unwrap();
        let row = TrackedWindow::find_by_title(conn, "Editor - file.txt")
            .unwrap()
            .unwrap();
        assert_eq!(row.closed_at, Some(1005));

        tick(conn, &[], 1005 + grace + 1, &settings, &NullResolver).unwrap();
        assert!(TrackedWindow::find_by_title(conn, "Editor - file.txt")
            .unwrap()
            .is_none());
    }

    mod service {
        use super::*;

        struct FakeWindowSystem {
            windows: Vec<WindowInfo>,
        }

        impl WindowSystem for FakeWindowSystem {
            fn enumerate_windows(&self) -> Result<Vec<WindowInfo>, AppError> {
                Ok(self.windows.clone())
            }

            fn reposition(
                &self,
                _title: &str,
                _x: i32,
                _y: i32,
                _width: i32,
                _height: i32,
            ) -> Result<bool, AppError> {
                Ok(false)
            }
        }

        #[test]
        fn test_tracker_starts_ticks_and_stops() {
            let (db, _dir) = setup_test_db();
            let db = Arc::new(Mutex::new(db));
            let window_system: Arc<dyn WindowSystem> = Arc::new(FakeWindowSystem {
                windows: vec![window("Editor - notes.txt")],
            });
            let mut settings = test_settings();
            settings.poll_interval_secs = 1;

            let tracker = SessionTracker::new(Arc::clone(&db), window_system, settings);
            assert!(!tracker.is_running());

            let handle = tracker.start();
            assert!(tracker.is_running());

            thread::sleep(Duration::from_millis(150));

            tracker.stop();
            handle.join().unwrap();
            assert!(!tracker.is_running());

            let db = db.lock().unwrap();
            assert_eq!(TrackedWindow::count(db.connection()).unwrap(), 1);
        }
    }
}
