pub mod db;
pub mod error;
pub mod models;
pub mod platform;
pub mod process;
pub mod restore;
pub mod settings;
pub mod tracker;

#[cfg(test)]
mod test_utils;

use crate::db::{migrations, Database};
use crate::error::AppError;
use crate::models::{TrackedTab, TrackedWindow};
use crate::platform::{NativeWindowSystem, WindowSystem};
use crate::process::CommandLauncher;
use crate::settings::Settings;
use crate::tracker::SessionTracker;
use directories::ProjectDirs;
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn project_dirs() -> Result<ProjectDirs, AppError> {
    ProjectDirs::from("com", "redesk", "Redesk")
        .ok_or_else(|| AppError::Settings("could not determine project directories".to_string()))
}

fn get_db_path() -> Result<PathBuf, AppError> {
    let proj_dirs = project_dirs()?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("redesk.db"))
}

pub fn settings_path() -> Result<PathBuf, AppError> {
    let proj_dirs = project_dirs()?;
    let config_dir = proj_dirs.config_dir();
    std::fs::create_dir_all(config_dir)?;
    Ok(config_dir.join("settings.json"))
}

/// Run the whole lifecycle: restore the previous session when the store holds
/// one, then track until a quit signal arrives.
pub fn run(settings: Settings) -> Result<(), AppError> {
    let db_path = get_db_path()?;
    let db = Database::open(&db_path)?;
    migrations::run(db.connection())?;

    // Persisted state from a previous run is the signal to restore.
    let had_state = TrackedWindow::count(db.connection())? > 0
        || TrackedTab::count(db.connection())? > 0;

    let window_system: Arc<dyn WindowSystem> = Arc::new(NativeWindowSystem::new()?);

    if had_state {
        info!("restoring previous session");
        let launcher = CommandLauncher;
        match restore::restore_session(
            db.connection(),
            window_system.as_ref(),
            &launcher,
            &settings,
        ) {
            Ok(summary) => info!("session restore done: {:?}", summary),
            Err(e) => error!("session restore aborted: {}", e),
        }
    } else {
        info!("no previous session, starting fresh");
    }

    let db = Arc::new(Mutex::new(db));
    let tracker = SessionTracker::new(Arc::clone(&db), window_system, settings);
    let handle = tracker.start();

    let stop = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&stop))?;
    flag::register(SIGTERM, Arc::clone(&stop))?;

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    info!("quit signal received, stopping tracker");
    tracker.stop();
    let _ = handle.join();
    Ok(())
}
