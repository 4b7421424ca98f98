use rusqlite::{params, Connection, OptionalExtension, Result};

/// App names that identify a browser window. Browser windows are restored
/// through the tab path, never relaunched directly.
pub const BROWSER_NAMES: &[&str] = &["chrome", "chromium", "firefox", "edge", "brave", "safari"];

/// Short label for a window: the part of the title after the last `-`
/// separator, falling back to the whole title.
pub fn derive_app_name(title: &str) -> String {
    match title.rsplit_once('-') {
        Some((_, last)) if !last.trim().is_empty() => last.trim().to_string(),
        _ => title.trim().to_string(),
    }
}

pub fn is_browser_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    BROWSER_NAMES.iter().any(|b| lower.contains(b))
}

/// One observed application window across its lifetime. The title is the
/// identity key: titles are not guaranteed unique or stable, but they are the
/// best key the snapshot source offers, and the UNIQUE constraint keeps the
/// store at one row per title.
#[derive(Debug, Clone)]
pub struct TrackedWindow {
    pub id: Option<i64>,
    pub app_name: String,
    pub title: String,
    pub executable: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Unix seconds of the first tick this window was missing; None while open.
    pub closed_at: Option<i64>,
}

impl TrackedWindow {
    pub fn new(title: &str, app_name: &str, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            id: None,
            app_name: app_name.to_string(),
            title: title.to_string(),
            executable: None,
            x,
            y,
            width,
            height,
            closed_at: None,
        }
    }

    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO windows (app_name, title, executable, x, y, width, height, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.app_name,
                self.title,
                self.executable,
                self.x,
                self.y,
                self.width,
                self.height,
                self.closed_at,
            ],
        )?;
        self.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    /// Record a fresh observation: new metadata and geometry, and the window
    /// is open again whatever its previous state.
    pub fn update_observed(
        conn: &Connection,
        id: i64,
        app_name: &str,
        executable: Option<&str>,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<()> {
        conn.execute(
            "UPDATE windows
             SET app_name = ?1, executable = ?2, x = ?3, y = ?4, width = ?5, height = ?6,
                 closed_at = NULL
             WHERE id = ?7",
            params![app_name, executable, x, y, width, height, id],
        )?;
        Ok(())
    }

    pub fn mark_closed(conn: &Connection, id: i64, closed_at: i64) -> Result<()> {
        conn.execute(
            "UPDATE windows SET closed_at = ?1 WHERE id = ?2",
            params![closed_at, id],
        )?;
        Ok(())
    }

    /// Delete rows whose closure timestamp predates `cutoff`.
    /// Returns the number of evicted rows.
    pub fn evict_closed_before(conn: &Connection, cutoff: i64) -> Result<usize> {
        conn.execute(
            "DELETE FROM windows WHERE closed_at IS NOT NULL AND closed_at < ?1",
            params![cutoff],
        )
    }

    pub fn find_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, app_name, title, executable, x, y, width, height, closed_at
             FROM windows ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::from_row)?;
        rows.collect()
    }

    /// Windows not marked closed, i.e. open as of the last committed tick.
    pub fn find_open(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, app_name, title, executable, x, y, width, height, closed_at
             FROM windows WHERE closed_at IS NULL ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::from_row)?;
        rows.collect()
    }

    pub fn find_by_title(conn: &Connection, title: &str) -> Result<Option<Self>> {
        conn.query_row(
            "SELECT id, app_name, title, executable, x, y, width, height, closed_at
             FROM windows WHERE title = ?1",
            params![title],
            Self::from_row,
        )
        .optional()
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM windows", [], |row| row.get(0))
    }

    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            app_name: row.get(1)?,
            title: row.get(2)?,
            executable: row.get(3)?,
            x: row.get(4)?,
            y: row.get(5)?,
            width: row.get(6)?,
            height: row.get(7)?,
            closed_at: row.get(8)?,
        })
    }
}
