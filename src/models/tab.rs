use rusqlite::{params, Connection, Result};
use url::Url;

/// A tab is worth restoring when its URL parses as an absolute URL and is not
/// a blank placeholder page.
pub fn is_restorable_url(raw: &str) -> bool {
    if raw == "about:blank" {
        return false;
    }
    Url::parse(raw).is_ok()
}

/// One browser tab to reopen at restore. Rows are append-only sample data;
/// they are never diffed against live browser state.
#[derive(Debug, Clone)]
pub struct TrackedTab {
    pub id: Option<i64>,
    pub profile: Option<String>,
    pub url: String,
}

impl TrackedTab {
    pub fn new(url: &str, profile: Option<&str>) -> Self {
        Self {
            id: None,
            profile: profile.map(|s| s.to_string()),
            url: url.to_string(),
        }
    }

    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO browser_tabs (profile, url) VALUES (?1, ?2)",
            params![self.profile, self.url],
        )?;
        self.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    pub fn find_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT id, profile, url FROM browser_tabs ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Self {
                id: Some(row.get(0)?),
                profile: row.get(1)?,
                url: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM browser_tabs", [], |row| row.get(0))
    }
}
