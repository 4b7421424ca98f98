pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS windows (
    id INTEGER PRIMARY KEY,
    app_name TEXT NOT NULL,
    title TEXT NOT NULL UNIQUE,
    executable TEXT,
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    closed_at INTEGER
);

CREATE TABLE IF NOT EXISTS browser_tabs (
    id INTEGER PRIMARY KEY,
    profile TEXT,
    url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_windows_closed_at ON windows(closed_at);
"#;
