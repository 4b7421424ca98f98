use crate::error::AppError;

/// One top-level OS window as seen in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowInfo {
    pub title: String,
    pub visible: bool,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub pid: Option<u32>,
}

pub trait WindowSystem: Send + Sync {
    /// A fresh, independent snapshot of every top-level window. Windows with
    /// empty titles may be included; callers filter them.
    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>, AppError>;

    /// Move and resize the first window whose title matches exactly.
    /// Returns Ok(false) when no such window exists.
    fn reposition(
        &self,
        title: &str,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<bool, AppError>;
}
