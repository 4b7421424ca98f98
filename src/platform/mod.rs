pub mod types;

pub use types::{WindowInfo, WindowSystem};

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::X11WindowSystem as NativeWindowSystem;

// Stub for development on other platforms
#[cfg(not(target_os = "linux"))]
pub struct NativeWindowSystem;

#[cfg(not(target_os = "linux"))]
impl WindowSystem for NativeWindowSystem {
    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>, crate::error::AppError> {
        Ok(Vec::new())
    }

    fn reposition(
        &self,
        _title: &str,
        _x: i32,
        _y: i32,
        _width: i32,
        _height: i32,
    ) -> Result<bool, crate::error::AppError> {
        Ok(false)
    }
}

#[cfg(not(target_os = "linux"))]
impl NativeWindowSystem {
    pub fn new() -> Result<Self, crate::error::AppError> {
        Ok(Self)
    }
}
