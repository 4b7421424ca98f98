use super::{WindowInfo, WindowSystem};
use crate::error::AppError;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConfigureWindowAux, ConnectionExt, MapState, Window};
use x11rb::rust_connection::RustConnection;

pub struct X11WindowSystem {
    conn: RustConnection,
    root: Window,
}

impl X11WindowSystem {
    pub fn new() -> Result<Self, AppError> {
        let (conn, screen_num) = x11rb::connect(None)
            .map_err(|e| AppError::WindowSystem(format!("failed to connect to X server: {}", e)))?;
        let root = conn.setup().roots[screen_num].root;

        Ok(Self { conn, root })
    }

    fn get_atom(&self, name: &str) -> Option<u32> {
        self.conn
            .intern_atom(false, name.as_bytes())
            .ok()?
            .reply()
            .ok()
            .map(|r| r.atom)
    }

    fn get_string_property(&self, window: Window, atom: u32) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, atom, AtomEnum::ANY, 0, 1024)
            .ok()?
            .reply()
            .ok()?;

        if reply.value.is_empty() {
            return None;
        }

        String::from_utf8(reply.value).ok()
    }

    fn window_title(&self, window: Window) -> String {
        self.get_atom("_NET_WM_NAME")
            .and_then(|atom| self.get_string_property(window, atom))
            .or_else(|| self.get_string_property(window, AtomEnum::WM_NAME.into()))
            .unwrap_or_default()
    }

    fn window_pid(&self, window: Window) -> Option<u32> {
        let atom = self.get_atom("_NET_WM_PID")?;
        let reply = self
            .conn
            .get_property(false, window, atom, AtomEnum::CARDINAL, 0, 1)
            .ok()?
            .reply()
            .ok()?;
        let value = reply.value32()?.next();
        value
    }

    /// Root-relative position plus size, or None when the window is gone.
    fn window_geometry(&self, window: Window) -> Option<(i32, i32, i32, i32)> {
        let geom = self.conn.get_geometry(window).ok()?.reply().ok()?;
        let pos = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)
            .ok()?
            .reply()
            .ok()?;

        Some((
            i32::from(pos.dst_x),
            i32::from(pos.dst_y),
            i32::from(geom.width),
            i32::from(geom.height),
        ))
    }

    fn is_viewable(&self, window: Window) -> bool {
        self.conn
            .get_window_attributes(window)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map(|attrs| attrs.map_state == MapState::VIEWABLE)
            .unwrap_or(false)
    }

    fn client_list(&self) -> Result<Vec<Window>, AppError> {
        let atom = self
            .get_atom("_NET_CLIENT_LIST")
            .ok_or_else(|| AppError::WindowSystem("_NET_CLIENT_LIST atom unavailable".to_string()))?;
        let reply = self
            .conn
            .get_property(false, self.root, atom, AtomEnum::WINDOW, 0, u32::MAX)
            .map_err(|e| AppError::WindowSystem(e.to_string()))?
            .reply()
            .map_err(|e| AppError::WindowSystem(e.to_string()))?;
        let ids = reply
            .value32()
            .ok_or_else(|| AppError::WindowSystem("unexpected _NET_CLIENT_LIST format".to_string()))?;
        Ok(ids.collect())
    }
}

impl WindowSystem for X11WindowSystem {
    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>, AppError> {
        let mut windows = Vec::new();
        for id in self.client_list()? {
            // A window can vanish between the list fetch and the property
            // reads; drop it from this snapshot.
            let Some((x, y, width, height)) = self.window_geometry(id) else {
                continue;
            };

            windows.push(WindowInfo {
                title: self.window_title(id),
                visible: self.is_viewable(id),
                x,
                y,
                width,
                height,
                pid: self.window_pid(id),
            });
        }
        Ok(windows)
    }

    fn reposition(
        &self,
        title: &str,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<bool, AppError> {
        for id in self.client_list()? {
            if self.window_title(id) != title {
                continue;
            }

            let values = ConfigureWindowAux::new()
                .x(x)
                .y(y)
                .width(width.max(1) as u32)
                .height(height.max(1) as u32);
            self.conn
                .configure_window(id, &values)
                .map_err(|e| AppError::WindowSystem(e.to_string()))?;
            self.conn
                .flush()
                .map_err(|e| AppError::WindowSystem(e.to_string()))?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires X11 display
    fn test_enumerate_windows() {
        let ws = X11WindowSystem::new().unwrap();
        for win in ws.enumerate_windows().unwrap() {
            println!("{} ({}x{} at {},{})", win.title, win.width, win.height, win.x, win.y);
        }
    }
}
