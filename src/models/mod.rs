pub mod tab;
pub mod window;

pub use tab::{is_restorable_url, TrackedTab};
pub use window::{derive_app_name, is_browser_name, TrackedWindow};
