mod keys;
mod window;

pub use keys::key_name;
pub use window::{WindowDisplay, WindowKeys, open_window};
