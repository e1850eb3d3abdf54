pub mod canvas;
pub mod headless;
pub mod stimuli;
pub mod text;

pub use canvas::{Canvas, RenderError};
pub use headless::HeadlessDisplay;
pub use stimuli::{Circle, Fixation, Rectangle, Text};
pub use text::{MESSAGE_SIZE_PX, draw_message, load_font, render_text_pixmap};
