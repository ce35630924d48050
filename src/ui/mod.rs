pub mod icons;
pub mod progress;

pub use progress::{RunUI, banner_line};
