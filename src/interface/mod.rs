pub mod render;

pub use render::{display_report, display_space};
