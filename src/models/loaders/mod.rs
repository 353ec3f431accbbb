pub mod asset_parser;

pub use asset_parser::{load_course_assets, parse};
