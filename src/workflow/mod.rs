pub mod course_ctx;
pub mod file_flow;

pub use course_ctx::{course_label, CourseCtx};
pub use file_flow::{FileJobPool, FileReport, FILE_POOL_LIMIT};
