//! 业务能力层
//!
//! 每个服务只提供一种能力，不关心课程池和处理流程

pub mod extraction_service;
pub mod generation_service;
pub mod run_log_writer;

pub use extraction_service::{ExtractionResult, ExtractionTask, Extractor, ScriptExtractor};
pub use generation_service::{
    build_prompt, CliBackend, GenerationBackend, GenerationResult, GenerationService, Prompt,
    MAX_PROMPT_CHARS,
};
pub use run_log_writer::RunLogWriter;
