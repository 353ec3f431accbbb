pub mod asset;
pub mod file_type;
pub mod loaders;
pub mod outcome;
pub mod run_log;
pub mod skill;

pub use asset::{FileRecord, ParsedAssets};
pub use file_type::{is_prompt_excluded, route, Processor};
pub use loaders::{load_course_assets, parse};
pub use outcome::{ErrorKind, JobOutcome};
pub use run_log::{LogEntry, RunLog, RunRecorder, RunStatus};
pub use skill::{Skill, SkillRegistry};
