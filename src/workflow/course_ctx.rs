//! 课程处理上下文
//!
//! 封装"我正在处理第几门课程、它的各个目录在哪"这一信息

use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::skill::Skill;

/// 课程处理上下文
///
/// 不同课程的目录互不重叠，由课程目录本身保证
#[derive(Debug, Clone)]
pub struct CourseCtx {
    /// 课程索引（从 1 开始，也是进度槽位 id）
    pub index: usize,

    /// 展示名（课程目录名）
    pub label: String,

    pub course_dir: PathBuf,

    /// 技能 id
    pub skill_id: String,

    /// 合并资产文件名
    pub asset_file_name: String,

    /// 技能输出目录
    pub output_dir: PathBuf,

    /// 提取产物目录
    pub validated_dir: PathBuf,

    /// 运行日志目录
    pub logs_dir: PathBuf,
}

impl CourseCtx {
    /// 创建新的课程上下文
    pub fn new(index: usize, course_dir: impl Into<PathBuf>, config: &Config, skill: &Skill) -> Self {
        let course_dir = course_dir.into();
        Self {
            index,
            label: course_label(&course_dir),
            skill_id: skill.id.clone(),
            output_dir: course_dir.join(&skill.output_dir),
            validated_dir: course_dir.join(&config.validated_dir_name),
            logs_dir: course_dir.join(&config.logs_dir_name),
            asset_file_name: config.asset_file_name.clone(),
            course_dir,
        }
    }

    pub fn asset_path(&self) -> PathBuf {
        self.course_dir.join(&self.asset_file_name)
    }
}

impl Display for CourseCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[课程 {}]", self.index)
    }
}

/// 目录名作为课程展示名，取不到时退回完整路径
pub fn course_label(course_dir: &Path) -> String {
    course_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| course_dir.display().to_string())
}
