//! 技能定义
//!
//! 技能 = 交给外部生成进程的指令文本 + 输出目录命名约定。
//! 内置 `sop` 与 `summary` 两个技能，也可以从 `<skills_dir>/<id>/skill.toml` 加载。

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// 一个可用的技能
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
    /// 课程目录下的输出子目录名
    pub output_dir: String,
    /// 指令正文
    pub instructions: String,
    /// 视为产物的文件扩展名
    pub artifact_extensions: Vec<String>,
}

impl Skill {
    /// 文件是否算作该技能的产物
    pub fn is_artifact(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.artifact_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }
}

/// skill.toml 的内容
#[derive(Debug, Deserialize)]
struct SkillFile {
    name: Option<String>,
    #[serde(default)]
    description: String,
    output_dir: String,
    instructions: Option<String>,
    instructions_file: Option<String>,
    #[serde(default = "default_artifact_extensions")]
    artifact_extensions: Vec<String>,
}

fn default_artifact_extensions() -> Vec<String> {
    vec![".md".to_string()]
}

/// 技能注册表
#[derive(Debug, Clone)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Skill>,
}

impl SkillRegistry {
    /// 只包含内置技能
    pub fn builtin() -> Self {
        let mut skills = BTreeMap::new();
        for skill in [sop_skill(), summary_skill()] {
            skills.insert(skill.id.clone(), skill);
        }
        Self { skills }
    }

    /// 内置技能 + 目录中的自定义技能（同名时自定义覆盖内置）
    pub async fn load(skills_dir: Option<&Path>) -> Result<Self> {
        let mut registry = Self::builtin();

        let Some(dir) = skills_dir else {
            return Ok(registry);
        };

        if !dir.exists() {
            warn!("⚠️ 技能目录不存在，只使用内置技能: {}", dir.display());
            return Ok(registry);
        }

        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("无法读取技能目录: {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let skill_dir = entry.path();
            let manifest = skill_dir.join("skill.toml");
            if !manifest.is_file() {
                continue;
            }

            let id = entry.file_name().to_string_lossy().to_string();
            let skill = load_skill(&id, &skill_dir, &manifest).await?;
            info!("加载技能: {} -> {}", skill.id, skill.output_dir);
            registry.skills.insert(skill.id.clone(), skill);
        }

        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&Skill> {
        self.skills.get(id)
    }

    /// 查找技能，找不到时返回列出全部可用技能的错误
    pub fn resolve(&self, id: &str) -> Result<&Skill, ConfigError> {
        self.get(id).ok_or_else(|| ConfigError::UnknownSkill {
            id: id.to_string(),
            available: self.ids().join(", "),
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.skills.keys().cloned().collect()
    }
}

async fn load_skill(id: &str, skill_dir: &Path, manifest: &Path) -> Result<Skill> {
    let raw = fs::read_to_string(manifest)
        .await
        .with_context(|| format!("无法读取技能文件: {}", manifest.display()))?;

    let file: SkillFile = toml::from_str(&raw).map_err(|source| ConfigError::SkillLoadFailed {
        path: manifest.display().to_string(),
        source,
    })?;

    let instructions = match (file.instructions, file.instructions_file) {
        (Some(inline), _) => inline,
        (None, file_name) => {
            let path = skill_dir.join(file_name.as_deref().unwrap_or("SKILL.md"));
            debug!("读取技能指令: {}", path.display());
            fs::read_to_string(&path)
                .await
                .with_context(|| format!("无法读取技能指令: {}", path.display()))?
        }
    };

    Ok(Skill {
        id: id.to_string(),
        name: file.name.unwrap_or_else(|| id.to_string()),
        description: file.description,
        output_dir: file.output_dir,
        instructions,
        artifact_extensions: file.artifact_extensions,
    })
}

fn sop_skill() -> Skill {
    Skill {
        id: "sop".to_string(),
        name: "SOP Generator".to_string(),
        description: "Generate Standard Operating Procedures from course content".to_string(),
        output_dir: "__ccg_SOP".to_string(),
        instructions: SOP_INSTRUCTIONS.to_string(),
        artifact_extensions: default_artifact_extensions(),
    }
}

fn summary_skill() -> Skill {
    Skill {
        id: "summary".to_string(),
        name: "Summary Generator".to_string(),
        description: "Generate structured documentation from course content".to_string(),
        output_dir: "__ccg_Summary".to_string(),
        instructions: SUMMARY_INSTRUCTIONS.to_string(),
        artifact_extensions: default_artifact_extensions(),
    }
}

const SOP_INSTRUCTIONS: &str = r#"You are generating Standard Operating Procedures (SOPs) from course material.

Identify every procedure in the material that has at least three concrete steps.
For each procedure write one markdown file under `procedures/` named `SOP-NNN_<Short_Title>.md` containing:
Document ID, Source, Purpose, Scope, Prerequisites, numbered Procedure steps, Verification and Troubleshooting.

Also write:
- `README.md` with an index table (ID, procedure, step count, source),
- `quick_reference.md` with a condensed checklist per procedure,
- `glossary.md` with the terms and definitions used by the course.

Write only inside the output directory given below."#;

const SUMMARY_INSTRUCTIONS: &str = r#"You are generating structured study documentation from course material.

Write markdown files:
- `summary.md`: an overview of the course followed by one section per main topic,
- `key_concepts.md`: the key terms and definitions,
- `outline.md`: a hierarchical outline that follows the course's own ordering.

Quote code and commands exactly as they appear in the material.
Write only inside the output directory given below."#;
