//! 课程资产数据模型
//!
//! 一个课程目录下的合并文本被解析为"目录清单 + 文件记录列表"

use std::collections::HashMap;

/// 单个文件记录
///
/// 解析后不可变，只被文件池和生成步骤只读使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// 源文本中声明的绝对路径
    pub path: String,
    /// 最后一个路径段
    pub name: String,
    /// 小写扩展名，包含前导点；没有扩展名时为空串
    pub extension: String,
    /// 去掉首尾空白后的原始内容
    pub content: String,
}

impl FileRecord {
    /// 从声明路径和内容构建记录
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let name = base_name(&path).to_string();
        let extension = extension_of(&name);
        Self {
            path,
            name,
            extension,
            content: content.into(),
        }
    }

    /// 不含扩展名的文件名
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => &self.name,
            Some(idx) => &self.name[..idx],
        }
    }
}

/// 一次课程任务的解析结果
///
/// `files` 的顺序等于源文本中 `File:` 标记出现的顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAssets {
    pub directory_listing: String,
    pub files: Vec<FileRecord>,
}

impl ParsedAssets {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// 出现不止一次的路径（按首次出现顺序）
    pub fn duplicate_paths(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order = Vec::new();
        for file in &self.files {
            let count = counts.entry(file.path.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                order.push(file.path.clone());
            }
        }
        order
    }
}

/// 按 `/` 或 `\` 切分后取最后一段
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// 最后一个 `.` 之后的部分（小写，含点）
pub fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) => name[idx..].to_lowercase(),
        None => String::new(),
    }
}
