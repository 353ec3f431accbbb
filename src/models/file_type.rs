//! 文件类型路由表
//!
//! 根据扩展名决定文件由谁处理：原样透传、跳过、或交给外部提取脚本

use phf::{phf_map, phf_set};

/// 文件处理器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Processor {
    /// 文本/代码，原样写出
    Passthrough,
    /// 视频/音频，直接跳过
    Skip,
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Sqlite,
    Access,
    Html,
    Image,
    Archive,
}

impl Processor {
    /// 对应的技能目录名
    pub fn skill_name(self) -> &'static str {
        match self {
            Processor::Passthrough => "passthrough",
            Processor::Skip => "skip",
            Processor::Pdf => "extractor-pdf",
            Processor::Docx => "extractor-docx",
            Processor::Pptx => "extractor-pptx",
            Processor::Xlsx => "db-extractor-xlsx",
            Processor::Sqlite => "db-extractor-sqlite",
            Processor::Access => "db-identify",
            Processor::Html => "extractor-html",
            Processor::Image => "extractor-image",
            Processor::Archive => "archive-extractor",
        }
    }

    /// 是否需要启动外部脚本
    pub fn is_external(self) -> bool {
        !matches!(self, Processor::Passthrough | Processor::Skip)
    }
}

static EXTENSION_MAP: phf::Map<&'static str, Processor> = phf_map! {
    // 文档
    ".pdf" => Processor::Pdf,
    ".docx" => Processor::Docx,
    ".doc" => Processor::Docx,
    ".pptx" => Processor::Pptx,
    ".ppt" => Processor::Pptx,
    ".xlsx" => Processor::Xlsx,
    ".xls" => Processor::Xlsx,
    // 数据库
    ".db" => Processor::Sqlite,
    ".sqlite" => Processor::Sqlite,
    ".sqlite3" => Processor::Sqlite,
    ".mdb" => Processor::Access,
    ".accdb" => Processor::Access,
    // HTML
    ".html" => Processor::Html,
    ".htm" => Processor::Html,
    ".xhtml" => Processor::Html,
    // 图片
    ".png" => Processor::Image,
    ".jpg" => Processor::Image,
    ".jpeg" => Processor::Image,
    ".gif" => Processor::Image,
    ".bmp" => Processor::Image,
    ".tiff" => Processor::Image,
    ".tif" => Processor::Image,
    // 压缩包
    ".zip" => Processor::Archive,
    ".rar" => Processor::Archive,
    ".7z" => Processor::Archive,
    ".tar" => Processor::Archive,
    ".gz" => Processor::Archive,
    ".tgz" => Processor::Archive,
    ".tar.gz" => Processor::Archive,
    ".tar.bz2" => Processor::Archive,
    ".tar.xz" => Processor::Archive,
    // 文本
    ".txt" => Processor::Passthrough,
    ".md" => Processor::Passthrough,
    ".csv" => Processor::Passthrough,
    ".json" => Processor::Passthrough,
    ".xml" => Processor::Passthrough,
    ".yaml" => Processor::Passthrough,
    ".yml" => Processor::Passthrough,
    ".srt" => Processor::Passthrough,
    ".vtt" => Processor::Passthrough,
    // 源代码
    ".ts" => Processor::Passthrough,
    ".tsx" => Processor::Passthrough,
    ".js" => Processor::Passthrough,
    ".jsx" => Processor::Passthrough,
    ".py" => Processor::Passthrough,
    ".java" => Processor::Passthrough,
    ".c" => Processor::Passthrough,
    ".cpp" => Processor::Passthrough,
    ".h" => Processor::Passthrough,
    ".hpp" => Processor::Passthrough,
    ".cs" => Processor::Passthrough,
    ".go" => Processor::Passthrough,
    ".rs" => Processor::Passthrough,
    ".rb" => Processor::Passthrough,
    ".php" => Processor::Passthrough,
    ".swift" => Processor::Passthrough,
    ".kt" => Processor::Passthrough,
    ".sql" => Processor::Passthrough,
    ".sh" => Processor::Passthrough,
    ".bash" => Processor::Passthrough,
    ".ps1" => Processor::Passthrough,
    ".bat" => Processor::Passthrough,
    ".cmd" => Processor::Passthrough,
    // 视频
    ".mp4" => Processor::Skip,
    ".mkv" => Processor::Skip,
    ".avi" => Processor::Skip,
    ".mov" => Processor::Skip,
    ".wmv" => Processor::Skip,
    ".flv" => Processor::Skip,
    ".webm" => Processor::Skip,
    // 音频
    ".mp3" => Processor::Skip,
    ".wav" => Processor::Skip,
    ".flac" => Processor::Skip,
    ".aac" => Processor::Skip,
    ".ogg" => Processor::Skip,
    ".wma" => Processor::Skip,
    ".m4a" => Processor::Skip,
};

/// 组合扩展名需要在单一后缀之前匹配
const COMPOUND_EXTENSIONS: [&str; 3] = [".tar.gz", ".tar.bz2", ".tar.xz"];

/// 不进入生成 prompt 的扩展名（视频/音频/可执行文件/压缩包）
static PROMPT_EXCLUDED: phf::Set<&'static str> = phf_set! {
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm",
    ".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma", ".m4a",
    ".exe", ".dll", ".so", ".dylib", ".bin", ".msi",
    ".zip", ".rar", ".7z", ".tar", ".gz", ".tgz", ".bz2", ".xz",
};

/// 为文件选择处理器，没有匹配时返回 `None`
pub fn route(name: &str, extension: &str) -> Option<Processor> {
    let lower = name.to_lowercase();
    COMPOUND_EXTENSIONS
        .iter()
        .find(|compound| lower.ends_with(**compound))
        .and_then(|compound| EXTENSION_MAP.get(*compound))
        .or_else(|| EXTENSION_MAP.get(extension))
        .copied()
}

/// 扩展名是否被排除在 prompt 之外
pub fn is_prompt_excluded(extension: &str) -> bool {
    PROMPT_EXCLUDED.contains(extension)
}
