use crate::models::asset::{FileRecord, ParsedAssets};
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;

static DIRECTORY_HEADER: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?mi)^={8,}[ \t]*\nDirectory List[ \t]*:?[ \t]*\n={8,}[ \t]*$")
});

static FILES_HEADER: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?mi)^={8,}[ \t]*\nFiles[ \t]*:?[ \t]*\n={8,}[ \t]*$")
});

static FILE_MARKER: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r#"(?m)^=+[ \t]*\nFile:[ \t]*"([^"\n]*)">?[ \t]*\n=+[ \t]*$"#)
});

/// 取出预编译的正则，编译失败时报错
fn compiled(pattern: &'static LazyLock<Result<Regex, regex::Error>>) -> Result<&'static Regex> {
    pattern
        .as_ref()
        .map_err(|err| anyhow::anyhow!("资产解析正则编译失败: {}", err))
}

/// 把合并后的课程资产文本解析为目录清单 + 文件记录
///
/// - 先统一换行为 LF
/// - 没有 Files 段时返回空文件列表，由调用方决定是否致命
/// - 文件顺序 = `File:` 标记出现顺序；重复路径全部保留
pub fn parse(raw: &str) -> Result<ParsedAssets> {
    let directory_header = compiled(&DIRECTORY_HEADER)?;
    let file_marker = compiled(&FILE_MARKER)?;
    let text = raw.replace("\r\n", "\n");

    let files_header = compiled(&FILES_HEADER)?.find(&text);

    let directory_listing = match directory_header.find(&text) {
        Some(header) => {
            let end = files_header
                .filter(|files| files.start() >= header.end())
                .map(|files| files.start())
                .unwrap_or(text.len());
            text[header.end()..end].trim().to_string()
        }
        None => String::new(),
    };

    let Some(files_header) = files_header else {
        return Ok(ParsedAssets {
            directory_listing,
            files: Vec::new(),
        });
    };

    let section = &text[files_header.end()..];

    let markers: Vec<(usize, usize, String)> = file_marker
        .captures_iter(section)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let path = caps.get(1)?;
            Some((whole.start(), whole.end(), path.as_str().trim().to_string()))
        })
        .collect();

    let files = markers
        .iter()
        .enumerate()
        .map(|(idx, (_, content_start, path))| {
            let content_end = markers
                .get(idx + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(section.len());
            FileRecord::new(path.clone(), section[*content_start..content_end].trim())
        })
        .collect();

    Ok(ParsedAssets {
        directory_listing,
        files,
    })
}

/// 读取课程目录下的资产文件并解析
pub async fn load_course_assets(course_dir: &Path, asset_file_name: &str) -> Result<ParsedAssets> {
    let asset_path = course_dir.join(asset_file_name);
    let bytes = fs::read(&asset_path)
        .await
        .with_context(|| format!("无法读取资产文件: {}", asset_path.display()))?;

    let raw = String::from_utf8_lossy(&bytes);
    let assets = parse(&raw)?;

    tracing::debug!(
        "解析 {}: {} 个文件, 目录清单 {} 字符",
        asset_path.display(),
        assets.files.len(),
        assets.directory_listing.len()
    );

    Ok(assets)
}
