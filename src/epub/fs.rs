//! 文件系统遍历辅助函数

use crate::epub::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// 递归列出目录下的所有普通文件，按路径排序
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_into(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_into(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_into(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}

/// 把相对于 `base` 的路径转换为以 `/` 分隔的字符串
///
/// `path` 不在 `base` 之下时返回 `None`。
pub fn relative_href(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files_recursive_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("b/c/z.txt"), "").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let hrefs: Vec<String> = files
            .iter()
            .filter_map(|path| relative_href(dir.path(), path))
            .collect();
        assert_eq!(hrefs, vec!["a.txt", "b/c/z.txt"]);
    }

    #[test]
    fn test_relative_href_outside_base() {
        assert_eq!(relative_href(Path::new("/a/b"), Path::new("/c/d")), None);
    }
}
