//! 完整的修复与打包流程
//!
//! 依次执行：文件名规范化、引用修补、标记修复、测验填充、目录整理、
//! 生成清单与容器描述、打包。

use crate::epub::archive::check_archive_size;
use crate::epub::builder::{DEFAULT_ARCHIVE_NAME, PackageBuilder, PackageTree};
use crate::epub::error::Result;
use crate::epub::markup::{fix_project_markup, populate_project_quizzes};
use crate::epub::normalize::{RenameMapping, apply_renames, plan_renames};
use crate::epub::opf::BookMap;
use crate::epub::patch::patch_project_references;
use crate::epub::report::ReportSink;
use std::path::{Path, PathBuf};

/// 一次完整流程的产物
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// 实际执行的重命名
    pub renames: RenameMapping,
    /// 标记被修改的文件数
    pub markup_files: usize,
    /// 填充了测验选项的文件数
    pub quiz_files: usize,
    /// 整理后的目录结构
    pub tree: PackageTree,
    /// 生成的归档路径
    pub archive: PathBuf,
}

/// 项目修复器
pub struct EpubFixer<'a> {
    project_dir: PathBuf,
    sink: &'a mut dyn ReportSink,
}

impl<'a> EpubFixer<'a> {
    pub fn new<P: Into<PathBuf>>(project_dir: P, sink: &'a mut dyn ReportSink) -> Self {
        Self {
            project_dir: project_dir.into(),
            sink,
        }
    }

    /// 规范化文件名并修补引用
    pub fn normalize(&mut self) -> Result<RenameMapping> {
        let mut mapping = plan_renames(&self.project_dir, &mut *self.sink)?;
        apply_renames(&self.project_dir, &mut mapping, &mut *self.sink)?;
        patch_project_references(&self.project_dir, &mapping, &mut *self.sink)?;
        Ok(mapping)
    }

    /// 修复XHTML标记
    pub fn fix_markup(&mut self) -> Result<usize> {
        fix_project_markup(&self.project_dir, &mut *self.sink)
    }

    /// 为章节中空的测验填充占位选项
    pub fn populate_quizzes(&mut self) -> Result<usize> {
        populate_project_quizzes(&self.project_dir, &mut *self.sink)
    }

    /// 整理目录、生成清单与容器描述
    pub fn build(&mut self) -> Result<PackageTree> {
        let builder = PackageBuilder::new(&self.project_dir);
        let tree = builder.organize(&mut *self.sink)?;
        let metadata = BookMap::load_or_default(&self.project_dir)?.metadata();
        let opf = builder.build_manifest(&tree, metadata)?;
        builder.write_manifest(&tree, &opf, &mut *self.sink)?;
        builder.write_container(&tree)?;
        Ok(tree)
    }

    /// 打包到 `output`，未指定时使用项目目录下的默认文件名
    pub fn package(&mut self, tree: &PackageTree, output: Option<&Path>) -> Result<PathBuf> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.project_dir.join(DEFAULT_ARCHIVE_NAME));
        let archive =
            PackageBuilder::new(&self.project_dir).package(tree, &output, &mut *self.sink)?;
        check_archive_size(&archive, &mut *self.sink)?;
        Ok(archive)
    }

    /// 执行全部步骤
    pub fn run_all(&mut self, output: Option<&Path>) -> Result<FixOutcome> {
        log::info!("开始处理项目: {}", self.project_dir.display());

        let renames = self.normalize()?;
        let markup_files = self.fix_markup()?;
        let quiz_files = self.populate_quizzes()?;
        let tree = self.build()?;
        let archive = self.package(&tree, output)?;

        log::info!("处理完成: {}", archive.display());
        Ok(FixOutcome {
            renames,
            markup_files,
            quiz_files,
            tree,
            archive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::archive::PackageArchive;
    use crate::epub::audit::ManifestAuditor;
    use crate::epub::patch::TOC_FILE;
    use crate::epub::report::MemorySink;
    use std::fs;

    #[test]
    fn test_run_all_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("1-Cover_final.xhtml"),
            "<html><head><title>c</title><link rel=\"stylesheet\" href=\"style.css\" /></head>\
             <body><p>a&nbsp;b</p></body></html>",
        )
        .unwrap();
        fs::write(
            root.join(TOC_FILE),
            "<html><body><a href=\"1-Cover_final.xhtml#top\">Cover</a></body></html>",
        )
        .unwrap();
        fs::write(
            root.join("2-chapter-one.xhtml"),
            "<html><head><title>1</title></head>\
             <body><ul class=\"quiz-options\"></ul></body></html>",
        )
        .unwrap();
        fs::write(root.join("style.css"), "body {}").unwrap();
        fs::write(
            root.join("book-map.yaml"),
            "book:\n  title: Test Book\nfiles:\n  - input: 1-Cover_final.xhtml\n    output: OEBPS/text/1-Cover_final.xhtml\n",
        )
        .unwrap();

        let mut sink = MemorySink::new();
        let outcome = EpubFixer::new(root, &mut sink).run_all(None).unwrap();

        assert_eq!(outcome.renames.get("1-Cover_final.xhtml"), Some("1-cover.xhtml"));
        assert!(root.join("1-cover.xhtml").exists());
        let toc = fs::read_to_string(root.join(TOC_FILE)).unwrap();
        assert!(toc.contains("href=\"1-cover.xhtml#top\""));
        let book_map = fs::read_to_string(root.join("book-map.yaml")).unwrap();
        assert!(book_map.contains("1-cover.xhtml"));

        let chapter = fs::read_to_string(root.join("OEBPS/text/1-cover.xhtml")).unwrap();
        assert!(chapter.contains("a&#160;b"));
        assert!(chapter.contains("href=\"../styles/style.css\""));
        assert_eq!(outcome.quiz_files, 1);
        let quiz = fs::read_to_string(root.join("OEBPS/text/2-chapter-one.xhtml")).unwrap();
        assert!(quiz.contains("Option A (placeholder)"));

        let opf = fs::read_to_string(root.join("OEBPS/content.opf")).unwrap();
        assert!(opf.contains("<dc:title>Test Book</dc:title>"));

        assert_eq!(outcome.archive, root.join(DEFAULT_ARCHIVE_NAME));
        let mut archive = PackageArchive::open(&outcome.archive).unwrap();
        assert_eq!(archive.list_files().unwrap()[0], "mimetype");

        let result = ManifestAuditor::new(root).audit().unwrap();
        assert!(result.passed(), "{}", result.render_text());
    }
}
