use clap::{Parser, Subcommand};
use epubforge::epub::archive::check_archive_size;
use epubforge::epub::lint::lint_dir;
use epubforge::{
    BookMap, DEFAULT_ARCHIVE_NAME, EpubError, EpubFixer, LogSink, ManifestAuditor, MemorySink,
    PackageArchive, PackageBuilder, Result, Severity,
};
use std::fs;
use std::path::{Path, PathBuf};

mod exit_codes;

/// 📚 epubforge - EPUB打包与审计工具
#[derive(Parser)]
#[command(name = "epubforge")]
#[command(about = "把散落的XHTML、CSS、字体与图片整理并打包为EPUB，并审计清单一致性")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 规范化XHTML文件名，并更新目录文档与book-map.yaml中的引用
    Normalize {
        /// 项目目录
        dir: PathBuf,
    },
    /// 修复XHTML标记与样式表链接
    Fix {
        dir: PathBuf,
    },
    /// 把源文件整理到OEBPS目录结构
    Organize {
        dir: PathBuf,
    },
    /// 生成content.opf
    Manifest {
        dir: PathBuf,
    },
    /// 生成container.xml并打包
    Package {
        dir: PathBuf,
        /// 输出的EPUB文件路径
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 依次执行全部步骤
    Build {
        dir: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 审计清单与脊柱
    Audit {
        /// 包含META-INF或OEBPS的目录
        dir: PathBuf,
        /// 把报告写入文件
        #[arg(long)]
        report: Option<PathBuf>,
        /// 以JSON格式输出报告
        #[arg(long)]
        json: bool,
    },
    /// 检查XHTML文件的格式与规范性
    Lint {
        dir: PathBuf,
    },
    /// 校验已生成的EPUB归档
    Verify {
        epub_file: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ 错误: {}", e);
            exit_codes::FATAL
        }
    };
    std::process::exit(code);
}

fn run(command: Command) -> Result<i32> {
    let code = match command {
        Command::Normalize { dir } => {
            let mapping = EpubFixer::new(&dir, &mut LogSink).normalize()?;
            println!("✏️  重命名了 {} 个文件", mapping.len());
            exit_codes::SUCCESS
        }
        Command::Fix { dir } => {
            let changed = EpubFixer::new(&dir, &mut LogSink).fix_markup()?;
            println!("🔧 修复了 {} 个文件", changed);
            exit_codes::SUCCESS
        }
        Command::Organize { dir } => {
            let tree = PackageBuilder::new(&dir).organize(&mut LogSink)?;
            println!("📁 已整理到 {}", tree.oebps_dir().display());
            exit_codes::SUCCESS
        }
        Command::Manifest { dir } => {
            let builder = PackageBuilder::new(&dir);
            let tree = builder.tree();
            let metadata = BookMap::load_or_default(&dir)?.metadata();
            let opf = builder.build_manifest(&tree, metadata)?;
            let path = builder.write_manifest(&tree, &opf, &mut LogSink)?;
            println!(
                "📖 清单已写入 {} ({} 个条目, {} 个脊柱项)",
                path.display(),
                opf.manifest.len(),
                opf.spine.len()
            );
            exit_codes::SUCCESS
        }
        Command::Package { dir, output } => {
            let builder = PackageBuilder::new(&dir);
            let tree = builder.tree();
            builder.write_container(&tree)?;
            let output = output.unwrap_or_else(|| dir.join(DEFAULT_ARCHIVE_NAME));
            let archive = builder.package(&tree, &output, &mut LogSink)?;
            println!("📦 已生成 {}", archive.display());
            exit_codes::SUCCESS
        }
        Command::Build { dir, output } => {
            let mut sink = MemorySink::new();
            let outcome = EpubFixer::new(&dir, &mut sink).run_all(output.as_deref())?;
            println!("\n🎉 EPUB生成完成: {}", outcome.archive.display());
            println!("  重命名: {} 个文件", outcome.renames.len());
            println!("  标记修复: {} 个文件", outcome.markup_files);
            println!("  测验填充: {} 个文件", outcome.quiz_files);
            for record in sink.issues_at_least(Severity::Warning) {
                println!("  ⚠️  {}", record);
            }
            println!("  跳过: {} 项", sink.skips().count());
            exit_codes::SUCCESS
        }
        Command::Audit { dir, report, json } => run_audit(&dir, report.as_deref(), json)?,
        Command::Lint { dir } => {
            let mut sink = MemorySink::new();
            let summary = lint_dir(&dir, &mut sink)?;
            for record in sink.issues_at_least(Severity::Warning) {
                println!("  [{}] {}", record.severity, record);
            }
            println!(
                "\n🔍 检查了 {} 个文件: {} 个错误, {} 个警告",
                summary.files_checked, summary.errors, summary.warnings
            );
            if summary.passed() {
                exit_codes::SUCCESS
            } else {
                exit_codes::DEFECTS_FOUND
            }
        }
        Command::Verify { epub_file } => {
            let mut archive = PackageArchive::open(&epub_file)?;
            println!("✅ mimetype条目正确");

            let mut sink = MemorySink::new();
            let size = check_archive_size(&epub_file, &mut sink)?;
            println!("📏 文件大小: {} 字节", size);
            for record in sink.issues_at_least(Severity::Warning) {
                println!("  ⚠️  {}", record);
            }

            let files = archive.list_files()?;
            println!("\n📁 EPUB文件内容: 共 {} 个条目", files.len());

            let opf_path = archive.opf_path()?;
            println!("  📚 主OPF文件路径: {}", opf_path);

            let opf = archive.parse_opf()?;
            println!("  📖 {} ({} 个条目, {} 个脊柱项)", opf.metadata.title, opf.manifest.len(), opf.spine.len());
            exit_codes::SUCCESS
        }
    };

    Ok(code)
}

fn run_audit(dir: &Path, report: Option<&Path>, json: bool) -> Result<i32> {
    let result = ManifestAuditor::new(dir).audit()?;

    let rendered = if json {
        result.to_json()?
    } else {
        result.render_text()
    };

    match report {
        Some(path) => {
            fs::write(path, &rendered)
                .map_err(|e| EpubError::Report(format!("{}: {}", path.display(), e)))?;
            println!("📝 审计报告已写入 {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(if result.passed() {
        exit_codes::SUCCESS
    } else {
        exit_codes::DEFECTS_FOUND
    })
}
