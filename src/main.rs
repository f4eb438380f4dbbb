use anyhow::Context;
use clap::Parser;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use szslib::config::{CliConfig, Command};
use szslib::core::detect::detect_path;
use szslib::core::ops::{self, ListingFormat};
use szslib::core::yaz0;
use szslib::utils::error::{ErrorSeverity, SzsError};
use szslib::utils::release::publish_target;
use szslib::utils::{logger, validation::Validate};
use szslib::{LocalStorage, SzsFileSystem, SzsPath, TomlConfig};

fn main() {
    let cli = CliConfig::parse();

    // 載入配置檔 (若有指定)
    let file_config = match &cli.config {
        Some(path) => TomlConfig::from_file(path).and_then(|c| c.validate().map(|_| c)),
        None => Ok(TomlConfig::default()),
    };
    let (file_config, config_error) = match file_config {
        Ok(config) => (config, None),
        Err(e) => (TomlConfig::default(), Some(e)),
    };

    // 初始化日誌
    let level = file_config.logging.level.as_deref();
    if cli.log_json || file_config.log_json() {
        logger::init_json_logger(cli.verbose, level);
    } else {
        logger::init_cli_logger(cli.verbose, level);
    }

    tracing::debug!("CLI config: {:?}", cli);

    // 驗證配置
    if let Some(e) = config_error.or_else(|| cli.validate().err()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, &file_config) {
        match e.downcast_ref::<SzsError>() {
            Some(szs_error) => {
                tracing::error!(
                    "❌ {} (Category: {:?}, Severity: {:?})",
                    szs_error,
                    szs_error.category(),
                    szs_error.severity()
                );
                eprintln!("❌ {}", szs_error.user_friendly_message());
                eprintln!("💡 建議: {}", szs_error.recovery_suggestion());

                // 根據錯誤嚴重程度決定退出碼
                let exit_code = match szs_error.severity() {
                    ErrorSeverity::Low => 0,
                    ErrorSeverity::Medium => 2,
                    ErrorSeverity::High => 1,
                    ErrorSeverity::Critical => 3,
                };
                if exit_code > 0 {
                    std::process::exit(exit_code);
                }
            }
            None => {
                tracing::error!("❌ {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn mount(archive: &Path) -> anyhow::Result<SzsFileSystem> {
    let fs = SzsFileSystem::open(archive)?;
    tracing::info!("📦 Mounted {} ({})", archive.display(), fs.format());
    Ok(fs)
}

fn write_output(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("📁 Output saved to: {} ({} bytes)", path.display(), data.len());
    Ok(())
}

fn run(command: Command, config: &TomlConfig) -> anyhow::Result<()> {
    match command {
        Command::Detect { file } => {
            match detect_path(&file)? {
                Some(format) => println!("{}", format),
                None => println!("unknown"),
            }
        }
        Command::List {
            archive,
            format,
            pattern,
        } => {
            let fs = mount(&archive)?;
            // 命令列參數優先於配置檔
            let format = match format {
                Some(format) => format.parse::<ListingFormat>()?,
                None => config.list_format()?.unwrap_or_default(),
            };
            let matcher = pattern
                .or_else(|| config.list.pattern.clone())
                .map(|pattern| fs.matcher(&pattern))
                .transpose()?;

            let entries = ops::list(&fs, matcher.as_ref())?;
            let rendered = ops::render_listing(&entries, format)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            if format == ListingFormat::Text {
                tracing::info!("✅ {} entries", entries.len());
            }
        }
        Command::Cat { archive, entry } => {
            let fs = mount(&archive)?;
            let data = fs.read(&SzsPath::new(&entry))?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
        Command::Extract {
            archive,
            output,
            pattern,
        } => {
            let fs = mount(&archive)?;
            let output = output
                .or_else(|| config.extract.output_path.clone())
                .unwrap_or_else(|| "./output".to_string());
            let matcher = pattern
                .or_else(|| config.extract.pattern.clone())
                .map(|pattern| fs.matcher(&pattern))
                .transpose()?;

            let storage = LocalStorage::new(&output);
            let summary = ops::extract(&fs, &storage, matcher.as_ref())?;
            println!(
                "✅ Extracted {} files, {} directories to {}",
                summary.files, summary.directories, output
            );
        }
        Command::Export { archive, output } => {
            let fs = mount(&archive)?;
            let file = std::fs::File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let mut writer = ops::export_zip(&fs, BufWriter::new(file))?;
            writer.flush()?;
            tracing::info!("📁 Output saved to: {}", output.display());
        }
        Command::Decompress { input, output } => {
            let file = std::fs::File::open(&input)
                .with_context(|| format!("opening {}", input.display()))?;
            let data = ops::unwrap_yaz0(BufReader::new(file))?;
            write_output(&output, &data)?;
        }
        Command::Compress {
            input,
            output,
            window,
        } => {
            let data = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let window = window.unwrap_or_else(|| config.window_size());
            write_output(&output, &yaz0::compress_with(&data, window)?)?;
        }
        Command::Pack {
            dir,
            output,
            no_compress,
            window,
        } => {
            let window = (!no_compress).then(|| window.unwrap_or_else(|| config.window_size()));
            let data = ops::pack_dir(&dir, window)?;
            write_output(&output, &data)?;
        }
        Command::Publish { version } => {
            let version = version.unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
            let target = publish_target(&version);
            println!("{} {}", target, config.repositories().url(target));
        }
    }
    Ok(())
}
