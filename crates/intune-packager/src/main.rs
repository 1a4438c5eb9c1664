//! 应用部署规划命令行工具。
//!
//! 职责：
//! - 读取应用描述文件（`app-profile.yml`，支持 YAML/JSON）
//! - 结构校验并一次性输出全部违规项
//! - 生成部署计划（安装顺序、检测规则、卸载步骤、快捷方式步骤）
//! - 按检测规则判断本机（或给定观测快照）是否已安装
//!
//! 说明：
//! - 本工具只做规划与检测，不执行安装/卸载，也不修改系统
//! - 日志输出到 stderr，计划等结果输出到 stdout，便于管道处理
//!
//! 作者：应用打包工具项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use packager_core::detection::{evaluate, explain, ObservationSet, Observations};
use packager_core::result_code::classify;
use packager_core::uninstall::{plan_uninstall, steps_to_execute, StandardOutcome, UninstallStep};
use packager_core::{render, validate, ApplicationProfile};
use packager_windows::SystemProbe;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;

/// 命令行参数。
///
/// 说明：
/// - `profile` 指向应用描述文件（默认 `app-profile.yml`）
/// - `verbose` 输出调试日志（也可通过 `RUST_LOG` 控制）
#[derive(Debug, Parser)]
#[command(name = "intune-packager", version)]
struct Cli {
    #[arg(long, global = true, default_value = "app-profile.yml")]
    profile: PathBuf,

    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// 支持的子命令。
#[derive(Debug, Subcommand)]
enum Commands {
    /// 校验描述文件并列出全部违规项。
    Validate,
    /// 生成部署计划（JSON）。
    Plan {
        /// 输出文件；不指定则输出到 stdout。
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 按检测规则判断是否已安装。
    Detect {
        /// 观测快照（JSON）；不指定则探测本机。
        #[arg(long)]
        observations: Option<PathBuf>,
        /// 相对路径的基准目录（仅本机探测）。
        #[arg(long)]
        base_dir: Option<PathBuf>,
        /// 自定义检测脚本结果，格式 `ID=true|false`，可重复。
        #[arg(long = "custom", value_parser = parse_custom)]
        custom: Vec<(String, bool)>,
    },
    /// 输出卸载步骤；给定标准卸载后的检测结论时只输出需要执行的步骤。
    UninstallPlan {
        #[arg(long)]
        still_detected: Option<bool>,
        /// 标准卸载程序的退出码（仅记录，需同时给出 `--still-detected`）。
        #[arg(long, allow_hyphen_values = true, requires = "still_detected")]
        exit_code: Option<i32>,
    },
    /// 对安装程序退出码分类。
    Classify {
        #[arg(allow_hyphen_values = true)]
        code: i32,
    },
}

/// 程序入口：初始化日志、解析参数并分发子命令。
///
/// 异常处理：
/// - 子命令失败返回 `Err`，进程以非零退出码结束
fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Validate => validate_profile(&cli),
        Commands::Plan { output } => plan(&cli, output.as_deref()),
        Commands::Detect {
            observations,
            base_dir,
            custom,
        } => detect(&cli, observations.as_deref(), base_dir.as_deref(), custom),
        Commands::UninstallPlan {
            still_detected,
            exit_code,
        } => uninstall_plan(&cli, *still_detected, *exit_code),
        Commands::Classify { code } => {
            let class = classify(*code);
            println!("{code} = {class:?} (success = {})", class.is_success());
            Ok(())
        }
    }
}

/// 读取并解析应用描述文件。
///
/// 参数：
/// - `path`：描述文件路径；扩展名为 `.yml`/`.yaml` 时按 YAML 解析，否则按 JSON 解析
///
/// 异常处理：
/// - 文件读取失败或解析失败返回错误
fn load_profile(path: &Path) -> Result<ApplicationProfile> {
    let text = std::fs::read_to_string(path).with_context(|| format!("读取描述文件失败: {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"));
    let profile: ApplicationProfile = if is_yaml {
        serde_yaml::from_str(&text).context("解析描述文件 YAML 失败")?
    } else {
        serde_json::from_str(&text).context("解析描述文件 JSON 失败")?
    };
    debug!("已加载描述文件: {} {}", profile.name, profile.version);
    Ok(profile)
}

fn validate_profile(cli: &Cli) -> Result<()> {
    let profile = load_profile(&cli.profile)?;
    let report = validate(&profile);
    if report.is_valid() {
        println!("校验通过: {} {}", profile.name, profile.version);
        return Ok(());
    }
    for (i, violation) in report.violations().iter().enumerate() {
        println!("{}. {violation}", i + 1);
    }
    Err(anyhow!("描述文件校验失败，共 {} 项问题", report.violations().len()))
}

fn plan(cli: &Cli, output: Option<&Path>) -> Result<()> {
    let profile = load_profile(&cli.profile)?;
    let plan = render(&profile)?;
    let json = plan.to_json_pretty().context("序列化部署计划失败")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("写入部署计划失败: {}", path.display()))?;
            info!("部署计划已写入: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn detect(
    cli: &Cli,
    observations: Option<&Path>,
    base_dir: Option<&Path>,
    custom: &[(String, bool)],
) -> Result<()> {
    let profile = load_profile(&cli.profile)?;
    match observations {
        Some(path) => {
            let mut snapshot = load_observations(path)?;
            snapshot.custom.extend(custom.iter().cloned());
            report_detection(&profile, &snapshot)
        }
        None => {
            let base_dir = base_dir
                .map(Path::to_path_buf)
                .or_else(|| cli.profile.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));
            let probe = SystemProbe::new()
                .with_base_dir(base_dir)
                .with_custom_results(custom.iter().cloned());
            report_detection(&profile, &probe)
        }
    }
}

fn load_observations(path: &Path) -> Result<ObservationSet> {
    let bytes = std::fs::read(path).with_context(|| format!("读取观测快照失败: {}", path.display()))?;
    let snapshot: ObservationSet = serde_json::from_slice(&bytes).context("解析观测快照 JSON 失败")?;
    Ok(snapshot)
}

fn report_detection<O: Observations>(profile: &ApplicationProfile, observations: &O) -> Result<()> {
    let detected = evaluate(&profile.detection, observations)?;
    for verdict in explain(&profile.detection, observations) {
        println!("[{}] {} = {}", verdict.index, verdict.kind, verdict.matched);
    }
    println!("detected = {detected}");
    Ok(())
}

/// 卸载计划输出。
#[derive(Debug, Serialize)]
struct UninstallView<'a> {
    application: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<StandardOutcome>,
    steps: Vec<&'a UninstallStep>,
}

fn uninstall_plan(cli: &Cli, still_detected: Option<bool>, exit_code: Option<i32>) -> Result<()> {
    let profile = load_profile(&cli.profile)?;
    validate(&profile)
        .into_result()
        .map_err(|report| anyhow!("描述文件校验失败: {report}"))?;

    let steps = plan_uninstall(&profile.uninstall, &profile.name, &profile.shortcuts);
    let outcome = still_detected.map(|still_detected| StandardOutcome {
        exit_code,
        still_detected,
    });
    let view = UninstallView {
        application: &profile.name,
        outcome,
        steps: match &outcome {
            Some(outcome) => steps_to_execute(&steps, outcome),
            None => steps.iter().collect(),
        },
    };
    println!("{}", serde_json::to_string_pretty(&view).context("序列化卸载步骤失败")?);
    Ok(())
}

/// 解析 `ID=true|false` 形式的自定义检测结果。
fn parse_custom(raw: &str) -> Result<(String, bool), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("格式应为 ID=true|false: {raw}"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("自定义检测 ID 为空: {raw}"));
    }
    let value: bool = value
        .trim()
        .parse()
        .map_err(|_| format!("结果应为 true 或 false: {raw}"))?;
    Ok((id.to_string(), value))
}
