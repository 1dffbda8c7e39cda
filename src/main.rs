use clap::{Arg, ArgAction, Command};
use std::str::FromStr;

use unitnav::logging::{self, LogConfig, LogOutput};
use unitnav::scenario::ScenarioConfig;
use unitnav::simulation::SimulationEngine;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("unitnav")
        .version("0.1.0")
        .about("ユニット移動シミュレーション (Unit Navigation)")
        .long_about("ウェイポイント追従ユニットの移動シミュレーション\n\
                     固定時間刻みで加速・巡航・減速・到達を再現します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .conflicts_with("demo"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("demo")
                .short('d')
                .long("demo")
                .action(ArgAction::SetTrue)
                .help("組み込みのデモシナリオを実行"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。省略時は -v から決定"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("OUTPUT")
                .default_value("console")
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ"),
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let log_config = match build_log_config(&matches, verbose_level) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };
    // ファイル出力のフラッシュのため終了まで保持
    let _log_guard = match logging::init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: ログ初期化に失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    let scenario = if matches.get_flag("demo") {
        Some(Ok(ScenarioConfig::demo()))
    } else {
        matches
            .get_one::<String>("scenario")
            .map(|path| ScenarioConfig::from_file(path))
    };

    match scenario {
        Some(Ok(scenario)) => {
            if let Err(e) = run_scenario(scenario, matches.get_flag("info"), verbose_level) {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
        Some(Err(e)) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
        None => show_default_help(),
    }
}

fn build_log_config(
    matches: &clap::ArgMatches,
    verbose_level: u8,
) -> Result<LogConfig, Box<dyn std::error::Error>> {
    let level = match matches.get_one::<String>("log-level") {
        Some(level) => logging::parse_log_level(level),
        None => logging::level_for_verbosity(verbose_level),
    };
    let output = matches
        .get_one::<String>("log-output")
        .map(|s| LogOutput::from_str(s))
        .transpose()?
        .unwrap_or(LogOutput::Console);
    let log_dir = matches
        .get_one::<String>("log-dir")
        .cloned()
        .unwrap_or_else(|| "logs".to_string());

    Ok(LogConfig {
        level,
        output,
        log_dir,
        ..LogConfig::default()
    })
}

/// シナリオの実行
fn run_scenario(
    scenario: ScenarioConfig,
    info_only: bool,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    // 情報表示のみの場合
    if info_only {
        return Ok(());
    }

    if verbose_level > 0 {
        println!("シミュレーション設定:");
        println!("  時間刻み: {:.3}秒", scenario.sim.dt_s);
        println!("  最大時間: {:.1}秒", scenario.sim.t_max_s);
        println!();
    }

    // シミュレーションエンジンの作成と初期化
    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;

    // シミュレーション実行
    let report = simulation.run();
    report.print_summary();

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  unitnav [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>  シナリオファイルを指定して実行");
    println!("  -i, --info             シナリオ情報のみ表示");
    println!("  -d, --demo             組み込みデモシナリオを実行");
    println!("  -v, --verbose          詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-level        ログレベル");
    println!("      --log-output       ログ出力先 (console, file, both)");
    println!("  -h, --help             このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/simple_drive.yaml  - 単一ユニットの直進と停止");
    println!("  scenarios/patrol.yaml        - 複数ユニットの巡回と経路置き換え");
    println!();
    println!("例:");
    println!("  unitnav -d");
    println!("  unitnav -s scenarios/simple_drive.yaml -v");
    println!("  unitnav -s scenarios/patrol.yaml -i");
}
