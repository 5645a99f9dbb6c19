//! # Ranger CLI
//!
//! 无硬件环境下的巡逻仿真器：用 mock 设备跑完整的控制核心，
//! 模拟编码器反馈和可脚本化的障碍窗口。
//!
//! ```bash
//! # 默认 30 秒自主巡逻
//! ranger-cli patrol
//!
//! # 第 8 秒起前方出现 10cm 障碍，持续 6 秒；第 20 秒收到停车信号 3 秒
//! ranger-cli patrol --duration-secs 40 --obstacle-at 8 --obstacle-for 6 --stop-at 20 --stop-for 3
//!
//! # 导出生效配置
//! ranger-cli show-config
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::Rng;
use ranger_control::{
    DriveIntent, OperatingMode, ProbeSet, Rover, RoverConfig, RoverHardware,
};
use ranger_hal::mock::{MockBuzzer, MockDriveMotor, MockRangeProbe, MockSteeringServo, SimDistance};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Ranger CLI - 巡逻车控制核心仿真工具
#[derive(Parser, Debug)]
#[command(name = "ranger-cli")]
#[command(about = "Patrol simulator for the Ranger control core", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 自主巡逻仿真（mock 硬件 + 模拟编码器）
    Patrol {
        /// 仿真时长（秒）
        #[arg(long, default_value_t = 30)]
        duration_secs: u64,

        /// 前方障碍出现时刻（秒，省略则无障碍）
        #[arg(long)]
        obstacle_at: Option<u64>,

        /// 前方障碍持续时长（秒）
        #[arg(long, default_value_t = 5)]
        obstacle_for: u64,

        /// 前方障碍距离（厘米）
        #[arg(long, default_value_t = 10)]
        obstacle_distance_cm: i32,

        /// 停车信号到达时刻（秒，省略则无停车）
        #[arg(long)]
        stop_at: Option<u64>,

        /// 停车信号持续时长（秒）
        #[arg(long, default_value_t = 3)]
        stop_for: u64,

        /// 全程保持让行（不提速）
        #[arg(long)]
        yield_mode: bool,
    },

    /// 导出生效的控制配置（JSON）
    ShowConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Patrol {
            duration_secs,
            obstacle_at,
            obstacle_for,
            obstacle_distance_cm,
            stop_at,
            stop_for,
            yield_mode,
        } => run_patrol(PatrolScenario {
            duration: Duration::from_secs(duration_secs),
            obstacle_window: obstacle_at
                .map(|at| (Duration::from_secs(at), Duration::from_secs(at + obstacle_for))),
            obstacle_distance_cm,
            stop_window: stop_at
                .map(|at| (Duration::from_secs(at), Duration::from_secs(at + stop_for))),
            yield_mode,
        }),
        Commands::ShowConfig => show_config(),
    }
}

struct PatrolScenario {
    duration: Duration,
    obstacle_window: Option<(Duration, Duration)>,
    obstacle_distance_cm: i32,
    stop_window: Option<(Duration, Duration)>,
    yield_mode: bool,
}

impl PatrolScenario {
    fn in_window(window: Option<(Duration, Duration)>, elapsed: Duration) -> bool {
        window.map(|(from, to)| elapsed >= from && elapsed < to).unwrap_or(false)
    }
}

/// 仿真周期（编码器 + 场景脚本的刷新节奏）
const SIM_PERIOD: Duration = Duration::from_millis(20);

/// 前进时每个仿真周期的脉冲增量（约 1200 脉冲/秒）
const PULSES_PER_SIM_TICK: i64 = 24;

/// 畅通时的基准距离（厘米）
const OPEN_DISTANCE_CM: i32 = 200;

fn run_patrol(scenario: PatrolScenario) -> Result<()> {
    let distances = [
        SimDistance::new(OPEN_DISTANCE_CM),
        SimDistance::new(OPEN_DISTANCE_CM),
        SimDistance::new(OPEN_DISTANCE_CM),
        SimDistance::new(OPEN_DISTANCE_CM),
    ];
    let motor = MockDriveMotor::new();
    let buzzer = MockBuzzer::new();
    let hardware = RoverHardware {
        probes: ProbeSet {
            front: Box::new(MockRangeProbe::new(distances[0].clone())),
            back: Box::new(MockRangeProbe::new(distances[1].clone())),
            left: Box::new(MockRangeProbe::new(distances[2].clone())),
            right: Box::new(MockRangeProbe::new(distances[3].clone())),
        },
        motor: Box::new(motor.clone()),
        servo: Box::new(MockSteeringServo::new()),
        buzzer: Box::new(buzzer.clone()),
    };

    let rover = Rover::new(hardware, Some(RoverConfig::default()))?;
    let ctx = rover.context();
    let gateway = rover.gateway();
    let pulses = rover.pulse_handle();

    // Ctrl+C 提前结束仿真
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::Relaxed);
        })?;
    }

    ctx.flags().set_yield_requested(scenario.yield_mode);
    ctx.flags().set_operating_mode(OperatingMode::Autonomous);
    info!(duration_secs = scenario.duration.as_secs(), "patrol simulation started");

    let mut rng = rand::thread_rng();
    let started = Instant::now();
    while running.load(Ordering::Relaxed) && started.elapsed() < scenario.duration {
        let elapsed = started.elapsed();

        // 模拟编码器：前进累加、倒车递减，带少量抖动
        match gateway.applied_drive() {
            DriveIntent::Forward => pulses.record(PULSES_PER_SIM_TICK + rng.gen_range(0..4)),
            DriveIntent::Reverse => pulses.record(-(PULSES_PER_SIM_TICK + rng.gen_range(0..4))),
            DriveIntent::Neutral => {},
        }

        // 场景脚本：前方障碍窗口
        let front_cm = if PatrolScenario::in_window(scenario.obstacle_window, elapsed) {
            scenario.obstacle_distance_cm
        } else {
            OPEN_DISTANCE_CM + rng.gen_range(-3..4)
        };
        distances[0].set(front_cm);

        // 场景脚本：停车信号窗口
        ctx.flags()
            .set_stop_requested(PatrolScenario::in_window(scenario.stop_window, elapsed));

        std::thread::sleep(SIM_PERIOD);
    }

    ctx.flags().set_operating_mode(OperatingMode::Manual);

    info!(
        distances_csv = %ctx.distances_csv(),
        wheel_pulses = ctx.wheel_pulses(),
        motor_writes = motor.write_count(),
        buzzer_events = buzzer.events().len(),
        "patrol simulation finished"
    );
    println!("telemetry: distances={} pulses={}", ctx.distances_csv(), ctx.wheel_pulses());

    rover.shutdown()?;
    Ok(())
}

fn show_config() -> Result<()> {
    let config = RoverConfig::default();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
