//! 周期活动循环
//!
//! 三个独立调度的周期活动，各自跑在自己的线程上：
//!
//! - `control_loop` — 模式仲裁 + 机动步进，固定周期（默认 20ms）。
//! - `sampler_loop` — 测距轮询，固定周期（默认 50ms）。
//! - `alerter_loop` — 近障报警，按决策自定节奏。
//!
//! 共享状态只通过 [`VehicleContext`]（无锁快照）和
//! [`ActuatorGateway`]（互斥串行化）交互；没有任何活动会无限期
//! 阻塞。退出由共享的运行旗标统一驱动。

use crate::actuator::ActuatorGateway;
use crate::alerter::{AlertDecision, ProximityAlerter};
use crate::arbiter::ModeArbiter;
use crate::sampler::DistanceSampler;
use crate::state::VehicleContext;
use ranger_hal::Buzzer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, trace, warn};

// 使用 spin_sleep 提供微秒级延迟精度（相比 std::thread::sleep 的 1-2ms）
use spin_sleep;

/// 尝试提升当前线程优先级（仅 realtime feature 下生效）
#[cfg(feature = "realtime")]
fn raise_thread_priority(name: &str) {
    use thread_priority::*;
    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(()) => tracing::info!(thread = name, "thread priority raised to max"),
        Err(e) => warn!(thread = name, error = ?e, "failed to raise thread priority"),
    }
}

#[cfg(not(feature = "realtime"))]
fn raise_thread_priority(_name: &str) {}

/// 按固定周期补齐本轮剩余时间
fn pace(cycle_start: Instant, period: Duration) {
    let elapsed = cycle_start.elapsed();
    if let Some(remaining) = period.checked_sub(elapsed) {
        spin_sleep::sleep(remaining);
    } else {
        trace!(overrun_us = (elapsed - period).as_micros() as u64, "cycle overran period");
    }
}

/// 控制循环：模式仲裁 + 机动步进
///
/// 仲裁出错（硬件写失败等）不终止循环：记录错误、尽力停车、
/// 下个周期继续。本核心没有致命条件，失效表现为停车而不是
/// 崩溃。
pub fn control_loop(
    ctx: Arc<VehicleContext>,
    gateway: Arc<ActuatorGateway>,
    mut arbiter: ModeArbiter,
    period: Duration,
    is_running: Arc<AtomicBool>,
) {
    raise_thread_priority("control");

    while is_running.load(Ordering::Acquire) {
        let cycle_start = Instant::now();

        if let Err(e) = arbiter.tick(&ctx, &gateway, cycle_start) {
            error!(error = %e, "arbiter tick failed, forcing halt");
            if let Err(e) = gateway.halt() {
                error!(error = %e, "halt after failed tick also failed");
            }
        }

        pace(cycle_start, period);
    }

    // 退出前把车停住
    if let Err(e) = gateway.halt() {
        error!(error = %e, "final halt on shutdown failed");
    }
}

/// 采样循环：每个周期轮转触发一个探头
pub fn sampler_loop(
    mut sampler: DistanceSampler,
    ctx: Arc<VehicleContext>,
    period: Duration,
    is_running: Arc<AtomicBool>,
) {
    while is_running.load(Ordering::Acquire) {
        let cycle_start = Instant::now();
        sampler.sample_next(&ctx);
        pace(cycle_start, period);
    }
}

/// 报警循环：评估 → 发声 → 按决策节奏等待
///
/// 蜂鸣器故障就地吸收（记录并继续）；本活动不得反压控制循环。
pub fn alerter_loop(
    mut alerter: ProximityAlerter,
    mut buzzer: Box<dyn Buzzer + Send>,
    ctx: Arc<VehicleContext>,
    idle_period: Duration,
    is_running: Arc<AtomicBool>,
) {
    while is_running.load(Ordering::Acquire) {
        let readings = ctx.distances();
        trace!(distances = %ctx.distances_csv(), "proximity sweep");

        match alerter.assess(&readings) {
            AlertDecision::Silence => {
                if let Err(e) = buzzer.silence() {
                    warn!(error = %e, "buzzer silence failed");
                }
                spin_sleep::sleep(idle_period);
            },
            AlertDecision::Continuous { tone_hz } => {
                if let Err(e) = buzzer.tone(tone_hz) {
                    warn!(error = %e, "buzzer tone failed");
                }
                spin_sleep::sleep(idle_period);
            },
            AlertDecision::Pulse { tone_hz, beep, off } => {
                if let Err(e) = buzzer.tone(tone_hz) {
                    warn!(error = %e, "buzzer tone failed");
                }
                spin_sleep::sleep(beep);
                if let Err(e) = buzzer.silence() {
                    warn!(error = %e, "buzzer silence failed");
                }
                spin_sleep::sleep(off);
            },
        }
    }

    let _ = buzzer.silence();
}
