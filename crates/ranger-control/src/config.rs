//! 控制核心配置
//!
//! 所有整定常量集中在这里，按组件分组。默认值来自整车标定。
//! 配置不做文件持久化：上电永远从默认值（或调用方显式传入的
//! 结构体）开始。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 整车控制配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoverConfig {
    /// 周期任务调度
    pub scheduler: SchedulerConfig,

    /// 测距采样
    pub sampler: SamplerConfig,

    /// 障碍判定
    pub guard: GuardConfig,

    /// 近障报警
    pub alerter: AlerterConfig,

    /// 执行器网关
    pub actuator: ActuatorConfig,

    /// 自主巡逻机动
    pub maneuver: ManeuverConfig,
}

/// 周期任务调度配置
///
/// 每个活动有自己的固定周期，由独立线程驱动。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 模式仲裁 + 机动步进周期（毫秒）
    pub control_period_ms: u64,
    /// 测距采样周期（毫秒，每周期轮询一个传感器）
    pub sampler_period_ms: u64,
    /// 报警器空闲轮询周期（毫秒，无障碍或持续音时）
    pub alerter_idle_period_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            control_period_ms: 20,
            sampler_period_ms: 50,
            alerter_idle_period_ms: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }

    pub fn sampler_period(&self) -> Duration {
        Duration::from_millis(self.sampler_period_ms)
    }

    pub fn alerter_idle_period(&self) -> Duration {
        Duration::from_millis(self.alerter_idle_period_ms)
    }
}

/// 测距采样配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// 单次回波等待上限（毫秒）
    ///
    /// 超过该窗口视为"无回波"，写入无效读数（-1），不算错误。
    pub echo_timeout_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { echo_timeout_ms: 30 }
    }
}

impl SamplerConfig {
    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }
}

/// 无效读数的消障语义
///
/// 障碍激活期间收到无效读数（无回波）时，如何解释：
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InvalidReadingPolicy {
    /// 视为"无法确认已清空"，维持障碍激活（失效安全，默认）
    #[default]
    Obstructed,
    /// 视为"已清空"（障碍离开探测范围时传感器常无回波的硬件布局用）
    Clear,
}

/// 障碍判定配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// 前向障碍距离阈值（厘米）
    pub front_threshold_cm: i32,
    /// 后向障碍距离阈值（厘米）
    pub rear_threshold_cm: i32,
    /// 消障确认时长（毫秒）：读数必须连续非障碍满该时长才解除
    pub resume_delay_ms: u64,
    /// 激活期间无效读数的解释
    pub invalid_reading: InvalidReadingPolicy,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            front_threshold_cm: 30,
            rear_threshold_cm: 30,
            resume_delay_ms: 3000,
            invalid_reading: InvalidReadingPolicy::Obstructed,
        }
    }
}

impl GuardConfig {
    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }
}

/// 近障报警配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlerterConfig {
    /// 报警距离阈值（厘米），低于该值才发声
    pub threshold_cm: i32,
    /// 近场距离（厘米），低于该值持续发声
    pub near_field_cm: i32,
    /// 脉冲间隔下限（毫秒）
    pub min_off_ms: u64,
    /// 脉冲间隔上限（毫秒）
    pub max_off_ms: u64,
    /// 单次蜂鸣时长（毫秒）
    pub beep_on_ms: u64,
    /// 接近速度阈值（厘米/评估周期），超过则间隔减半
    pub closing_speed_cm: i32,
    /// 各方向的提示音频率（Hz）
    pub tone_front_hz: u16,
    pub tone_left_hz: u16,
    pub tone_right_hz: u16,
    pub tone_back_hz: u16,
}

impl Default for AlerterConfig {
    fn default() -> Self {
        Self {
            threshold_cm: 50,
            near_field_cm: 4,
            min_off_ms: 50,
            max_off_ms: 500,
            beep_on_ms: 50,
            closing_speed_cm: 5,
            tone_front_hz: 1000,
            tone_left_hz: 800,
            tone_right_hz: 1200,
            tone_back_hz: 600,
        }
    }
}

/// 执行器网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// 左满舵角（度）
    pub steer_left: u8,
    /// 回正角（度）
    pub steer_center: u8,
    /// 右满舵角（度）
    pub steer_right: u8,
    /// 默认驱动占空比（0-255）
    pub drive_duty: u8,
    /// 舵机写入后的机械稳定等待（毫秒）
    pub settle_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            steer_left: 0,
            steer_center: 38,
            steer_right: 80,
            drive_duty: 190,
            settle_ms: 50,
        }
    }
}

impl ActuatorConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// 自主巡逻机动配置
///
/// 行程以编码器脉冲计量（约 1800 脉冲/米）；停顿以墙钟计时。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManeuverConfig {
    /// 长直行行程（脉冲）
    pub long_forward_pulses: i64,
    /// 左转行程（脉冲）
    pub left_turn_pulses: i64,
    /// 倒车右转行程（脉冲，倒车时编码器递减）
    pub reverse_turn_pulses: i64,
    /// 各阶段间停顿（毫秒）
    pub pause_ms: u64,
    /// 自主模式驱动占空比（0-255）
    pub autonomous_duty: u8,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            long_forward_pulses: 1200,
            left_turn_pulses: 1000,
            reverse_turn_pulses: 1200,
            pause_ms: 1000,
            autonomous_duty: 170,
        }
    }
}

impl ManeuverConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}
