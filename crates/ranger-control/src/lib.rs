//! # Ranger 控制核心
//!
//! 巡逻车的并发控制核心：
//! - 测距采样（轮询四路超声波，共享无撕裂快照）
//! - 障碍判定（去抖 + 消障确认延迟，按方向独立）
//! - 近障报警（随距离与接近速度变化的蜂鸣节奏）
//! - 执行器网关（幂等、互斥串行化的唯一物理写入点）
//! - 巡逻机动状态机（转移表驱动，受阻挂起/原位恢复）
//! - 模式仲裁（手动复位 > 停车保持 > 自主步进）
//!
//! 各活动跑在独立的周期线程上；外部协作方（遥控、编码器、
//! 遥测）通过 [`Rover`] 发放的显式句柄接入。

pub mod actuator;
pub mod alerter;
pub mod arbiter;
pub mod config;
mod error;
pub mod guard;
pub mod maneuver;
pub mod pipeline;
mod rover;
pub mod sampler;
pub mod state;

pub use actuator::{ActuatorGateway, DriveIntent, SteerPosition};
pub use alerter::{AlertDecision, ProximityAlerter};
pub use arbiter::ModeArbiter;
pub use config::{
    ActuatorConfig, AlerterConfig, GuardConfig, InvalidReadingPolicy, ManeuverConfig, RoverConfig,
    SamplerConfig, SchedulerConfig,
};
pub use error::ControlError;
pub use guard::{Direction, ObstacleGuard, ObstacleState};
pub use maneuver::{ManeuverMachine, ManeuverPhase, StepOutcome};
pub use rover::{Rover, RoverHardware};
pub use sampler::{DistanceSampler, ProbeSet};
pub use state::{
    DistanceReading, ModeFlags, ModeSnapshot, OperatingMode, SensorId, VehicleContext,
    WheelPulseHandle,
};
