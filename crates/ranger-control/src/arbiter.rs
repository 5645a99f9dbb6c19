//! 模式仲裁
//!
//! 控制线程每个周期的顶层决策：手动复位 > 停车保持 > 自主步进。
//! 模式判定永远先于机动步进：同一周期里观察到的停车或手动
//! 切换在任何运动命令发出之前就已生效。
//!
//! - **非自主**：机动状态机若不在 Idle，强制停车并复位（共享
//!   脉冲计数不动）；恢复先前的速度覆盖；本周期到此为止。
//! - **停车请求**：停车，但保留机动阶段与计程/计时基准，停车
//!   解除后从循环的原位置继续。
//! - **自主**：未在让行时施加固定的自主速度覆盖（记住先前值供
//!   恢复）；随后把一个调度步委托给机动状态机，机动本身可能被
//!   障碍判定挂起。
//!
//! 让行是建议性的：它只抑制速度覆盖，不停车；与停车的区别就在
//! 这里。

use crate::actuator::ActuatorGateway;
use crate::config::RoverConfig;
use crate::error::ControlError;
use crate::guard::ObstacleGuard;
use crate::maneuver::{ManeuverMachine, ManeuverPhase, StepOutcome};
use crate::state::{SensorId, VehicleContext};
use std::time::Instant;
use tracing::{debug, info};

/// 速度覆盖簿记
///
/// 仲裁器自有状态的一部分：覆盖是否生效、恢复用的先前占空比。
#[derive(Debug, Default)]
struct SpeedOverride {
    saved_duty: Option<u8>,
}

/// 模式仲裁器
///
/// 拥有机动状态机、两个方向的障碍判定器和速度覆盖簿记；
/// 只在控制线程上运行。
pub struct ModeArbiter {
    machine: ManeuverMachine,
    front_guard: ObstacleGuard,
    rear_guard: ObstacleGuard,
    speed_override: SpeedOverride,
    autonomous_duty: u8,
}

impl ModeArbiter {
    pub fn new(config: &RoverConfig) -> Self {
        Self {
            machine: ManeuverMachine::new(config.maneuver.clone()),
            front_guard: ObstacleGuard::front(&config.guard),
            rear_guard: ObstacleGuard::rear(&config.guard),
            speed_override: SpeedOverride::default(),
            autonomous_duty: config.maneuver.autonomous_duty,
        }
    }

    /// 当前机动阶段（遥测用）
    pub fn phase(&self) -> ManeuverPhase {
        self.machine.phase()
    }

    /// 前向障碍是否激活（遥测用）
    pub fn front_obstacle_active(&self) -> bool {
        self.front_guard.is_active()
    }

    /// 后向障碍是否激活（遥测用）
    pub fn rear_obstacle_active(&self) -> bool {
        self.rear_guard.is_active()
    }

    /// 执行一个调度周期
    pub fn tick(
        &mut self,
        ctx: &VehicleContext,
        gateway: &ActuatorGateway,
        now: Instant,
    ) -> Result<(), ControlError> {
        let flags = ctx.flags().snapshot();

        // 情形一：非自主。在途机动立即作废，只发一次停车。
        if !flags.operating_mode.is_autonomous() {
            if !self.machine.is_idle() {
                gateway.halt()?;
                self.machine.reset();
                info!("autonomous maneuver cancelled, drive halted");
            }
            if let Some(duty) = self.speed_override.saved_duty.take() {
                gateway.set_speed(duty)?;
                info!(duty, "speed override restored");
            }
            return Ok(());
        }

        // 情形二：停车请求。阶段与基准原样保留。
        if flags.stop_requested {
            self.machine.hold(gateway)?;
            return Ok(());
        }

        // 情形三：自主行驶。
        if !flags.yield_requested && gateway.applied_speed() != self.autonomous_duty {
            if self.speed_override.saved_duty.is_none() {
                self.speed_override.saved_duty = Some(gateway.applied_speed());
            }
            gateway.set_speed(self.autonomous_duty)?;
            info!(duty = self.autonomous_duty, "autonomous speed override applied");
        }

        let front = self
            .front_guard
            .evaluate(ctx.distance(SensorId::Front), now)
            .active;
        let rear = self
            .rear_guard
            .evaluate(ctx.distance(SensorId::Back), now)
            .active;

        let outcome = self
            .machine
            .step(now, ctx.wheel_pulses(), front, rear, gateway)?;
        if let StepOutcome::Advanced(phase) = outcome {
            debug!(phase = phase.label(), "maneuver phase advanced");
        }
        Ok(())
    }
}
