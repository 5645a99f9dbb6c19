//! 巡逻机动状态机
//!
//! 固定循环：长直行 → 停 → 左打舵 → 左转 → 停 → 右打舵 →
//! 倒车右转 → 停 → 回正 → 停 → 长直行。行驶阶段按编码器脉冲
//! 计程（倒车时计数递减），停顿阶段按墙钟计时。
//!
//! 每个阶段在转移表（[`phase_rule`]）里声明三件事：进入动作
//! （驱动/转向/基准捕获）、退出条件、后继阶段。受阻挂起是一个
//! 显式的"保持"路径而不是隐式分支：挂起只下发一次停车，阶段与
//! 计程基准原样保留；解除时重发本阶段的驱动命令，不重新捕获
//! 基准。前向受阻（长直行、左转）、后向受阻（倒车右转）和外部
//! 停车请求共用同一条保持/恢复路径。

use crate::actuator::{ActuatorGateway, DriveIntent, SteerPosition};
use crate::config::ManeuverConfig;
use crate::error::ControlError;
use std::time::Instant;
use tracing::{debug, info};

/// 机动阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverPhase {
    /// 未在巡逻（非自主模式下的唯一合法阶段）
    Idle,
    /// 长直行
    LongForward,
    /// 长直行后的刹停停顿
    ForwardBrakePause,
    /// 左打舵并等待机械到位
    SteerLeft,
    /// 打舵状态下前进左转
    LeftTurn,
    /// 左转后的刹停停顿
    LeftTurnBrakePause,
    /// 右打舵并等待机械到位
    SteerRight,
    /// 打舵状态下倒车右转（编码器递减）
    ReverseTurn,
    /// 倒车后的刹停停顿
    ReverseBrakePause,
    /// 回正舵并等待机械到位
    SteerCenter,
    /// 循环收尾停顿，随后回到长直行
    CyclePause,
}

impl ManeuverPhase {
    pub fn label(self) -> &'static str {
        match self {
            ManeuverPhase::Idle => "idle",
            ManeuverPhase::LongForward => "long-forward",
            ManeuverPhase::ForwardBrakePause => "forward-brake-pause",
            ManeuverPhase::SteerLeft => "steer-left",
            ManeuverPhase::LeftTurn => "left-turn",
            ManeuverPhase::LeftTurnBrakePause => "left-turn-brake-pause",
            ManeuverPhase::SteerRight => "steer-right",
            ManeuverPhase::ReverseTurn => "reverse-turn",
            ManeuverPhase::ReverseBrakePause => "reverse-brake-pause",
            ManeuverPhase::SteerCenter => "steer-center",
            ManeuverPhase::CyclePause => "cycle-pause",
        }
    }
}

/// 行驶阶段的计程预算（具体脉冲数由配置给出）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PulseBudget {
    LongForward,
    LeftTurn,
    ReverseTurn,
}

impl PulseBudget {
    fn pulses(self, config: &ManeuverConfig) -> i64 {
        match self {
            PulseBudget::LongForward => config.long_forward_pulses,
            PulseBudget::LeftTurn => config.left_turn_pulses,
            PulseBudget::ReverseTurn => config.reverse_turn_pulses,
        }
    }
}

/// 阶段退出条件
#[derive(Debug, Clone, Copy)]
enum ExitRule {
    /// 前进计程：当前脉冲 − 基准 ≥ 预算
    ForwardPulses(PulseBudget),
    /// 倒车计程：基准 − 当前脉冲 ≥ 预算
    ReversePulses(PulseBudget),
    /// 停顿计时：进入阶段起经过的墙钟时间 ≥ 配置停顿
    Elapsed,
}

/// 转移表条目
#[derive(Debug, Clone, Copy)]
struct PhaseRule {
    drive: DriveIntent,
    steer: Option<SteerPosition>,
    exit: ExitRule,
    next: ManeuverPhase,
}

/// 转移表
///
/// `Idle` 不在表内：它没有退出条件，由 `step()` 在自主模式下
/// 直接迁入 `LongForward`。
fn phase_rule(phase: ManeuverPhase) -> PhaseRule {
    use ManeuverPhase::*;
    match phase {
        Idle => PhaseRule {
            drive: DriveIntent::Neutral,
            steer: None,
            exit: ExitRule::Elapsed,
            next: LongForward,
        },
        LongForward => PhaseRule {
            drive: DriveIntent::Forward,
            steer: Some(SteerPosition::Center),
            exit: ExitRule::ForwardPulses(PulseBudget::LongForward),
            next: ForwardBrakePause,
        },
        ForwardBrakePause => PhaseRule {
            drive: DriveIntent::Neutral,
            steer: None,
            exit: ExitRule::Elapsed,
            next: SteerLeft,
        },
        SteerLeft => PhaseRule {
            drive: DriveIntent::Neutral,
            steer: Some(SteerPosition::Left),
            exit: ExitRule::Elapsed,
            next: LeftTurn,
        },
        LeftTurn => PhaseRule {
            drive: DriveIntent::Forward,
            steer: None,
            exit: ExitRule::ForwardPulses(PulseBudget::LeftTurn),
            next: LeftTurnBrakePause,
        },
        LeftTurnBrakePause => PhaseRule {
            drive: DriveIntent::Neutral,
            steer: None,
            exit: ExitRule::Elapsed,
            next: SteerRight,
        },
        SteerRight => PhaseRule {
            drive: DriveIntent::Neutral,
            steer: Some(SteerPosition::Right),
            exit: ExitRule::Elapsed,
            next: ReverseTurn,
        },
        ReverseTurn => PhaseRule {
            drive: DriveIntent::Reverse,
            steer: None,
            exit: ExitRule::ReversePulses(PulseBudget::ReverseTurn),
            next: ReverseBrakePause,
        },
        ReverseBrakePause => PhaseRule {
            drive: DriveIntent::Neutral,
            steer: None,
            exit: ExitRule::Elapsed,
            next: SteerCenter,
        },
        SteerCenter => PhaseRule {
            drive: DriveIntent::Neutral,
            steer: Some(SteerPosition::Center),
            exit: ExitRule::Elapsed,
            next: CyclePause,
        },
        CyclePause => PhaseRule {
            drive: DriveIntent::Neutral,
            steer: None,
            exit: ExitRule::Elapsed,
            next: LongForward,
        },
    }
}

/// 一次步进的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 阶段继续执行
    Running,
    /// 受阻挂起：停车但阶段与计程基准保留
    Held,
    /// 迁移到新阶段
    Advanced(ManeuverPhase),
}

/// 巡逻机动状态机
#[derive(Debug)]
pub struct ManeuverMachine {
    config: ManeuverConfig,
    phase: ManeuverPhase,
    /// 当前行驶阶段的脉冲基准（进入阶段时捕获）
    start_pulse: i64,
    /// 当前阶段的进入时刻
    entered_at: Option<Instant>,
    /// 挂起标记（受阻或外部停车）
    held: bool,
}

impl ManeuverMachine {
    pub fn new(config: ManeuverConfig) -> Self {
        Self {
            config,
            phase: ManeuverPhase::Idle,
            start_pulse: 0,
            entered_at: None,
            held: false,
        }
    }

    pub fn phase(&self) -> ManeuverPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == ManeuverPhase::Idle
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// 退出自主模式时复位到 Idle
    ///
    /// 不触碰执行器（停车由仲裁器下发），不触碰共享脉冲计数。
    pub fn reset(&mut self) {
        if self.phase != ManeuverPhase::Idle {
            info!(from = self.phase.label(), "maneuver reset to idle");
        }
        self.phase = ManeuverPhase::Idle;
        self.entered_at = None;
        self.held = false;
    }

    /// 挂起当前阶段：停车一次，阶段与计程基准原样保留
    pub fn hold(&mut self, gateway: &ActuatorGateway) -> Result<(), ControlError> {
        if !self.held {
            gateway.halt()?;
            self.held = true;
            info!(phase = self.phase.label(), "maneuver held");
        }
        Ok(())
    }

    /// 解除挂起：重发本阶段的驱动命令，不重新捕获基准
    fn release(&mut self, gateway: &ActuatorGateway) -> Result<(), ControlError> {
        let rule = phase_rule(self.phase);
        Self::apply_drive(gateway, rule.drive)?;
        self.held = false;
        info!(phase = self.phase.label(), "maneuver resumed");
        Ok(())
    }

    fn apply_drive(gateway: &ActuatorGateway, drive: DriveIntent) -> Result<(), ControlError> {
        match drive {
            DriveIntent::Forward => gateway.set_drive(true, false),
            DriveIntent::Reverse => gateway.set_drive(false, true),
            DriveIntent::Neutral => gateway.set_drive(false, false),
        }
    }

    /// 迁入新阶段并执行其进入动作
    fn enter(
        &mut self,
        phase: ManeuverPhase,
        now: Instant,
        pulses: i64,
        gateway: &ActuatorGateway,
    ) -> Result<(), ControlError> {
        let rule = phase_rule(phase);
        if let Some(position) = rule.steer {
            gateway.set_steer_position(position)?;
        }
        Self::apply_drive(gateway, rule.drive)?;
        self.phase = phase;
        self.start_pulse = pulses;
        self.entered_at = Some(now);
        self.held = false;
        debug!(phase = phase.label(), start_pulse = pulses, "maneuver phase entered");
        Ok(())
    }

    /// 推进一个调度周期
    ///
    /// `front_blocked`/`rear_blocked` 来自障碍判定；只有当前阶段的
    /// 行驶方向对应的判定才会挂起状态机。
    pub fn step(
        &mut self,
        now: Instant,
        pulses: i64,
        front_blocked: bool,
        rear_blocked: bool,
        gateway: &ActuatorGateway,
    ) -> Result<StepOutcome, ControlError> {
        if self.phase == ManeuverPhase::Idle {
            // 巡逻起点：固定从长直行开始，基准全新捕获
            self.enter(ManeuverPhase::LongForward, now, pulses, gateway)?;
            return Ok(StepOutcome::Advanced(ManeuverPhase::LongForward));
        }

        let rule = phase_rule(self.phase);

        let blocked = match rule.drive {
            DriveIntent::Forward => front_blocked,
            DriveIntent::Reverse => rear_blocked,
            DriveIntent::Neutral => false,
        };
        if blocked {
            self.hold(gateway)?;
            return Ok(StepOutcome::Held);
        }
        if self.held {
            self.release(gateway)?;
        }

        let complete = match rule.exit {
            ExitRule::ForwardPulses(budget) => pulses - self.start_pulse >= budget.pulses(&self.config),
            ExitRule::ReversePulses(budget) => self.start_pulse - pulses >= budget.pulses(&self.config),
            ExitRule::Elapsed => match self.entered_at {
                Some(entered_at) => {
                    now.duration_since(entered_at).as_millis() as u64 >= self.config.pause_ms
                },
                None => true,
            },
        };
        if !complete {
            return Ok(StepOutcome::Running);
        }

        self.enter(rule.next, now, pulses, gateway)?;
        Ok(StepOutcome::Advanced(rule.next))
    }
}
