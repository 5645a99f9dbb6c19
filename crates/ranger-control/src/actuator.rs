//! 执行器命令网关
//!
//! 全车唯一允许写驱动电机和转向舵机的组件；其余组件只表达意图。
//! 所有物理写入通过内部互斥锁串行化：两个并发调用方下发冲突
//! 命令是本设计要防住的首要竞态。
//!
//! # 幂等
//!
//! 网关缓存最近一次下发到设备的命令，相同命令直接跳过物理写入。
//! 障碍判定和机动状态机在受阻期间会反复下发"停车"，重复写入
//! 不得重触发机械动作或时序扰动。

use crate::config::ActuatorConfig;
use crate::error::ControlError;
use parking_lot::Mutex;
use ranger_hal::{DriveMotor, SteeringServo};
use std::time::Duration;
use tracing::{debug, trace};

/// 驱动意图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveIntent {
    Forward,
    Reverse,
    /// 不驱动（电机释放）
    #[default]
    Neutral,
}

impl DriveIntent {
    /// 由前进/倒车布尔对构造；两者同时为真是契约违规
    pub fn from_flags(forward: bool, backward: bool) -> Result<Self, ControlError> {
        match (forward, backward) {
            (true, true) => Err(ControlError::ConflictingDriveIntent),
            (true, false) => Ok(DriveIntent::Forward),
            (false, true) => Ok(DriveIntent::Reverse),
            (false, false) => Ok(DriveIntent::Neutral),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DriveIntent::Forward => "forward",
            DriveIntent::Reverse => "reverse",
            DriveIntent::Neutral => "neutral",
        }
    }
}

/// 预设转向位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerPosition {
    Left,
    Center,
    Right,
}

/// 最近一次实际下发到设备的命令
#[derive(Debug, Clone, Copy)]
struct AppliedState {
    drive: DriveIntent,
    steer: u8,
    duty: u8,
}

struct GatewayInner {
    motor: Box<dyn DriveMotor + Send>,
    servo: Box<dyn SteeringServo + Send>,
    applied: AppliedState,
}

/// 执行器命令网关
pub struct ActuatorGateway {
    config: ActuatorConfig,
    inner: Mutex<GatewayInner>,
}

impl ActuatorGateway {
    /// 构造网关并把执行器置入已知初始状态：舵机回正、电机释放
    pub fn new(
        mut motor: Box<dyn DriveMotor + Send>,
        mut servo: Box<dyn SteeringServo + Send>,
        config: ActuatorConfig,
    ) -> Result<Self, ControlError> {
        servo.set_angle(config.steer_center)?;
        motor.coast()?;
        let applied = AppliedState {
            drive: DriveIntent::Neutral,
            steer: config.steer_center,
            duty: config.drive_duty,
        };
        Ok(Self {
            config,
            inner: Mutex::new(GatewayInner { motor, servo, applied }),
        })
    }

    /// 下发驱动意图
    ///
    /// `forward && backward` 在任何设备写入之前被拒绝。与已生效
    /// 意图相同时跳过物理写入。
    pub fn set_drive(&self, forward: bool, backward: bool) -> Result<(), ControlError> {
        let intent = DriveIntent::from_flags(forward, backward)?;
        let mut inner = self.inner.lock();
        if inner.applied.drive == intent {
            trace!(intent = intent.label(), "drive unchanged, write skipped");
            return Ok(());
        }
        let duty = inner.applied.duty;
        Self::write_drive(&mut inner, intent, duty)?;
        inner.applied.drive = intent;
        debug!(intent = intent.label(), duty, "drive applied");
        Ok(())
    }

    /// 停车快捷方式
    pub fn halt(&self) -> Result<(), ControlError> {
        self.set_drive(false, false)
    }

    /// 下发转向角
    ///
    /// 角度钳位到 `[steer_left, steer_right]`。与已生效角度相同时
    /// 跳过写入；实际写入后做一次有界的机械稳定等待再返回（只
    /// 占用调用方自己的调度槽）。
    pub fn set_steer(&self, angle: u8) -> Result<(), ControlError> {
        let angle = angle.clamp(self.config.steer_left, self.config.steer_right);
        let mut inner = self.inner.lock();
        if inner.applied.steer == angle {
            trace!(angle, "steer unchanged, write skipped");
            return Ok(());
        }
        inner.servo.set_angle(angle)?;
        inner.applied.steer = angle;
        debug!(angle, "steer applied");
        let settle = self.config.settle();
        if settle > Duration::ZERO {
            spin_sleep::sleep(settle);
        }
        Ok(())
    }

    /// 下发预设转向位
    pub fn set_steer_position(&self, position: SteerPosition) -> Result<(), ControlError> {
        let angle = match position {
            SteerPosition::Left => self.config.steer_left,
            SteerPosition::Center => self.config.steer_center,
            SteerPosition::Right => self.config.steer_right,
        };
        self.set_steer(angle)
    }

    /// 设置驱动占空比
    ///
    /// 车辆在动时立即以新占空比重写电机输出；静止时记录下来，
    /// 下次驱动生效。
    pub fn set_speed(&self, duty: u8) -> Result<(), ControlError> {
        let mut inner = self.inner.lock();
        if inner.applied.duty == duty {
            return Ok(());
        }
        inner.applied.duty = duty;
        let drive = inner.applied.drive;
        if drive != DriveIntent::Neutral {
            Self::write_drive(&mut inner, drive, duty)?;
        }
        debug!(duty, "drive duty applied");
        Ok(())
    }

    fn write_drive(inner: &mut GatewayInner, intent: DriveIntent, duty: u8) -> Result<(), ControlError> {
        match intent {
            DriveIntent::Forward => inner.motor.forward(duty)?,
            DriveIntent::Reverse => inner.motor.reverse(duty)?,
            DriveIntent::Neutral => inner.motor.coast()?,
        }
        Ok(())
    }

    /// 当前生效的驱动意图
    pub fn applied_drive(&self) -> DriveIntent {
        self.inner.lock().applied.drive
    }

    /// 当前生效的转向角
    pub fn applied_steer(&self) -> u8 {
        self.inner.lock().applied.steer
    }

    /// 当前生效的驱动占空比
    pub fn applied_speed(&self) -> u8 {
        self.inner.lock().applied.duty
    }
}
