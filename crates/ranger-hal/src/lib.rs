//! # Ranger 硬件抽象层
//!
//! 定义巡逻车硬件访问的统一 trait 抽象：超声波探头、驱动电机、
//! 转向舵机和蜂鸣器。控制核心只依赖这些 trait，具体实现由
//! 板级 crate 或 [`mock`] 模块提供。
//!
//! # 设计约定
//!
//! - 所有 trait 方法返回 [`HalError`]，由调用方决定吸收还是上抛。
//! - 回波超时（[`HalError::EchoTimeout`]）是正常工作状态，不是故障：
//!   表示测距窗口内没有回波，调用方应将其转换为"无效读数"。

use std::time::Duration;
use thiserror::Error;

pub mod mock;

/// 硬件层统一错误类型
#[derive(Error, Debug)]
pub enum HalError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] DeviceError),
    /// 回波窗口内没有收到回波（测距结果无效，非故障）
    #[error("Echo timeout")]
    EchoTimeout,
    #[error("Device not initialized")]
    NotInitialized,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    Busy,
    InvalidRequest,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, DeviceErrorKind::NoDevice | DeviceErrorKind::NotFound)
    }
}

impl From<String> for DeviceError {
    fn from(message: String) -> Self {
        Self::new(DeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for DeviceError {
    fn from(message: &str) -> Self {
        Self::new(DeviceErrorKind::Unknown, message)
    }
}

/// 超声波测距探头
///
/// 一次 `ping()` 对应一次完整的"触发 + 等待回波"操作。实现必须保证
/// 阻塞时间不超过 `timeout`；窗口内无回波时返回
/// [`HalError::EchoTimeout`] 而不是挂起。
///
/// # 互斥
///
/// 同一载具上的多个探头不得同时触发（回波串扰）。调用方负责串行化；
/// 实现内部只需保证单次 ping 的时序正确。
pub trait RangeProbe {
    /// 触发一次测距，返回回波往返时间
    fn ping(&mut self, timeout: Duration) -> Result<Duration, HalError>;
}

/// 直流驱动电机（H 桥 + PWM 调速）
///
/// `duty` 为 8 位 PWM 占空比（0-255）。实现不做去重：同一命令
/// 重复下发会重复写硬件，幂等性由上层命令网关保证。
pub trait DriveMotor {
    /// 正转（前进）
    fn forward(&mut self, duty: u8) -> Result<(), HalError>;
    /// 反转（倒车）
    fn reverse(&mut self, duty: u8) -> Result<(), HalError>;
    /// 释放（两桥臂拉低，PWM 置零）
    fn coast(&mut self) -> Result<(), HalError>;
}

/// 转向舵机
///
/// 角度为原始舵机角（度）。合法区间由上层配置约束，实现只负责写出。
pub trait SteeringServo {
    fn set_angle(&mut self, degrees: u8) -> Result<(), HalError>;
}

/// 蜂鸣器（PWM 发声）
pub trait Buzzer {
    /// 以指定频率持续发声，直到下一次 `tone()` 或 `silence()`
    fn tone(&mut self, freq_hz: u16) -> Result<(), HalError>;
    /// 停止发声
    fn silence(&mut self) -> Result<(), HalError>;
}
