//! 控制层错误类型定义

use ranger_hal::HalError;
use thiserror::Error;

/// 控制层错误类型
#[derive(Error, Debug)]
pub enum ControlError {
    /// 硬件层错误
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// 同时请求前进和倒车
    ///
    /// 内部契约违规：命令在任何设备写入之前被拒绝。
    #[error("Conflicting drive intent: forward and backward requested together")]
    ConflictingDriveIntent,

    /// 活动线程未在限定时间内退出
    #[error("{name} thread failed to shut down in time")]
    ThreadShutdown { name: &'static str },
}
