//! 整车 API
//!
//! 对外的 [`Rover`] 结构体：组装共享上下文、执行器网关和三个
//! 周期活动线程，并向外部协作方（遥控通道、编码器、遥测）发放
//! 显式句柄。上下文对象先构造、再注册，回调侧不存在全局
//! 单例。
//!
//! 掉电不保留任何状态：每次构造都是全新上下文、全新机动循环。

use crate::actuator::ActuatorGateway;
use crate::alerter::ProximityAlerter;
use crate::arbiter::ModeArbiter;
use crate::config::RoverConfig;
use crate::error::ControlError;
use crate::pipeline::{alerter_loop, control_loop, sampler_loop};
use crate::sampler::{DistanceSampler, ProbeSet};
use crate::state::{VehicleContext, WheelPulseHandle};
use ranger_hal::{Buzzer, DriveMotor, SteeringServo};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, info};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 整车硬件清单（全部以 trait 对象移交给控制核心）
pub struct RoverHardware {
    pub probes: ProbeSet,
    pub motor: Box<dyn DriveMotor + Send>,
    pub servo: Box<dyn SteeringServo + Send>,
    pub buzzer: Box<dyn Buzzer + Send>,
}

/// 巡逻车控制核心（对外 API）
pub struct Rover {
    ctx: Arc<VehicleContext>,
    gateway: Arc<ActuatorGateway>,
    control_thread: Option<JoinHandle<()>>,
    sampler_thread: Option<JoinHandle<()>>,
    alerter_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

impl Rover {
    /// 组装并启动控制核心
    ///
    /// # 参数
    /// - `hardware`: 整车硬件清单（被移动进各活动线程）
    /// - `config`: 控制配置（`None` 使用默认标定）
    ///
    /// # 错误
    /// - 执行器初始化失败（舵机回正 / 电机释放写不进去）
    pub fn new(hardware: RoverHardware, config: Option<RoverConfig>) -> Result<Self, ControlError> {
        let config = config.unwrap_or_default();

        let ctx = Arc::new(VehicleContext::new());
        let gateway = Arc::new(ActuatorGateway::new(
            hardware.motor,
            hardware.servo,
            config.actuator.clone(),
        )?);
        let is_running = Arc::new(AtomicBool::new(true));

        let arbiter = ModeArbiter::new(&config);
        let sampler = DistanceSampler::new(hardware.probes, &config.sampler);
        let alerter = ProximityAlerter::new(config.alerter.clone());

        let control_thread = {
            let ctx = ctx.clone();
            let gateway = gateway.clone();
            let period = config.scheduler.control_period();
            let is_running = is_running.clone();
            spawn(move || control_loop(ctx, gateway, arbiter, period, is_running))
        };

        let sampler_thread = {
            let ctx = ctx.clone();
            let period = config.scheduler.sampler_period();
            let is_running = is_running.clone();
            spawn(move || sampler_loop(sampler, ctx, period, is_running))
        };

        let alerter_thread = {
            let ctx = ctx.clone();
            let idle_period = config.scheduler.alerter_idle_period();
            let is_running = is_running.clone();
            spawn(move || alerter_loop(alerter, hardware.buzzer, ctx, idle_period, is_running))
        };

        info!("rover control core started");
        Ok(Self {
            ctx,
            gateway,
            control_thread: Some(control_thread),
            sampler_thread: Some(sampler_thread),
            alerter_thread: Some(alerter_thread),
            is_running,
        })
    }

    /// 共享载具上下文
    ///
    /// 遥控协作方经由它设置模式旗标；遥测协作方读取测距快照。
    pub fn context(&self) -> Arc<VehicleContext> {
        self.ctx.clone()
    }

    /// 执行器网关
    ///
    /// 手动模式下遥控协作方通过同一网关下发驱动/转向，与自主
    /// 路径共享幂等缓存和串行化。
    pub fn gateway(&self) -> Arc<ActuatorGateway> {
        self.gateway.clone()
    }

    /// 编码器协作方的注册句柄
    pub fn pulse_handle(&self) -> WheelPulseHandle {
        self.ctx.pulse_handle()
    }

    /// 活动线程是否全部存活
    pub fn is_healthy(&self) -> bool {
        let alive = |h: &Option<JoinHandle<()>>| h.as_ref().map(|h| !h.is_finished()).unwrap_or(false);
        alive(&self.control_thread) && alive(&self.sampler_thread) && alive(&self.alerter_thread)
    }

    /// 显式停机：通知全部活动线程退出并限时等待
    pub fn shutdown(mut self) -> Result<(), ControlError> {
        self.stop_threads()
    }

    fn stop_threads(&mut self) -> Result<(), ControlError> {
        // Release 保证此前的写入对各活动线程可见
        self.is_running.store(false, Ordering::Release);

        let join_timeout = Duration::from_secs(2);
        let mut result = Ok(());

        for (name, handle) in [
            ("control", self.control_thread.take()),
            ("sampler", self.sampler_thread.take()),
            ("alerter", self.alerter_thread.take()),
        ] {
            if let Some(handle) = handle {
                if handle.join_timeout(join_timeout).is_err() {
                    error!(thread = name, "thread failed to shut down within {:?}", join_timeout);
                    result = Err(ControlError::ThreadShutdown { name });
                }
            }
        }

        if result.is_ok() {
            info!("rover control core stopped");
        }
        result
    }
}

impl Drop for Rover {
    fn drop(&mut self) {
        if self.control_thread.is_some() || self.sampler_thread.is_some() || self.alerter_thread.is_some()
        {
            let _ = self.stop_threads();
        }
    }
}
