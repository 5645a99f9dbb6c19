//! 共享载具状态
//!
//! 控制核心与外部协作方（遥控通道、编码器、遥测）之间的全部共享
//! 状态集中在 [`VehicleContext`]：
//!
//! - 四路测距快照：每个传感器一个 `ArcSwap` 单元，写入方整体替换，
//!   读取方永远不会观察到撕裂值。
//! - 车轮脉冲计数：带符号单调计数器，由编码器协作方通过
//!   [`WheelPulseHandle`] 更新，核心只读。
//! - 模式旗标：遥控协作方写入，仲裁器每个调度周期采样一次。
//!
//! # 所有权
//!
//! 上下文对象先于硬件事件子系统构造，再以句柄形式显式注册给
//! 协作方；回调侧不存在可变全局量。

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::time::Instant;

/// 测距传感器标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum SensorId {
    Front = 0,
    Back = 1,
    Left = 2,
    Right = 3,
}

impl SensorId {
    /// 全部传感器，按快照表下标顺序
    pub const ALL: [SensorId; 4] = [SensorId::Front, SensorId::Back, SensorId::Left, SensorId::Right];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            SensorId::Front => "front",
            SensorId::Back => "back",
            SensorId::Left => "left",
            SensorId::Right => "right",
        }
    }
}

/// 单传感器测距快照
///
/// `distance_cm` 为 -1 表示本次测距无回波（无效读数）。
#[derive(Debug, Clone, Copy)]
pub struct DistanceReading {
    pub sensor: SensorId,
    pub distance_cm: i32,
    pub sampled_at: Instant,
}

impl DistanceReading {
    /// 上电初始快照：尚未测到任何回波
    pub fn invalid(sensor: SensorId, at: Instant) -> Self {
        Self {
            sensor,
            distance_cm: -1,
            sampled_at: at,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.distance_cm >= 0
    }
}

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OperatingMode {
    /// 手动遥控（默认）
    #[default]
    Manual = 0,
    /// 自主巡逻
    Autonomous = 1,
}

impl OperatingMode {
    /// 从 u8 转换；无效值回落到 Manual
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Autonomous,
            _ => Self::Manual,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_autonomous(self) -> bool {
        self == Self::Autonomous
    }
}

/// 运行模式（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicOperatingMode {
    inner: AtomicU8,
}

impl AtomicOperatingMode {
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            inner: AtomicU8::new(mode.as_u8()),
        }
    }

    pub fn get(&self) -> OperatingMode {
        OperatingMode::from_u8(self.inner.load(Ordering::Relaxed))
    }

    pub fn set(&self, mode: OperatingMode) {
        self.inner.store(mode.as_u8(), Ordering::Relaxed);
    }
}

impl Default for AtomicOperatingMode {
    fn default() -> Self {
        Self::new(OperatingMode::default())
    }
}

/// 外部下发的交通/遥控旗标
///
/// 写入方是遥控协作方（BLE/无线电层），核心每个周期只读采样。
#[derive(Debug, Default)]
pub struct ModeFlags {
    stop_requested: AtomicBool,
    yield_requested: AtomicBool,
    operating_mode: AtomicOperatingMode,
}

/// 一次调度周期内的旗标快照
#[derive(Debug, Clone, Copy)]
pub struct ModeSnapshot {
    pub stop_requested: bool,
    pub yield_requested: bool,
    pub operating_mode: OperatingMode,
}

impl ModeFlags {
    pub fn set_stop_requested(&self, on: bool) {
        self.stop_requested.store(on, Ordering::Relaxed);
    }

    pub fn set_yield_requested(&self, on: bool) {
        self.yield_requested.store(on, Ordering::Relaxed);
    }

    pub fn set_operating_mode(&self, mode: OperatingMode) {
        self.operating_mode.set(mode);
    }

    /// 单次一致采样；周期内所有判定使用同一份快照
    pub fn snapshot(&self) -> ModeSnapshot {
        ModeSnapshot {
            stop_requested: self.stop_requested.load(Ordering::Relaxed),
            yield_requested: self.yield_requested.load(Ordering::Relaxed),
            operating_mode: self.operating_mode.get(),
        }
    }
}

/// 车轮脉冲计数句柄
///
/// 交给编码器协作方持有。计数带符号：倒车时递减。
#[derive(Debug, Clone)]
pub struct WheelPulseHandle(Arc<AtomicI64>);

impl WheelPulseHandle {
    /// 累加脉冲增量（倒车为负）
    pub fn record(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// 整体覆盖计数（编码器重新同步时用）
    pub fn set(&self, pulses: i64) {
        self.0.store(pulses, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// 共享载具上下文
pub struct VehicleContext {
    distances: [ArcSwap<DistanceReading>; 4],
    wheel_pulses: Arc<AtomicI64>,
    flags: ModeFlags,
}

impl VehicleContext {
    pub fn new() -> Self {
        let boot = Instant::now();
        Self {
            distances: SensorId::ALL
                .map(|sensor| ArcSwap::from_pointee(DistanceReading::invalid(sensor, boot))),
            wheel_pulses: Arc::new(AtomicI64::new(0)),
            flags: ModeFlags::default(),
        }
    }

    /// 整体替换一个传感器的快照（唯一写入方：采样器）
    pub fn store_distance(&self, reading: DistanceReading) {
        self.distances[reading.sensor.index()].store(Arc::new(reading));
    }

    /// 读取一个传感器的最新快照
    pub fn distance(&self, sensor: SensorId) -> DistanceReading {
        *self.distances[sensor.index()].load_full()
    }

    /// 读取全部四路快照
    pub fn distances(&self) -> [DistanceReading; 4] {
        SensorId::ALL.map(|sensor| self.distance(sensor))
    }

    /// 遥测格式："front,back,left,right"（厘米，-1 为无效）
    pub fn distances_csv(&self) -> String {
        let d = self.distances();
        format!(
            "{},{},{},{}",
            d[SensorId::Front.index()].distance_cm,
            d[SensorId::Back.index()].distance_cm,
            d[SensorId::Left.index()].distance_cm,
            d[SensorId::Right.index()].distance_cm,
        )
    }

    pub fn wheel_pulses(&self) -> i64 {
        self.wheel_pulses.load(Ordering::Relaxed)
    }

    /// 编码器协作方的注册句柄
    pub fn pulse_handle(&self) -> WheelPulseHandle {
        WheelPulseHandle(self.wheel_pulses.clone())
    }

    pub fn flags(&self) -> &ModeFlags {
        &self.flags
    }
}

impl Default for VehicleContext {
    fn default() -> Self {
        Self::new()
    }
}
