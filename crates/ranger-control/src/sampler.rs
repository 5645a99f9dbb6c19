//! 测距采样
//!
//! 四路超声波探头的轮询采样器。每次调用只触发一个探头（轮转
//! 前进一格），其余三路的快照保持不变。探头逐个触发，回波
//! 串扰由构造排除。
//!
//! 回波等待有固定上限；窗口内无回波写入 -1（无效读数）而不是
//! 停顿。传感器级异常就地吸收为无效读数，从不向上传播。

use crate::config::SamplerConfig;
use crate::state::{DistanceReading, SensorId, VehicleContext};
use ranger_hal::{HalError, RangeProbe};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// 回波往返时间 → 距离换算：cm = µs × 0.034 / 2
const CM_PER_ROUND_TRIP_US: f64 = 0.034 / 2.0;

/// 轮询顺序：相邻触发的探头朝向错开
const SCAN_ORDER: [SensorId; 4] = [SensorId::Front, SensorId::Left, SensorId::Back, SensorId::Right];

/// 四路探头，按 [`SensorId`] 下标排列
pub struct ProbeSet {
    pub front: Box<dyn RangeProbe + Send>,
    pub back: Box<dyn RangeProbe + Send>,
    pub left: Box<dyn RangeProbe + Send>,
    pub right: Box<dyn RangeProbe + Send>,
}

/// 轮询测距采样器
pub struct DistanceSampler {
    probes: [Box<dyn RangeProbe + Send>; 4],
    cursor: usize,
    echo_timeout: Duration,
}

impl DistanceSampler {
    pub fn new(probes: ProbeSet, config: &SamplerConfig) -> Self {
        Self {
            probes: [probes.front, probes.back, probes.left, probes.right],
            cursor: 0,
            echo_timeout: config.echo_timeout(),
        }
    }

    /// 采样轮转中的下一个传感器，整体替换其共享快照
    ///
    /// 返回本次更新的传感器。按固定周期（如 50ms）调用。
    pub fn sample_next(&mut self, ctx: &VehicleContext) -> SensorId {
        let sensor = SCAN_ORDER[self.cursor];
        self.cursor = (self.cursor + 1) % SCAN_ORDER.len();

        let distance_cm = match self.probes[sensor.index()].ping(self.echo_timeout) {
            Ok(round_trip) => (round_trip.as_micros() as f64 * CM_PER_ROUND_TRIP_US) as i32,
            Err(HalError::EchoTimeout) => {
                trace!(sensor = sensor.label(), "no echo within window");
                -1
            },
            Err(e) => {
                // 其他硬件异常同样吸收为无效读数
                warn!(sensor = sensor.label(), error = %e, "probe error, reading invalidated");
                -1
            },
        };

        ctx.store_distance(DistanceReading {
            sensor,
            distance_cm,
            sampled_at: Instant::now(),
        });
        trace!(sensor = sensor.label(), distance_cm, "distance sampled");
        sensor
    }
}
