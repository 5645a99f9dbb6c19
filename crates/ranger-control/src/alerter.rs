//! 近障报警
//!
//! 把四路测距快照映射为蜂鸣节奏：距离越近脉冲越密，快速接近时
//! 节奏加倍。纯决策函数，不触碰任何执行器；发声由报警线程
//! （`pipeline::alerter_loop`）按决策驱动蜂鸣器。

use crate::config::AlerterConfig;
use crate::state::{DistanceReading, SensorId};
use std::time::Duration;

/// 一次评估产生的发声决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// 范围内无障碍：静音
    Silence,
    /// 近场：持续音
    Continuous { tone_hz: u16 },
    /// 脉冲音：`beep` 时长发声，随后 `off` 时长静音
    Pulse {
        tone_hz: u16,
        beep: Duration,
        off: Duration,
    },
}

/// 近障报警器
///
/// 持有上一轮观测到的最小有效距离作为接近速度基线。障碍从阈值外
/// 快速逼近时，基线保留的是真实的上一轮距离，而不是被阈值截断的
/// 值，因此第一拍进入报警范围就能触发加倍节奏。全部读数无效时
/// 基线复位到阈值。
#[derive(Debug)]
pub struct ProximityAlerter {
    config: AlerterConfig,
    previous_min_cm: i32,
}

/// 评估时的方向优先序（距离相等时靠前的方向胜出）
const PRIORITY: [SensorId; 4] = [SensorId::Front, SensorId::Left, SensorId::Right, SensorId::Back];

impl ProximityAlerter {
    pub fn new(config: AlerterConfig) -> Self {
        let previous_min_cm = config.threshold_cm;
        Self {
            config,
            previous_min_cm,
        }
    }

    fn tone_for(&self, sensor: SensorId) -> u16 {
        match sensor {
            SensorId::Front => self.config.tone_front_hz,
            SensorId::Left => self.config.tone_left_hz,
            SensorId::Right => self.config.tone_right_hz,
            SensorId::Back => self.config.tone_back_hz,
        }
    }

    /// 用最新快照做一次评估
    ///
    /// 快照数组按 [`SensorId`] 下标排列（`VehicleContext::distances()`
    /// 的返回值即是）。
    pub fn assess(&mut self, readings: &[DistanceReading; 4]) -> AlertDecision {
        let threshold = self.config.threshold_cm;

        // 全方向最小有效距离；严格小于保证优先序在距离相等时生效
        let mut min_cm = i32::MAX;
        let mut nearest: Option<SensorId> = None;
        for sensor in PRIORITY {
            let reading = &readings[sensor.index()];
            if reading.is_valid() && reading.distance_cm < min_cm {
                min_cm = reading.distance_cm;
                nearest = Some(sensor);
            }
        }

        let sensor = match nearest {
            Some(sensor) if min_cm < threshold => sensor,
            Some(_) => {
                // 观测到障碍但在阈值外：静音，基线跟随真实观测值
                self.previous_min_cm = min_cm;
                return AlertDecision::Silence;
            },
            None => {
                // 全部无效：静音并复位基线
                self.previous_min_cm = threshold;
                return AlertDecision::Silence;
            },
        };
        let tone_hz = self.tone_for(sensor);

        if min_cm < self.config.near_field_cm {
            return AlertDecision::Continuous { tone_hz };
        }

        // (d / threshold)² 在最小/最大间隔之间二次插值
        let min_off = self.config.min_off_ms as i64;
        let max_off = self.config.max_off_ms as i64;
        let d = min_cm as i64;
        let t = threshold as i64;
        let mut off_ms = min_off + (d * d * (max_off - min_off)) / (t * t);

        // 快速接近：脉冲加倍
        let closing = self.previous_min_cm - min_cm;
        self.previous_min_cm = min_cm;
        if closing > self.config.closing_speed_cm {
            off_ms /= 2;
        }

        AlertDecision::Pulse {
            tone_hz,
            beep: Duration::from_millis(self.config.beep_on_ms),
            off: Duration::from_millis(off_ms as u64),
        }
    }
}
