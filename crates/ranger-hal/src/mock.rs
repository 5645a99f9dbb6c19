//! Mock 硬件实现
//!
//! 提供无硬件环境（测试、SITL 仿真）下可用的设备实现。
//! 所有 mock 通过 `Arc` 共享内部状态：克隆出的句柄可以在
//! 设备被移交给控制核心之后继续注入激励、读取写入记录。

use crate::{Buzzer, DriveMotor, HalError, RangeProbe, SteeringServo};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

/// 声速换算系数：回波往返时间（微秒）≈ 距离（厘米）× 2 / 0.034
const ROUND_TRIP_US_PER_CM: f64 = 2.0 / 0.034;

/// 可共享的模拟距离单元（厘米）
///
/// 负值表示"无回波"：探头将返回 [`HalError::EchoTimeout`]。
#[derive(Debug, Clone)]
pub struct SimDistance(Arc<AtomicI32>);

impl SimDistance {
    pub fn new(distance_cm: i32) -> Self {
        Self(Arc::new(AtomicI32::new(distance_cm)))
    }

    /// 无回波（探头超时）
    pub fn out_of_range() -> Self {
        Self::new(-1)
    }

    pub fn set(&self, distance_cm: i32) {
        self.0.store(distance_cm, Ordering::Relaxed);
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Mock 超声波探头
///
/// 读取共享的 [`SimDistance`]，把厘米换算回回波往返时间返回，
/// 与真实探头的输出单位保持一致。
#[derive(Debug, Clone)]
pub struct MockRangeProbe {
    distance: SimDistance,
    ping_count: Arc<AtomicI32>,
}

impl MockRangeProbe {
    pub fn new(distance: SimDistance) -> Self {
        Self {
            distance,
            ping_count: Arc::new(AtomicI32::new(0)),
        }
    }

    /// 已触发的测距次数（用于验证轮询节奏）
    pub fn ping_count(&self) -> i32 {
        self.ping_count.load(Ordering::Relaxed)
    }
}

impl RangeProbe for MockRangeProbe {
    fn ping(&mut self, _timeout: Duration) -> Result<Duration, HalError> {
        self.ping_count.fetch_add(1, Ordering::Relaxed);
        let cm = self.distance.get();
        if cm < 0 {
            return Err(HalError::EchoTimeout);
        }
        // 向上取整保证换算回厘米时不因截断少 1
        let us = (cm as f64 * ROUND_TRIP_US_PER_CM).ceil() as u64;
        Ok(Duration::from_micros(us))
    }
}

/// 电机写入记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    Forward(u8),
    Reverse(u8),
    Coast,
}

/// Mock 驱动电机：记录每一次物理写入
#[derive(Debug, Clone, Default)]
pub struct MockDriveMotor {
    commands: Arc<Mutex<Vec<MotorCommand>>>,
}

impl MockDriveMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有物理写入，按时间顺序
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.commands.lock().clone()
    }

    /// 物理写入总次数（幂等性验证的关键指标）
    pub fn write_count(&self) -> usize {
        self.commands.lock().len()
    }

    /// 最后一次写入
    pub fn last_command(&self) -> Option<MotorCommand> {
        self.commands.lock().last().copied()
    }
}

impl DriveMotor for MockDriveMotor {
    fn forward(&mut self, duty: u8) -> Result<(), HalError> {
        self.commands.lock().push(MotorCommand::Forward(duty));
        Ok(())
    }

    fn reverse(&mut self, duty: u8) -> Result<(), HalError> {
        self.commands.lock().push(MotorCommand::Reverse(duty));
        Ok(())
    }

    fn coast(&mut self) -> Result<(), HalError> {
        self.commands.lock().push(MotorCommand::Coast);
        Ok(())
    }
}

/// Mock 转向舵机：记录每一次角度写入
#[derive(Debug, Clone, Default)]
pub struct MockSteeringServo {
    angles: Arc<Mutex<Vec<u8>>>,
}

impl MockSteeringServo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angles(&self) -> Vec<u8> {
        self.angles.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.angles.lock().len()
    }

    pub fn last_angle(&self) -> Option<u8> {
        self.angles.lock().last().copied()
    }
}

impl SteeringServo for MockSteeringServo {
    fn set_angle(&mut self, degrees: u8) -> Result<(), HalError> {
        self.angles.lock().push(degrees);
        Ok(())
    }
}

/// 蜂鸣器事件记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerEvent {
    Tone(u16),
    Silence,
}

/// Mock 蜂鸣器：记录发声/静音事件序列
#[derive(Debug, Clone, Default)]
pub struct MockBuzzer {
    events: Arc<Mutex<Vec<BuzzerEvent>>>,
}

impl MockBuzzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BuzzerEvent> {
        self.events.lock().clone()
    }

    pub fn last_event(&self) -> Option<BuzzerEvent> {
        self.events.lock().last().copied()
    }
}

impl Buzzer for MockBuzzer {
    fn tone(&mut self, freq_hz: u16) -> Result<(), HalError> {
        self.events.lock().push(BuzzerEvent::Tone(freq_hz));
        Ok(())
    }

    fn silence(&mut self) -> Result<(), HalError> {
        self.events.lock().push(BuzzerEvent::Silence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_round_trip_scaling() {
        let distance = SimDistance::new(30);
        let mut probe = MockRangeProbe::new(distance.clone());

        // 30cm → 约 1765µs 往返
        let rtt = probe.ping(Duration::from_millis(30)).unwrap();
        let cm = (rtt.as_micros() as f64 * 0.034 / 2.0) as i32;
        assert_eq!(cm, 30);

        // 修改共享单元后，同一探头读到新值
        distance.set(100);
        let rtt = probe.ping(Duration::from_millis(30)).unwrap();
        let cm = (rtt.as_micros() as f64 * 0.034 / 2.0) as i32;
        assert_eq!(cm, 100);
        assert_eq!(probe.ping_count(), 2);
    }

    #[test]
    fn test_probe_timeout_when_out_of_range() {
        let mut probe = MockRangeProbe::new(SimDistance::out_of_range());
        match probe.ping(Duration::from_millis(30)) {
            Err(HalError::EchoTimeout) => {},
            other => panic!("Expected EchoTimeout, got {:?}", other.map(|d| d.as_micros())),
        }
    }

    #[test]
    fn test_motor_records_writes_in_order() {
        let motor = MockDriveMotor::new();
        let mut handle = motor.clone();

        handle.forward(190).unwrap();
        handle.coast().unwrap();
        handle.reverse(170).unwrap();

        assert_eq!(
            motor.commands(),
            vec![
                MotorCommand::Forward(190),
                MotorCommand::Coast,
                MotorCommand::Reverse(170),
            ]
        );
        assert_eq!(motor.write_count(), 3);
        assert_eq!(motor.last_command(), Some(MotorCommand::Reverse(170)));
    }

    #[test]
    fn test_buzzer_event_sequence() {
        let buzzer = MockBuzzer::new();
        let mut handle = buzzer.clone();

        handle.tone(1000).unwrap();
        handle.silence().unwrap();

        assert_eq!(buzzer.events(), vec![BuzzerEvent::Tone(1000), BuzzerEvent::Silence]);
    }
}
