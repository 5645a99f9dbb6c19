//! 障碍判定
//!
//! 把原始测距读数转换为去抖后的"该方向当前能否移动"判定。
//! 前后两个方向各持有一个独立的 [`ObstacleGuard`]，互不影响。
//!
//! # 去抖语义
//!
//! - 读数有效且低于阈值 → 立即激活。
//! - 激活期间任何再次确认障碍的读数（低于阈值，或按策略解释为
//!   障碍的无效读数）都会清零消障计时。
//! - 只有读数连续非障碍满 `resume_delay` 才解除；单次瞬态的
//!   "已清空"读数不会解除判定。
//!
//! 传感器持续无回波时障碍无限期保持激活。这是失效安全行为，
//! 不是缺陷。

use crate::config::{GuardConfig, InvalidReadingPolicy};
use crate::state::DistanceReading;
use std::time::Instant;
use tracing::{debug, info};

/// 障碍判定方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Front,
    Rear,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Front => "front",
            Direction::Rear => "rear",
        }
    }
}

/// 单方向的障碍状态
#[derive(Debug, Clone, Copy)]
pub struct ObstacleState {
    pub direction: Direction,
    /// 当前是否判定为有障碍（激活时该方向禁止移动）
    pub active: bool,
    /// 激活时刻
    pub detected_at: Option<Instant>,
    /// 首次观察到"已清空"的时刻；再次确认障碍时清零
    pub clear_observed_at: Option<Instant>,
}

impl ObstacleState {
    fn idle(direction: Direction) -> Self {
        Self {
            direction,
            active: false,
            detected_at: None,
            clear_observed_at: None,
        }
    }
}

/// 单方向障碍判定器
#[derive(Debug)]
pub struct ObstacleGuard {
    threshold_cm: i32,
    resume_delay_ms: u64,
    invalid_policy: InvalidReadingPolicy,
    state: ObstacleState,
}

impl ObstacleGuard {
    /// 前向判定器
    pub fn front(config: &GuardConfig) -> Self {
        Self::new(Direction::Front, config.front_threshold_cm, config)
    }

    /// 后向判定器
    pub fn rear(config: &GuardConfig) -> Self {
        Self::new(Direction::Rear, config.rear_threshold_cm, config)
    }

    fn new(direction: Direction, threshold_cm: i32, config: &GuardConfig) -> Self {
        Self {
            threshold_cm,
            resume_delay_ms: config.resume_delay_ms,
            invalid_policy: config.invalid_reading,
            state: ObstacleState::idle(direction),
        }
    }

    pub fn state(&self) -> &ObstacleState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// 读数是否确认障碍
    fn obstructing(&self, reading: &DistanceReading) -> bool {
        if reading.is_valid() {
            reading.distance_cm < self.threshold_cm
        } else {
            // 激活期间无效读数按策略解释；未激活时无效读数不产生新判定
            self.state.active && self.invalid_policy == InvalidReadingPolicy::Obstructed
        }
    }

    /// 用最新读数推进判定，返回更新后的状态
    ///
    /// 每个控制周期调用一次。`now` 由调用方传入，判定本身不读时钟。
    pub fn evaluate(&mut self, reading: DistanceReading, now: Instant) -> &ObstacleState {
        let obstructing = self.obstructing(&reading);

        if !self.state.active {
            if obstructing {
                self.state.active = true;
                self.state.detected_at = Some(now);
                self.state.clear_observed_at = None;
                info!(
                    direction = self.state.direction.label(),
                    distance_cm = reading.distance_cm,
                    "obstacle detected"
                );
            }
            return &self.state;
        }

        if obstructing {
            // 障碍再次得到确认：消障计时从头再来
            if self.state.clear_observed_at.is_some() {
                debug!(
                    direction = self.state.direction.label(),
                    "obstacle re-affirmed, resume timer reset"
                );
            }
            self.state.clear_observed_at = None;
            return &self.state;
        }

        match self.state.clear_observed_at {
            None => {
                self.state.clear_observed_at = Some(now);
                info!(
                    direction = self.state.direction.label(),
                    resume_delay_ms = self.resume_delay_ms,
                    "obstacle no longer observed, waiting before resume"
                );
            },
            Some(cleared_at) => {
                if now.duration_since(cleared_at).as_millis() as u64 >= self.resume_delay_ms {
                    self.state.active = false;
                    self.state.detected_at = None;
                    self.state.clear_observed_at = None;
                    info!(direction = self.state.direction.label(), "obstacle cleared");
                }
            },
        }

        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SensorId;
    use std::time::Duration;

    fn reading(cm: i32, at: Instant) -> DistanceReading {
        DistanceReading {
            sensor: SensorId::Front,
            distance_cm: cm,
            sampled_at: at,
        }
    }

    fn guard() -> ObstacleGuard {
        ObstacleGuard::front(&GuardConfig::default())
    }

    #[test]
    fn test_activates_below_threshold() {
        let mut g = guard();
        let t0 = Instant::now();

        assert!(!g.evaluate(reading(35, t0), t0).active);
        let state = g.evaluate(reading(25, t0), t0);
        assert!(state.active);
        assert_eq!(state.detected_at, Some(t0));
        assert_eq!(state.clear_observed_at, None);
    }

    #[test]
    fn test_invalid_reading_does_not_activate() {
        let mut g = guard();
        let t0 = Instant::now();
        assert!(!g.evaluate(reading(-1, t0), t0).active);
    }

    #[test]
    fn test_clears_only_after_resume_delay() {
        let mut g = guard();
        let t0 = Instant::now();
        g.evaluate(reading(10, t0), t0);
        assert!(g.is_active());

        // 已清空但未满 3 秒：仍激活
        let t1 = t0 + Duration::from_millis(100);
        assert!(g.evaluate(reading(80, t1), t1).active);
        let t2 = t1 + Duration::from_millis(2800);
        assert!(g.evaluate(reading(80, t2), t2).active);

        // 连续清空满 3 秒：解除
        let t3 = t1 + Duration::from_millis(3000);
        let state = g.evaluate(reading(80, t3), t3);
        assert!(!state.active);
        assert_eq!(state.detected_at, None);
        assert_eq!(state.clear_observed_at, None);
    }

    #[test]
    fn test_transient_clear_does_not_release() {
        let mut g = guard();
        let t0 = Instant::now();
        g.evaluate(reading(10, t0), t0);

        // 瞬态"已清空"读数
        let t1 = t0 + Duration::from_millis(500);
        g.evaluate(reading(90, t1), t1);
        // 障碍再次确认：计时清零
        let t2 = t1 + Duration::from_millis(500);
        g.evaluate(reading(12, t2), t2);

        // 从 t1 起已过 3 秒，但 t2 处计时被清零，不得解除
        let t3 = t1 + Duration::from_millis(3100);
        assert!(g.evaluate(reading(90, t3), t3).active);

        // 从 t3 重新计时，满 3 秒才解除
        let t4 = t3 + Duration::from_millis(3000);
        assert!(!g.evaluate(reading(90, t4), t4).active);
    }

    #[test]
    fn test_invalid_holds_obstruction_under_failsafe_policy() {
        let mut g = guard();
        let t0 = Instant::now();
        g.evaluate(reading(10, t0), t0);

        // 激活后传感器失去回波：维持激活，消障计时不启动
        let t1 = t0 + Duration::from_millis(500);
        g.evaluate(reading(-1, t1), t1);
        let t2 = t1 + Duration::from_millis(5000);
        let state = g.evaluate(reading(-1, t2), t2);
        assert!(state.active);
        assert_eq!(state.clear_observed_at, None);
    }

    #[test]
    fn test_invalid_counts_as_clear_under_clear_policy() {
        let config = GuardConfig {
            invalid_reading: InvalidReadingPolicy::Clear,
            ..GuardConfig::default()
        };
        let mut g = ObstacleGuard::front(&config);
        let t0 = Instant::now();
        g.evaluate(reading(10, t0), t0);

        let t1 = t0 + Duration::from_millis(100);
        g.evaluate(reading(-1, t1), t1);
        let t2 = t1 + Duration::from_millis(3000);
        assert!(!g.evaluate(reading(-1, t2), t2).active);
    }

    #[test]
    fn test_front_and_rear_thresholds_independent() {
        let config = GuardConfig {
            front_threshold_cm: 30,
            rear_threshold_cm: 45,
            ..GuardConfig::default()
        };
        let mut front = ObstacleGuard::front(&config);
        let mut rear = ObstacleGuard::rear(&config);
        let t0 = Instant::now();

        // 40cm：前向不判障，后向判障
        assert!(!front.evaluate(reading(40, t0), t0).active);
        assert!(rear.evaluate(reading(40, t0), t0).active);
    }
}
