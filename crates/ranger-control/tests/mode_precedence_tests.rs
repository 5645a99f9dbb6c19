//! 模式优先级与恢复正确性测试
//!
//! 在单线程里手工驱动仲裁器周期（显式传入时刻与脉冲），验证：
//! 1. 手动 > 停车 > 让行的优先级
//! 2. 停车保持不丢机动阶段与计程基准
//! 3. 障碍挂起/恢复使用原始计程基准

use ranger_control::{
    ActuatorConfig, DistanceReading, ManeuverPhase, ModeArbiter, OperatingMode, RoverConfig,
    SensorId, VehicleContext,
};
use ranger_control::ActuatorGateway;
use ranger_hal::mock::{MockDriveMotor, MockSteeringServo, MotorCommand};
use std::time::{Duration, Instant};

struct Harness {
    arbiter: ModeArbiter,
    ctx: VehicleContext,
    gateway: ActuatorGateway,
    motor: MockDriveMotor,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        let config = RoverConfig {
            actuator: ActuatorConfig {
                settle_ms: 0,
                ..ActuatorConfig::default()
            },
            ..RoverConfig::default()
        };
        let motor = MockDriveMotor::new();
        let servo = MockSteeringServo::new();
        let gateway = ActuatorGateway::new(
            Box::new(motor.clone()),
            Box::new(servo.clone()),
            config.actuator.clone(),
        )
        .unwrap();
        let ctx = VehicleContext::new();
        // 全方向畅通
        for sensor in SensorId::ALL {
            ctx.store_distance(DistanceReading {
                sensor,
                distance_cm: 200,
                sampled_at: Instant::now(),
            });
        }
        Self {
            arbiter: ModeArbiter::new(&config),
            ctx,
            gateway,
            motor,
            now: Instant::now(),
        }
    }

    fn set_front(&self, distance_cm: i32) {
        self.ctx.store_distance(DistanceReading {
            sensor: SensorId::Front,
            distance_cm,
            sampled_at: self.now,
        });
    }

    fn set_pulses(&self, pulses: i64) {
        self.ctx.pulse_handle().set(pulses);
    }

    fn tick(&mut self) {
        self.arbiter.tick(&self.ctx, &self.gateway, self.now).unwrap();
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// 从 Idle 推进到左转阶段（起始脉冲基准 1200）
    fn drive_to_left_turn(&mut self) {
        self.ctx.flags().set_operating_mode(OperatingMode::Autonomous);
        self.tick();
        assert_eq!(self.arbiter.phase(), ManeuverPhase::LongForward);

        self.set_pulses(1200);
        self.tick();
        assert_eq!(self.arbiter.phase(), ManeuverPhase::ForwardBrakePause);

        self.advance(Duration::from_millis(1001));
        self.tick();
        assert_eq!(self.arbiter.phase(), ManeuverPhase::SteerLeft);

        self.advance(Duration::from_millis(1001));
        self.tick();
        assert_eq!(self.arbiter.phase(), ManeuverPhase::LeftTurn);
    }
}

#[test]
fn test_manual_stop_yield_all_asserted_resets_to_idle() {
    let mut h = Harness::new();

    // 先进入自主并开始行驶
    h.ctx.flags().set_operating_mode(OperatingMode::Autonomous);
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LongForward);

    // 手动 + 停车 + 让行同时置位：手动复位胜出
    h.ctx.flags().set_operating_mode(OperatingMode::Manual);
    h.ctx.flags().set_stop_requested(true);
    h.ctx.flags().set_yield_requested(true);
    h.advance(Duration::from_millis(20));
    h.tick();

    assert_eq!(h.arbiter.phase(), ManeuverPhase::Idle);
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Coast));
    // 速度覆盖已恢复
    assert_eq!(h.gateway.applied_speed(), 190);
}

#[test]
fn test_stop_preserves_phase_and_pulse_reference() {
    let mut h = Harness::new();
    h.ctx.flags().set_operating_mode(OperatingMode::Autonomous);
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LongForward);

    // 行驶到 500 脉冲时收到停车请求
    h.set_pulses(500);
    h.ctx.flags().set_stop_requested(true);
    for _ in 0..5 {
        h.advance(Duration::from_millis(20));
        h.tick();
    }
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Coast));
    // 多个周期后阶段原样保留
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LongForward);

    // 停车解除：原地恢复前进
    h.ctx.flags().set_stop_requested(false);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Forward(170)));

    // 完成点仍按原基准（0 + 1200）计算，而不是 500 + 1200
    h.set_pulses(1199);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LongForward);
    h.set_pulses(1200);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::ForwardBrakePause);
}

#[test]
fn test_front_obstacle_during_left_turn_holds_then_resumes() {
    let mut h = Harness::new();
    h.drive_to_left_turn();
    // 左转起始基准：1200

    // 转到 1600 脉冲时前方 10cm 出现障碍
    h.set_pulses(1600);
    h.set_front(10);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Coast));
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LeftTurn);
    assert!(h.arbiter.front_obstacle_active());

    // 障碍持续存在：反复周期不迁移、不重启基准
    for _ in 0..10 {
        h.advance(Duration::from_millis(20));
        h.tick();
    }
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LeftTurn);
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Coast));

    // 障碍移走：消障确认期内仍保持停车
    h.set_front(150);
    let clear_start = h.now + Duration::from_millis(20);
    h.advance(Duration::from_millis(20));
    h.tick();
    while h.now < clear_start + Duration::from_millis(2900) {
        h.advance(Duration::from_millis(100));
        h.tick();
        assert!(h.arbiter.front_obstacle_active());
        assert_eq!(h.motor.last_command(), Some(MotorCommand::Coast));
    }

    // 满 3 秒：解除并重发前进
    h.advance(Duration::from_millis(200));
    h.tick();
    assert!(!h.arbiter.front_obstacle_active());
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Forward(170)));
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LeftTurn);

    // 完成点按原始基准：1200 + 1000 = 2200
    h.set_pulses(2199);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LeftTurn);
    h.set_pulses(2200);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LeftTurnBrakePause);
}

#[test]
fn test_transient_clear_reading_does_not_resume_early() {
    let mut h = Harness::new();
    h.drive_to_left_turn();

    h.set_pulses(1600);
    h.set_front(10);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert!(h.arbiter.front_obstacle_active());

    // 瞬态清空 2 秒后障碍回来：消障计时必须清零
    h.set_front(150);
    h.advance(Duration::from_millis(2000));
    h.tick();
    assert!(h.arbiter.front_obstacle_active());
    h.set_front(10);
    h.advance(Duration::from_millis(20));
    h.tick();

    // 再清空 2.9 秒：从清零点重新计时，仍未满 3 秒
    h.set_front(150);
    h.advance(Duration::from_millis(20));
    h.tick();
    h.advance(Duration::from_millis(2900));
    h.tick();
    assert!(h.arbiter.front_obstacle_active());
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Coast));

    // 补满 3 秒后才恢复
    h.advance(Duration::from_millis(200));
    h.tick();
    assert!(!h.arbiter.front_obstacle_active());
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Forward(170)));
}

#[test]
fn test_rear_obstacle_holds_reverse_turn_via_same_path() {
    let mut h = Harness::new();
    h.drive_to_left_turn();

    // 推进到倒车右转
    h.set_pulses(2200);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::LeftTurnBrakePause);
    h.advance(Duration::from_millis(1001));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::SteerRight);
    h.advance(Duration::from_millis(1001));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::ReverseTurn);
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Reverse(170)));

    // 倒车 300 脉冲后后方出现障碍
    h.set_pulses(1900);
    h.ctx.store_distance(DistanceReading {
        sensor: SensorId::Back,
        distance_cm: 15,
        sampled_at: h.now,
    });
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Coast));
    assert_eq!(h.arbiter.phase(), ManeuverPhase::ReverseTurn);
    assert!(h.arbiter.rear_obstacle_active());

    // 清空满 3 秒：与前向同一条恢复路径，重发倒车命令
    h.ctx.store_distance(DistanceReading {
        sensor: SensorId::Back,
        distance_cm: 120,
        sampled_at: h.now,
    });
    h.advance(Duration::from_millis(20));
    h.tick();
    h.advance(Duration::from_millis(3100));
    h.tick();
    assert!(!h.arbiter.rear_obstacle_active());
    assert_eq!(h.motor.last_command(), Some(MotorCommand::Reverse(170)));

    // 完成点按原始基准：2200 − 1200 = 1000
    h.set_pulses(1001);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::ReverseTurn);
    h.set_pulses(1000);
    h.advance(Duration::from_millis(20));
    h.tick();
    assert_eq!(h.arbiter.phase(), ManeuverPhase::ReverseBrakePause);
}
