//! Integration tests for the rotator motion state machine

use alpaca_rotator::{wrap360, ConnectionState, DeviceConfig, RotatorDevice, RotatorError};

fn connected(config: DeviceConfig) -> RotatorDevice {
    let mut rotator = RotatorDevice::new(config);
    rotator.connect();
    rotator
}

fn run_to_completion(rotator: &mut RotatorDevice) -> usize {
    let mut steps = 0;
    while rotator.step() {
        steps += 1;
        assert!(steps < 10_000, "motion never completed");
    }
    steps
}

#[test]
fn lifecycle_states() {
    let mut rotator = RotatorDevice::new(DeviceConfig::default());
    assert_eq!(rotator.connection_state(), ConnectionState::Disconnected);

    assert!(rotator.begin_connect());
    assert_eq!(rotator.connection_state(), ConnectionState::Connecting);
    rotator.complete_connect();
    assert_eq!(rotator.connection_state(), ConnectionState::Idle);

    rotator.move_relative(5.0).unwrap();
    assert_eq!(rotator.connection_state(), ConnectionState::Moving);
    run_to_completion(&mut rotator);
    assert_eq!(rotator.connection_state(), ConnectionState::Idle);

    rotator.disconnect().unwrap();
    assert_eq!(rotator.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn relative_moves_land_within_one_step() {
    for (start, delta) in [(0.0, 37.0), (350.0, 25.0), (10.0, -30.0), (180.0, 725.0), (90.0, -400.5)] {
        let mut rotator = connected(DeviceConfig::default());
        rotator.move_mechanical(start).unwrap();
        run_to_completion(&mut rotator);

        let initial = rotator.position();
        rotator.move_relative(delta).unwrap();
        run_to_completion(&mut rotator);

        let expected = wrap360(initial + delta);
        let error = (rotator.position() - expected + 540.0).rem_euclid(360.0) - 180.0;
        assert!(
            error.abs() <= rotator.step_size(),
            "start {start} delta {delta}: at {} expected {expected}",
            rotator.position()
        );
        assert!(!rotator.is_moving());
    }
}

#[test]
fn shortest_path_across_zero() {
    let mut rotator = connected(DeviceConfig::default());
    rotator.move_mechanical(350.0).unwrap();
    let steps = run_to_completion(&mut rotator);

    assert_eq!(steps, 10);
    assert!((rotator.mechanical_position() - 350.0).abs() < 1e-9);
}

#[test]
fn absolute_move_honours_sync_offset() {
    let mut rotator = connected(DeviceConfig::default());
    rotator.sync(100.0).unwrap();

    rotator.move_absolute(120.0).unwrap();
    run_to_completion(&mut rotator);

    assert!((rotator.position() - 120.0).abs() < 1e-9);
    assert!((rotator.mechanical_position() - 20.0).abs() < 1e-9);
}

#[test]
fn relative_move_after_sync_subtracts_offset() {
    let mut rotator = connected(DeviceConfig::default());
    rotator.sync(45.0).unwrap();

    rotator.move_relative(10.0).unwrap();
    run_to_completion(&mut rotator);

    let expected = wrap360(0.0 + 10.0 - 45.0);
    assert!((rotator.mechanical_position() - expected).abs() < 1e-9);
    assert!((rotator.position() - 10.0).abs() < 1e-9);
}

#[test]
fn non_positive_step_size_still_completes() {
    for step_size in [0.0, -2.0, f64::NAN] {
        let mut rotator = connected(DeviceConfig::default().with_step_size(step_size));
        assert!(rotator.step_size() > 0.0);

        rotator.move_mechanical(20.0).unwrap();
        run_to_completion(&mut rotator);
        assert!(!rotator.is_moving());
    }
}

#[test]
fn busy_rotator_rejects_and_keeps_state() {
    let mut rotator = connected(DeviceConfig::default());
    rotator.move_relative(60.0).unwrap();
    rotator.step();
    let before = rotator.clone();

    assert_eq!(rotator.move_absolute(10.0), Err(RotatorError::Busy("start a move")));
    assert_eq!(rotator.sync(10.0), Err(RotatorError::Busy("sync")));
    assert_eq!(rotator.disconnect(), Err(RotatorError::Busy("disconnect")));

    assert_eq!(rotator.target_position(), before.target_position());
    assert_eq!(rotator.position_offset(), before.position_offset());
    assert!(rotator.connected());
}

#[test]
fn halt_mid_move() {
    let mut rotator = connected(DeviceConfig::default().with_step_size(2.0));
    rotator.move_relative(90.0).unwrap();
    for _ in 0..5 {
        rotator.step();
    }
    rotator.halt();

    assert!(!rotator.is_moving());
    assert!((rotator.mechanical_position() - 10.0).abs() < 1e-9);
    assert!(!rotator.step());
    assert!((rotator.mechanical_position() - 10.0).abs() < 1e-9);
}

#[test]
fn coarse_steps_stop_within_half_a_step() {
    let mut rotator = connected(DeviceConfig::default().with_step_size(5.0));
    rotator.move_mechanical(12.0).unwrap();
    run_to_completion(&mut rotator);

    assert!((rotator.mechanical_position() - 10.0).abs() < 1e-9);
    assert!(!rotator.is_moving());
}
