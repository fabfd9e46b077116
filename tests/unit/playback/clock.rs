use std::time::Duration;

use super::*;

fn clock(opts: ClockOpts) -> PlaybackClock {
    PlaybackClock::new(Fps::new(10, 1).unwrap(), 10.0, opts)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn play_is_noop_when_already_playing() {
    let mut c = clock(ClockOpts::default());
    let t0 = Instant::now();
    assert!(c.play(t0));
    assert!(!c.play(t0 + Duration::from_secs(1)));
    assert_eq!(c.state(), PlaybackState::Playing);
}

#[test]
fn tick_advances_by_elapsed_times_rate() {
    let mut c = clock(ClockOpts {
        rate: 2.0,
        ..ClockOpts::default()
    });
    let t0 = Instant::now();
    c.play(t0);
    assert!(approx(c.tick(t0 + Duration::from_millis(500)), 1.0));
    assert!(approx(c.tick(t0 + Duration::from_millis(750)), 1.5));
}

#[test]
fn reaching_end_without_loop_clamps_and_stops() {
    let mut c = clock(ClockOpts::default());
    c.seek(9.5);
    let t0 = Instant::now();
    c.play(t0);
    assert_eq!(c.tick(t0 + Duration::from_secs(1)), 10.0);
    assert!(!c.is_playing());
    assert_eq!(c.tick(t0 + Duration::from_secs(2)), 10.0);
}

#[test]
fn reaching_end_with_loop_wraps_to_loop_start() {
    let mut c = clock(ClockOpts {
        looping: true,
        loop_start: 2.0,
        ..ClockOpts::default()
    });
    c.seek(9.9);
    let t0 = Instant::now();
    c.play(t0);
    assert_eq!(c.tick(t0 + Duration::from_millis(200)), 2.0);
    assert!(c.is_playing());
}

#[test]
fn pause_keeps_time_and_stop_resets() {
    let mut c = clock(ClockOpts::default());
    let t0 = Instant::now();
    c.play(t0);
    c.tick(t0 + Duration::from_secs(3));
    c.pause();
    assert_eq!(c.state(), PlaybackState::Paused);
    assert!(approx(c.current_time(), 3.0));
    assert!(approx(c.tick(t0 + Duration::from_secs(5)), 3.0));

    c.stop();
    assert_eq!(c.state(), PlaybackState::Stopped);
    assert_eq!(c.current_time(), 0.0);
}

#[test]
fn resume_after_pause_ignores_paused_wall_time() {
    let mut c = clock(ClockOpts::default());
    let t0 = Instant::now();
    c.play(t0);
    c.tick(t0 + Duration::from_secs(1));
    c.pause();
    c.play(t0 + Duration::from_secs(4));
    assert!(approx(c.tick(t0 + Duration::from_secs(5)), 2.0));
}

#[test]
fn seek_clamps_and_steps_by_frame() {
    let mut c = clock(ClockOpts::default());
    assert_eq!(c.seek(-3.0), 0.0);
    assert_eq!(c.seek(42.0), 10.0);
    c.seek(1.0);
    assert!(approx(c.step_forward(), 1.1));
    assert!(approx(c.step_backward(), 1.0));
    c.seek(0.0);
    assert_eq!(c.step_backward(), 0.0);
}

#[test]
fn shared_time_mirrors_clock() {
    let mut c = clock(ClockOpts::default());
    let shared = c.shared_time();
    c.seek(4.25);
    assert_eq!(shared.get(), 4.25);
}

#[test]
fn play_from_end_restarts() {
    let mut c = clock(ClockOpts::default());
    c.seek(10.0);
    c.play(Instant::now());
    assert_eq!(c.current_time(), 0.0);
}

#[test]
fn settings_are_validated() {
    let mut c = clock(ClockOpts::default());
    assert!(!c.set_rate(0.0));
    assert!(!c.set_rate(f64::NAN));
    assert!(c.set_rate(0.5));
    c.set_loop_start(99.0);
    assert_eq!(c.opts().loop_start, 10.0);

    c.seek(8.0);
    c.set_duration(5.0);
    assert_eq!(c.current_time(), 5.0);
    assert_eq!(c.opts().loop_start, 5.0);
}

#[test]
fn loop_start_at_end_behaves_as_not_looping() {
    let mut c = clock(ClockOpts {
        looping: true,
        ..ClockOpts::default()
    });
    c.set_loop_start(25.0);
    assert!(approx(c.opts().loop_start, 10.0));

    let t0 = Instant::now();
    c.seek(9.5);
    assert!(c.play(t0));
    assert!(approx(c.tick(t0 + Duration::from_secs(1)), 10.0));
    assert_eq!(c.state(), PlaybackState::Paused);

    assert!(c.play(t0 + Duration::from_secs(2)));
    assert!(approx(c.current_time(), 0.0));
}
