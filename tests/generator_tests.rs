//! Configurator tests against the simulated board
//!
//! Reference frequencies, driver switch order, clamping,
//! fault handling and concurrent ticking.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use esp32_wavegen::hal::sim::{SimAnalog, SimBoard, SimEvent, SimFault, SimPulse, SimTimer};
use esp32_wavegen::logging::LogStream;
use esp32_wavegen::uart_logger;
use esp32_wavegen::wave::scale_sample;
use esp32_wavegen::{
    BoardConfig, FaultCode, FaultState, HalError, Settings, TickTimer, WaveEngine, WaveGenerator,
    WaveformKind, BOARD,
};

type SimGenerator<'a> = WaveGenerator<'a, SimAnalog<'a>, SimPulse<'a>, SimTimer<'a>>;

fn generator<'a>(
    board: &'a SimBoard,
    engine: &'a WaveEngine,
    fault: &'a FaultState,
    log: &'a LogStream,
) -> SimGenerator<'a> {
    WaveGenerator::new(
        engine,
        board.analog(),
        board.pulse(),
        board.timer(),
        fault,
        log,
    )
}

/// Failure plan shared with a [`ScriptedTimer`].
#[derive(Default)]
struct TimerScript {
    starts: AtomicU32,
    /// 1-based start call that fails, 0 = none.
    fail_start: AtomicU32,
    fail_stop: AtomicBool,
}

/// Tick timer that fails on cue. Never fires ticks.
struct ScriptedTimer<'a> {
    script: &'a TimerScript,
    running: bool,
    period_us: u32,
}

impl<'a> ScriptedTimer<'a> {
    fn new(script: &'a TimerScript) -> Self {
        Self {
            script,
            running: false,
            period_us: 0,
        }
    }
}

impl TickTimer for ScriptedTimer<'_> {
    fn start(&mut self, period_us: u32) -> Result<(), HalError> {
        let n = self.script.starts.fetch_add(1, Ordering::Relaxed) + 1;
        if n == self.script.fail_start.load(Ordering::Relaxed) {
            return Err(HalError::Timer(-1));
        }
        self.running = true;
        self.period_us = period_us;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        if self.script.fail_stop.load(Ordering::Relaxed) {
            return Err(HalError::Timer(-2));
        }
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

fn scripted<'a>(
    board: &'a SimBoard,
    engine: &'a WaveEngine,
    script: &'a TimerScript,
    fault: &'a FaultState,
    log: &'a LogStream,
) -> WaveGenerator<'a, SimAnalog<'a>, SimPulse<'a>, ScriptedTimer<'a>> {
    WaveGenerator::new(
        engine,
        board.analog(),
        board.pulse(),
        ScriptedTimer::new(script),
        fault,
        log,
    )
}

fn events(board: &SimBoard) -> Vec<SimEvent> {
    board.events().collect()
}

fn position(list: &[SimEvent], event: SimEvent) -> usize {
    list.iter()
        .position(|e| *e == event)
        .unwrap_or_else(|| panic!("{:?} not in {:?}", event, list))
}

fn drain(log: &LogStream) -> String {
    let mut out = String::new();
    uart_logger::drain_to(log, &mut out);
    out
}

fn sine(hz: f32) -> Settings {
    Settings::new(hz, 255, WaveformKind::Sine)
}

fn square(hz: f32) -> Settings {
    Settings::new(hz, 255, WaveformKind::Square)
}

// ============================================================================
// Continuous path
// ============================================================================

#[test]
fn test_sine_1000hz() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();

    let cur = wg.current();
    assert_eq!(cur.target_hz, 1000.0);
    assert_eq!(cur.actual_hz, 1015.625);
    assert_eq!(cur.wave, WaveformKind::Sine);
    assert_eq!(engine.phase_step(), 13);
    assert_eq!(engine.active_wave(), WaveformKind::Sine);

    assert_eq!(events(&board), vec![SimEvent::DacEnable, SimEvent::TimerStart]);
    assert!(board.dac_enabled());
    assert!(board.timer_running());
    assert!(!board.pulse_armed());
    assert_eq!(board.period_us(), 50);
    assert!(!fault.is_active());
}

#[test]
fn test_reference_frequencies() {
    // (target, step, actual)
    let cases = [
        (100.0, 1, 78.125),
        (1000.0, 13, 1015.625),
        (5000.0, 64, 5000.0),
        (8000.0, 64, 5000.0),
    ];

    for (target, step, actual) in cases {
        let board = SimBoard::new();
        let engine = WaveEngine::new(50);
        let fault = FaultState::new();
        let log = LogStream::new();
        let mut wg = generator(&board, &engine, &fault, &log);

        wg.apply(sine(target)).unwrap();
        assert_eq!(engine.phase_step(), step, "target {}", target);
        assert_eq!(wg.current().actual_hz, actual, "target {}", target);
        assert_eq!(wg.current().target_hz, target);
    }
}

#[test]
fn test_ticks_advance_phase() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();

    // First sample is sine[0] = 128 at full scale
    assert_eq!(board.run_ticks(&engine, 1), 1);
    assert_eq!(board.last_level(), scale_sample(128, 255));
    assert_eq!(engine.phase(), 13);

    assert_eq!(board.run_ticks(&engine, 99), 99);
    assert_eq!(engine.phase(), (100 * 13 % 256) as u16);
    assert_eq!(board.writes(), 100);
    assert_eq!(board.stray_writes(), 0);
    assert_eq!(board.overlaps(), 0);
}

#[test]
fn test_above_dac_limit_keeps_target() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(30_000.0)).unwrap();

    let cur = wg.current();
    assert_eq!(cur.target_hz, 30_000.0);
    assert_eq!(cur.actual_hz, 5000.0);
    assert_eq!(engine.phase_step(), 64);

    let out = drain(&log);
    assert!(out.contains("WARN: 30000Hz above DAC limit"), "{}", out);
}

#[test]
fn test_requested_actual_is_ignored() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    let mut req = sine(1000.0);
    req.actual_hz = 12_345.0;
    wg.apply(req).unwrap();

    assert_eq!(wg.current().actual_hz, 1015.625);
}

#[test]
fn test_amplitude_applied() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(Settings::new(78.125, 0, WaveformKind::Sine)).unwrap();
    board.run_ticks(&engine, 256);
    assert_eq!(board.last_level(), 0);

    // Sawtooth at step 1, half amplitude: out = i / 2
    wg.apply(Settings::new(78.125, 128, WaveformKind::Sawtooth))
        .unwrap();
    assert_eq!(engine.phase_step(), 1);
    let start = engine.phase() as u32;
    for i in 0..10u32 {
        board.run_ticks(&engine, 1);
        assert_eq!(board.last_level() as u32, ((start + i) % 256) / 2);
    }
}

#[test]
fn test_continuous_changes_are_live() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();
    board.clear_events();

    wg.apply(Settings::new(2000.0, 200, WaveformKind::Triangle))
        .unwrap();
    assert_eq!(engine.active_wave(), WaveformKind::Triangle);
    assert_eq!(engine.amp_scale(), 200);
    assert_eq!(engine.phase_step(), 26);

    // Drivers untouched
    assert!(events(&board).is_empty());
    assert!(board.timer_running());
}

#[test]
fn test_apply_is_idempotent() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    for settings in [sine(440.0), square(440.0)] {
        wg.apply(settings).unwrap();
        let first = wg.current();
        let step = engine.phase_step();
        board.clear_events();

        wg.apply(settings).unwrap();
        assert_eq!(wg.current(), first);
        assert_eq!(engine.phase_step(), step);
        if settings.wave.is_continuous() {
            assert!(events(&board).is_empty());
        }
    }
    assert_eq!(board.overlaps(), 0);
}

// ============================================================================
// Square path and switching
// ============================================================================

#[test]
fn test_switch_to_square() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();
    board.run_ticks(&engine, 10);
    board.clear_events();

    wg.apply(square(1000.0)).unwrap();

    let list = events(&board);
    assert!(position(&list, SimEvent::TimerStop) < position(&list, SimEvent::DacDisable));
    assert!(position(&list, SimEvent::DacDisable) < position(&list, SimEvent::PulseArm));
    assert_eq!(board.overlaps(), 0);

    assert!(!board.timer_running());
    assert!(!board.dac_enabled());
    assert!(board.pulse_armed());
    assert_eq!(board.pulse_hz(), 1000);
    assert_eq!(board.pulse_duty(), 128);
    assert_eq!(engine.active_wave(), WaveformKind::Square);

    let cur = wg.current();
    assert_eq!(cur.actual_hz, 1000.0);
    assert_eq!(cur.wave, WaveformKind::Square);

    // Timer is stopped: nothing fires
    let writes = board.writes();
    assert_eq!(board.run_ticks(&engine, 50), 0);
    assert_eq!(board.writes(), writes);
}

#[test]
fn test_switch_back_to_sine() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(square(1000.0)).unwrap();
    board.clear_events();

    wg.apply(sine(1000.0)).unwrap();

    let list = events(&board);
    assert!(position(&list, SimEvent::PulseDisable) < position(&list, SimEvent::DacEnable));
    assert!(position(&list, SimEvent::DacEnable) < position(&list, SimEvent::TimerStart));
    assert_eq!(board.overlaps(), 0);
    assert!(!board.pulse_armed());
    assert_eq!(wg.current().actual_hz, 1015.625);
    assert_eq!(board.run_ticks(&engine, 5), 5);
}

#[test]
fn test_cycle_all_shapes_never_overlaps() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    let mut settings = sine(3000.0);
    for _ in 0..12 {
        wg.apply(settings).unwrap();
        board.run_ticks(&engine, 64);
        settings = wg.current().adjust(esp32_wavegen::Adjustment::NextWave);
    }

    assert_eq!(board.overlaps(), 0);
    assert_eq!(board.stray_writes(), 0);
}

#[test]
fn test_square_clamps() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(square(2.0e7)).unwrap();
    assert_eq!(wg.current().target_hz, 1.0e7);
    assert_eq!(wg.current().actual_hz, 1.0e7);
    assert_eq!(board.pulse_hz(), 10_000_000);

    wg.apply(square(0.2)).unwrap();
    assert_eq!(wg.current().actual_hz, 1.0);
    assert_eq!(board.pulse_hz(), 1);

    wg.apply(square(1500.75)).unwrap();
    assert_eq!(wg.current().actual_hz, 1500.75);
    assert_eq!(board.pulse_hz(), 1500);
}

#[test]
fn test_square_uses_board_pulse_settings() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();

    let mut wg = generator(&board, &engine, &fault, &log);
    wg.apply(square(1000.0)).unwrap();
    assert_eq!(board.pulse_duty(), BOARD.pulse_duty);

    let custom = BoardConfig {
        pulse_resolution_bits: 10,
        pulse_duty: 512,
        ..BOARD
    };
    let mut wg = generator(&board, &engine, &fault, &log).with_board(custom);
    wg.apply(square(1000.0)).unwrap();
    assert_eq!(board.pulse_duty(), 512);
    assert_eq!(board.pulse_hz(), 1000);
}

#[test]
fn test_every_clamp_is_warned() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(square(2.0e7)).unwrap();
    let out = drain(&log);
    assert!(
        out.contains("WARN: 20000000Hz above pulse limit, using 10000000Hz"),
        "{}",
        out
    );

    wg.apply(sine(-5.0)).unwrap();
    let out = drain(&log);
    assert!(out.contains("WARN: -5Hz below 1Hz, using 1Hz"), "{}", out);
    assert!(out.contains("raised to 1"), "{}", out);

    // In range, but the ideal step rounds to 0
    wg.apply(sine(10.0)).unwrap();
    let out = drain(&log);
    assert!(out.contains("WARN: step 0.128 raised to 1"), "{}", out);
    assert_eq!(wg.current().target_hz, 10.0);
    assert_eq!(wg.current().actual_hz, 78.125);

    wg.apply(sine(20_000.0)).unwrap();
    let out = drain(&log);
    assert!(out.contains("WARN: step 256 capped at 64"), "{}", out);
    assert!(!out.contains("above DAC limit"), "{}", out);
}

// ============================================================================
// Faults
// ============================================================================

#[test]
fn test_pulse_failure_goes_silent() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();
    let before = wg.current();

    board.fail_next(SimFault::Pulse);
    let err = wg.apply(square(1000.0)).unwrap_err();
    assert_eq!(err, HalError::Pulse(-1));

    assert!(fault.is_active());
    assert_eq!(fault.code(), FaultCode::PulseSetup);
    assert_eq!(fault.count(), 1);
    assert_eq!(wg.current(), before);

    assert!(!board.timer_running());
    assert!(!board.dac_enabled());
    assert!(!board.pulse_armed());

    let out = drain(&log);
    assert!(out.contains("ERROR: FAULT"), "{}", out);

    // Recovery clears the latch, the counter keeps the history
    wg.apply(sine(1000.0)).unwrap();
    assert!(!fault.is_active());
    assert_eq!(fault.count(), 1);
    assert!(board.timer_running());
    assert_eq!(board.overlaps(), 0);
}

#[test]
fn test_analog_failure_on_first_apply() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    board.fail_next(SimFault::Analog);
    assert_eq!(wg.apply(sine(1000.0)), Err(HalError::Analog(-1)));

    assert_eq!(fault.code(), FaultCode::AnalogSetup);
    assert!(!board.timer_running());
    assert!(!board.dac_enabled());
    assert_eq!(engine.active_wave(), WaveformKind::Square);
    assert_eq!(board.run_ticks(&engine, 10), 0);
}

#[test]
fn test_timer_failure() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    board.fail_next(SimFault::Timer);
    assert_eq!(wg.apply(sine(1000.0)), Err(HalError::Timer(-1)));
    assert_eq!(fault.code(), FaultCode::TimerSetup);
    assert!(!board.dac_enabled());
    assert!(!board.timer_running());
}

#[test]
fn test_failed_restart_keeps_previous_period() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let script = TimerScript::default();
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = scripted(&board, &engine, &script, &fault, &log);

    wg.apply(sine(100.0)).unwrap();
    let before = wg.current();
    assert_eq!(before.actual_hz, 78.125);

    script.fail_start.store(2, Ordering::Relaxed);
    assert_eq!(wg.set_tick_period(100), Err(HalError::Timer(-1)));

    assert_eq!(wg.current(), before);
    assert_eq!(engine.tick_period_us(), 50);
    assert_eq!(engine.phase_step(), 1);
    assert_eq!(fault.code(), FaultCode::TimerSetup);
    assert!(!board.dac_enabled());

    // Recovers on the old period
    wg.apply(sine(100.0)).unwrap();
    assert!(!fault.is_active());
    assert_eq!(engine.tick_period_us(), 50);
    assert_eq!(wg.current(), before);
}

#[test]
fn test_fallback_failures_are_logged() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let script = TimerScript::default();
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = scripted(&board, &engine, &script, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();
    drain(&log);

    script.fail_stop.store(true, Ordering::Relaxed);
    assert_eq!(wg.apply(square(1000.0)), Err(HalError::Timer(-2)));

    let out = drain(&log);
    assert!(out.contains("ERROR: FAULT"), "{}", out);
    assert!(
        out.contains("WARN: fallback: tick timer setup failed"),
        "{}",
        out
    );
    assert!(!board.pulse_armed());
}

// ============================================================================
// Tick period, shutdown, logging
// ============================================================================

#[test]
fn test_set_tick_period() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();
    board.clear_events();

    wg.set_tick_period(100).unwrap();

    assert_eq!(events(&board), vec![SimEvent::TimerStop, SimEvent::TimerStart]);
    assert_eq!(board.period_us(), 100);
    assert_eq!(engine.tick_period_us(), 100);
    assert_eq!(engine.phase_step(), 26);
    assert_eq!(wg.current().actual_hz, 1015.625);
}

#[test]
fn test_tick_period_in_square_mode_is_deferred() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(square(1000.0)).unwrap();
    board.clear_events();

    wg.set_tick_period(100).unwrap();
    assert!(events(&board).is_empty());
    assert!(!board.timer_running());

    wg.apply(sine(1000.0)).unwrap();
    assert_eq!(board.period_us(), 100);
    assert_eq!(engine.phase_step(), 26);
}

#[test]
fn test_shutdown() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();
    wg.shutdown().unwrap();

    assert!(!board.timer_running());
    assert!(!board.dac_enabled());
    assert!(!board.pulse_armed());
    assert_eq!(board.run_ticks(&engine, 10), 0);

    wg.apply(square(1000.0)).unwrap();
    wg.shutdown().unwrap();
    assert!(!board.pulse_armed());
}

#[test]
fn test_apply_logs_summary() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);

    wg.apply(sine(1000.0)).unwrap();

    let out = drain(&log);
    assert!(
        out.contains("INFO: SIN target=1000Hz actual=1015.625Hz amp=255"),
        "{}",
        out
    );
    assert!(!out.contains("WARN"));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_live_updates_while_ticking() {
    let board = SimBoard::new();
    let engine = WaveEngine::new(50);
    let fault = FaultState::new();
    let log = LogStream::new();
    let mut wg = generator(&board, &engine, &fault, &log);
    wg.apply(sine(1000.0)).unwrap();

    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                board.run_ticks(&engine, 100);
                assert!(engine.phase() < 256);
            }
        });

        let shapes = [
            WaveformKind::Sine,
            WaveformKind::Triangle,
            WaveformKind::Sawtooth,
        ];
        for i in 0..2000u32 {
            let wave = shapes[(i % 3) as usize];
            let hz = 100.0 + (i % 50) as f32 * 97.0;
            wg.apply(Settings::new(hz, (i % 256) as u8, wave)).unwrap();
            // Keep the ring from filling
            drain(&log);
        }

        done.store(true, Ordering::Release);
    });

    assert!(engine.phase() < 256);
    assert_eq!(board.stray_writes(), 0);
    assert_eq!(board.overlaps(), 0);
    assert!(!fault.is_active());
}
