//! Mode configurator and settings façade.
//!
//! The only foreground entry point into the engine. Turns requested
//! [`Settings`] into either a phase step (DAC path) or native LEDC
//! parameters (square path) and switches drivers in a safe order:
//!
//! ```text
//! → continuous:  pulse off ─▶ engine state ─▶ DAC on ─▶ timer start
//! → square:      engine idle ─▶ timer stop ─▶ DAC off ─▶ pulse arm
//! ```
//!
//! Two output drivers are never active at the same time.
//!
//! Range problems are clamped and logged as warnings. Driver failures latch
//! a fault, silence both outputs and are returned to the caller.

use crate::config::{BoardConfig, BOARD};
use crate::fault::FaultState;
use crate::hal::{timestamp_us, AnalogOut, HalError, PulseOut, TickTimer};
use crate::logging::LogStream;
use crate::settings::{Settings, WaveformKind};
use crate::wave::quantize::{
    clamp_hz, plan_continuous, plan_pulse, ContinuousPlan, MAX_STEP, MIN_HZ, MIN_STEP,
    PULSE_MAX_HZ,
};
use crate::wave::WaveEngine;
use crate::{rt_debug, rt_error, rt_info, rt_warn};

/// Waveform generator front end.
pub struct WaveGenerator<'a, A, P, T>
where
    A: AnalogOut,
    P: PulseOut,
    T: TickTimer,
{
    engine: &'a WaveEngine,
    analog: A,
    pulse: P,
    timer: T,
    board: BoardConfig,
    analog_on: bool,
    settings: Settings,
    fault: &'a FaultState,
    log: &'a LogStream,
}

impl<'a, A, P, T> WaveGenerator<'a, A, P, T>
where
    A: AnalogOut,
    P: PulseOut,
    T: TickTimer,
{
    /// Wrap the engine and drivers. Nothing is switched on until [`apply`](Self::apply).
    ///
    /// `timer` must already be bound to `engine` (its callback calls `engine.tick`).
    pub fn new(
        engine: &'a WaveEngine,
        analog: A,
        pulse: P,
        timer: T,
        fault: &'a FaultState,
        log: &'a LogStream,
    ) -> Self {
        Self {
            engine,
            analog,
            pulse,
            timer,
            board: BOARD,
            analog_on: false,
            settings: crate::config::DEFAULT_SETTINGS,
            fault,
            log,
        }
    }

    /// Use `board` for the pulse resolution and duty instead of [`BOARD`].
    pub fn with_board(mut self, board: BoardConfig) -> Self {
        self.board = board;
        self
    }

    /// Last successfully applied settings, `actual_hz` included.
    #[inline]
    pub fn current(&self) -> Settings {
        self.settings
    }

    #[inline]
    pub fn engine(&self) -> &'a WaveEngine {
        self.engine
    }

    /// Apply new settings.
    ///
    /// Out-of-range values are clamped, never rejected. `actual_hz` in the
    /// request is ignored and recomputed. Safe to call repeatedly; identical
    /// requests leave identical state.
    ///
    /// # Errors
    ///
    /// A driver refused its setup. The fault is latched in [`FaultState`],
    /// both outputs are shut off and [`current`](Self::current) keeps the
    /// previous settings.
    pub fn apply(&mut self, requested: Settings) -> Result<(), HalError> {
        let mut resolved = requested;
        // Keep the intent, bounded to what any path accepts
        resolved.target_hz = clamp_hz(requested.target_hz, PULSE_MAX_HZ);
        self.warn_target_clamp(requested.target_hz, resolved.target_hz);

        let result = if resolved.wave.is_continuous() {
            self.enter_continuous(&resolved)
        } else {
            self.enter_pulse(&resolved)
        };

        match result {
            Ok(actual_hz) => {
                resolved.actual_hz = actual_hz;
                self.settings = resolved;
                if self.fault.is_active() {
                    self.fault.clear();
                    rt_info!(self.log, timestamp_us(), "fault cleared");
                }
                rt_info!(
                    self.log,
                    timestamp_us(),
                    "{} target={}Hz actual={}Hz amp={}",
                    resolved.wave.label(),
                    resolved.target_hz,
                    actual_hz,
                    resolved.amp
                );
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Change the tick period and re-derive the phase step for it.
    ///
    /// The callback is stopped across the change so it never runs with a
    /// period that does not match the step. In square mode only the stored
    /// period changes; it takes effect on the next continuous apply.
    ///
    /// # Errors
    ///
    /// The timer refused to stop or restart. Period and step are rolled
    /// back, the fault is latched and [`current`](Self::current) is unchanged.
    pub fn set_tick_period(&mut self, period_us: u32) -> Result<(), HalError> {
        let period_us = period_us.max(1);
        let was_running = self.timer.is_running();

        if was_running {
            if let Err(e) = self.timer.stop() {
                return Err(self.fail(e));
            }
        }

        if !self.settings.wave.is_continuous() {
            self.engine.set_tick_period_us(period_us);
            rt_debug!(self.log, timestamp_us(), "tick period {}us", period_us);
            return Ok(());
        }

        let plan = plan_continuous(self.settings.target_hz, period_us);
        self.warn_continuous_clamps(self.settings.target_hz, &plan);

        let prev_period = self.engine.tick_period_us();
        let prev_step = self.engine.phase_step();
        self.engine.set_tick_period_us(period_us);
        self.engine.set_phase_step(plan.step);

        if was_running {
            if let Err(e) = self.timer.start(period_us) {
                self.engine.set_tick_period_us(prev_period);
                self.engine.set_phase_step(prev_step);
                return Err(self.fail(e));
            }
        }

        self.settings.actual_hz = plan.actual_hz;
        rt_info!(
            self.log,
            timestamp_us(),
            "tick period {}us step={} actual={}Hz",
            period_us,
            plan.step,
            plan.actual_hz
        );
        Ok(())
    }

    /// Stop the callback and switch both outputs off.
    pub fn shutdown(&mut self) -> Result<(), HalError> {
        self.engine.set_active_wave(WaveformKind::Square);
        if self.timer.is_running() {
            self.timer.stop()?;
        }
        if self.analog_on {
            self.analog.disable()?;
            self.analog_on = false;
        }
        if self.pulse.is_armed() {
            self.pulse.disable()?;
        }
        rt_info!(self.log, timestamp_us(), "outputs off");
        Ok(())
    }

    fn enter_continuous(&mut self, req: &Settings) -> Result<f32, HalError> {
        let period_us = self.engine.tick_period_us();
        let plan = plan_continuous(req.target_hz, period_us);
        self.warn_continuous_clamps(req.target_hz, &plan);

        if self.pulse.is_armed() {
            self.pulse.disable()?;
            rt_debug!(self.log, timestamp_us(), "pulse off");
        }

        // Step and amplitude before the shape: the shape store publishes them
        self.engine.set_phase_step(plan.step);
        self.engine.set_amp_scale(req.amp);
        self.engine.set_active_wave(req.wave);

        if !self.analog_on {
            self.analog.enable()?;
            self.analog_on = true;
            rt_debug!(self.log, timestamp_us(), "dac on");
        }
        if !self.timer.is_running() {
            self.timer.start(period_us)?;
            rt_debug!(self.log, timestamp_us(), "tick every {}us", period_us);
        }

        rt_debug!(
            self.log,
            timestamp_us(),
            "ideal step {} -> {}",
            plan.ideal_step,
            plan.step
        );
        Ok(plan.actual_hz)
    }

    fn enter_pulse(&mut self, req: &Settings) -> Result<f32, HalError> {
        let plan = plan_pulse(
            req.target_hz,
            self.board.pulse_resolution_bits,
            self.board.pulse_duty,
        );

        // Idle the callback first, then take it and the DAC down
        self.engine.set_amp_scale(req.amp);
        self.engine.set_active_wave(WaveformKind::Square);
        if self.timer.is_running() {
            self.timer.stop()?;
            rt_debug!(self.log, timestamp_us(), "tick stopped");
        }
        if self.analog_on {
            self.analog.disable()?;
            self.analog_on = false;
            rt_debug!(self.log, timestamp_us(), "dac off");
        }

        self.pulse
            .arm(plan.freq_hz, plan.resolution_bits, plan.duty)?;
        rt_debug!(
            self.log,
            timestamp_us(),
            "pulse {}Hz {}bit duty={}",
            plan.freq_hz,
            plan.resolution_bits,
            plan.duty
        );
        Ok(plan.actual_hz())
    }

    fn warn_target_clamp(&self, requested_hz: f32, used_hz: f32) {
        if requested_hz == used_hz {
            return;
        }
        if requested_hz > PULSE_MAX_HZ {
            rt_warn!(
                self.log,
                timestamp_us(),
                "{}Hz above pulse limit, using {}Hz",
                requested_hz,
                used_hz
            );
        } else {
            // Below the floor, or NaN
            rt_warn!(
                self.log,
                timestamp_us(),
                "{}Hz below {}Hz, using {}Hz",
                requested_hz,
                MIN_HZ,
                used_hz
            );
        }
    }

    fn warn_continuous_clamps(&self, target_hz: f32, plan: &ContinuousPlan) {
        if plan.clamped_hz != target_hz {
            rt_warn!(
                self.log,
                timestamp_us(),
                "{}Hz above DAC limit, using {}Hz",
                target_hz,
                plan.clamped_hz
            );
        }
        let rounded = plan.ideal_step + 0.5;
        if plan.step == MAX_STEP && rounded >= (MAX_STEP + 1) as f32 {
            rt_warn!(
                self.log,
                timestamp_us(),
                "step {} capped at {}",
                plan.ideal_step,
                MAX_STEP
            );
        } else if plan.step == MIN_STEP && rounded < MIN_STEP as f32 {
            rt_warn!(
                self.log,
                timestamp_us(),
                "step {} raised to {}",
                plan.ideal_step,
                MIN_STEP
            );
        }
    }

    /// Latch the fault and fall back to silence (best effort).
    fn fail(&mut self, err: HalError) -> HalError {
        self.fault.raise(err);
        rt_error!(self.log, timestamp_us(), "FAULT: {}", err);

        self.engine.set_active_wave(WaveformKind::Square);
        if self.timer.is_running() {
            if let Err(e) = self.timer.stop() {
                rt_warn!(self.log, timestamp_us(), "fallback: {}", e);
            }
        }
        if self.analog_on {
            match self.analog.disable() {
                Ok(()) => self.analog_on = false,
                Err(e) => rt_warn!(self.log, timestamp_us(), "fallback: {}", e),
            }
        }
        if self.pulse.is_armed() {
            if let Err(e) = self.pulse.disable() {
                rt_warn!(self.log, timestamp_us(), "fallback: {}", e);
            }
        }
        err
    }
}
