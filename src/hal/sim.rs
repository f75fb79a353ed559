//! Simulated board for host builds and tests.
//!
//! Records driver state and the order of enable/disable calls with atomics
//! only, so it works in `no_std` and can be shared by reference with a
//! "callback" running on another thread.
//!
//! Anything that would put two output drivers on the air at once is counted
//! as an overlap; a DAC write while the DAC is disabled is a stray write.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use super::{AnalogOut, HalError, PulseOut, TickTimer};
use crate::wave::WaveEngine;

/// Capacity of the event log.
pub const SIM_EVENT_CAPACITY: usize = 64;

/// Generic ESP-IDF failure code used for injected faults.
pub const SIM_ESP_FAIL: i32 = -1;

/// Driver call recorded by the board.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    DacEnable = 1,
    DacDisable = 2,
    PulseArm = 3,
    PulseDisable = 4,
    TimerStart = 5,
    TimerStop = 6,
}

impl SimEvent {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::DacEnable),
            2 => Some(Self::DacDisable),
            3 => Some(Self::PulseArm),
            4 => Some(Self::PulseDisable),
            5 => Some(Self::TimerStart),
            6 => Some(Self::TimerStop),
            _ => None,
        }
    }
}

/// Which driver the next injected failure hits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    None = 0,
    Timer = 1,
    Analog = 2,
    Pulse = 3,
}

/// Shared state of the simulated DAC, LEDC and timer.
pub struct SimBoard {
    dac_enabled: AtomicBool,
    pulse_armed: AtomicBool,
    timer_running: AtomicBool,
    period_us: AtomicU32,
    pulse_hz: AtomicU32,
    pulse_duty: AtomicU32,
    last_level: AtomicU8,
    writes: AtomicU32,
    ticks: AtomicU32,
    overlaps: AtomicU32,
    stray_writes: AtomicU32,
    fail_next: AtomicU8,
    events: [AtomicU8; SIM_EVENT_CAPACITY],
    event_len: AtomicU32,
}

impl SimBoard {
    pub const fn new() -> Self {
        const EMPTY: AtomicU8 = AtomicU8::new(0);
        Self {
            dac_enabled: AtomicBool::new(false),
            pulse_armed: AtomicBool::new(false),
            timer_running: AtomicBool::new(false),
            period_us: AtomicU32::new(0),
            pulse_hz: AtomicU32::new(0),
            pulse_duty: AtomicU32::new(0),
            last_level: AtomicU8::new(0),
            writes: AtomicU32::new(0),
            ticks: AtomicU32::new(0),
            overlaps: AtomicU32::new(0),
            stray_writes: AtomicU32::new(0),
            fail_next: AtomicU8::new(SimFault::None as u8),
            events: [EMPTY; SIM_EVENT_CAPACITY],
            event_len: AtomicU32::new(0),
        }
    }

    /// Driver handles bound to this board.
    pub fn analog(&self) -> SimAnalog<'_> {
        SimAnalog { board: self }
    }

    pub fn pulse(&self) -> SimPulse<'_> {
        SimPulse { board: self }
    }

    pub fn timer(&self) -> SimTimer<'_> {
        SimTimer { board: self }
    }

    /// Fire up to `n` timer callbacks. Returns how many actually ran
    /// (zero while the timer is stopped).
    pub fn run_ticks(&self, engine: &WaveEngine, n: u32) -> u32 {
        let analog = self.analog();
        let mut fired = 0;
        for _ in 0..n {
            if !self.timer_running.load(Ordering::Acquire) {
                break;
            }
            if self.pulse_armed.load(Ordering::Acquire) {
                self.overlaps.fetch_add(1, Ordering::Relaxed);
            }
            engine.tick(&analog);
            self.ticks.fetch_add(1, Ordering::Relaxed);
            fired += 1;
        }
        fired
    }

    /// Make the next call on `driver` fail with [`SIM_ESP_FAIL`].
    pub fn fail_next(&self, driver: SimFault) {
        self.fail_next.store(driver as u8, Ordering::Release);
    }

    pub fn dac_enabled(&self) -> bool {
        self.dac_enabled.load(Ordering::Acquire)
    }

    pub fn pulse_armed(&self) -> bool {
        self.pulse_armed.load(Ordering::Acquire)
    }

    pub fn timer_running(&self) -> bool {
        self.timer_running.load(Ordering::Acquire)
    }

    pub fn period_us(&self) -> u32 {
        self.period_us.load(Ordering::Relaxed)
    }

    pub fn pulse_hz(&self) -> u32 {
        self.pulse_hz.load(Ordering::Relaxed)
    }

    pub fn pulse_duty(&self) -> u32 {
        self.pulse_duty.load(Ordering::Relaxed)
    }

    pub fn last_level(&self) -> u8 {
        self.last_level.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Times two output drivers were active together.
    pub fn overlaps(&self) -> u32 {
        self.overlaps.load(Ordering::Relaxed)
    }

    /// DAC writes while the DAC was disabled.
    pub fn stray_writes(&self) -> u32 {
        self.stray_writes.load(Ordering::Relaxed)
    }

    /// Recorded driver calls, oldest first (first SIM_EVENT_CAPACITY only).
    pub fn events(&self) -> impl Iterator<Item = SimEvent> + '_ {
        let len = (self.event_len.load(Ordering::Acquire) as usize).min(SIM_EVENT_CAPACITY);
        self.events[..len]
            .iter()
            .filter_map(|e| SimEvent::from_u8(e.load(Ordering::Relaxed)))
    }

    pub fn clear_events(&self) {
        self.event_len.store(0, Ordering::Release);
    }

    fn record(&self, event: SimEvent) {
        let idx = self.event_len.fetch_add(1, Ordering::AcqRel) as usize;
        if idx < SIM_EVENT_CAPACITY {
            self.events[idx].store(event as u8, Ordering::Relaxed);
        }
    }

    fn take_fault(&self, driver: SimFault) -> bool {
        self.fail_next
            .compare_exchange(
                driver as u8,
                SimFault::None as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated DAC channel.
#[derive(Clone, Copy)]
pub struct SimAnalog<'a> {
    board: &'a SimBoard,
}

impl AnalogOut for SimAnalog<'_> {
    fn enable(&self) -> Result<(), HalError> {
        if self.board.take_fault(SimFault::Analog) {
            return Err(HalError::Analog(SIM_ESP_FAIL));
        }
        if self.board.pulse_armed() {
            self.board.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        self.board.dac_enabled.store(true, Ordering::Release);
        self.board.record(SimEvent::DacEnable);
        Ok(())
    }

    fn disable(&self) -> Result<(), HalError> {
        if self.board.take_fault(SimFault::Analog) {
            return Err(HalError::Analog(SIM_ESP_FAIL));
        }
        self.board.dac_enabled.store(false, Ordering::Release);
        self.board.record(SimEvent::DacDisable);
        Ok(())
    }

    fn write(&self, level: u8) {
        if !self.board.dac_enabled() {
            self.board.stray_writes.fetch_add(1, Ordering::Relaxed);
        }
        self.board.last_level.store(level, Ordering::Relaxed);
        self.board.writes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Simulated LEDC channel.
pub struct SimPulse<'a> {
    board: &'a SimBoard,
}

impl PulseOut for SimPulse<'_> {
    fn arm(&mut self, freq_hz: u32, _resolution_bits: u8, duty: u32) -> Result<(), HalError> {
        if self.board.take_fault(SimFault::Pulse) {
            return Err(HalError::Pulse(SIM_ESP_FAIL));
        }
        if self.board.dac_enabled() || self.board.timer_running() {
            self.board.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        self.board.pulse_hz.store(freq_hz, Ordering::Relaxed);
        self.board.pulse_duty.store(duty, Ordering::Relaxed);
        self.board.pulse_armed.store(true, Ordering::Release);
        self.board.record(SimEvent::PulseArm);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), HalError> {
        if self.board.take_fault(SimFault::Pulse) {
            return Err(HalError::Pulse(SIM_ESP_FAIL));
        }
        self.board.pulse_armed.store(false, Ordering::Release);
        self.board.record(SimEvent::PulseDisable);
        Ok(())
    }

    fn is_armed(&self) -> bool {
        self.board.pulse_armed()
    }
}

/// Simulated periodic timer. Ticks are fired with [`SimBoard::run_ticks`].
pub struct SimTimer<'a> {
    board: &'a SimBoard,
}

impl TickTimer for SimTimer<'_> {
    fn start(&mut self, period_us: u32) -> Result<(), HalError> {
        if self.board.take_fault(SimFault::Timer) {
            return Err(HalError::Timer(SIM_ESP_FAIL));
        }
        if self.board.pulse_armed() {
            self.board.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        self.board.period_us.store(period_us, Ordering::Relaxed);
        self.board.timer_running.store(true, Ordering::Release);
        self.board.record(SimEvent::TimerStart);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        if self.board.take_fault(SimFault::Timer) {
            return Err(HalError::Timer(SIM_ESP_FAIL));
        }
        self.board.timer_running.store(false, Ordering::Release);
        self.board.record(SimEvent::TimerStop);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.board.timer_running()
    }
}
