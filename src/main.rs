//! ESP32 WaveGen - Main entry point
//!
//! On target:
//! 1. Bring up UART logging and NVS
//! 2. Bind the tick timer to the engine and the DAC
//! 3. Restore the last settings and apply them
//! 4. Service the log drain, persist settings when they change
//!
//! Input (buttons), display and spectrum analysis run in their own tasks and
//! only talk to the generator through `apply` / `current`.
//!
//! On the host the binary runs a short dry run against the simulated board.

fn main() {
    #[cfg(target_os = "espidf")]
    firmware::run();

    #[cfg(not(target_os = "espidf"))]
    host::run();
}

#[cfg(target_os = "espidf")]
mod firmware {
    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    use esp32_wavegen::config::nvs::{LoadResult, SettingsStore};
    use esp32_wavegen::hal::{timestamp_us, EspDac, EspPulse, EspTickTimer};
    use esp32_wavegen::uart_logger::{self, UartLoggerConfig, UartSink};
    use esp32_wavegen::{
        rt_error, rt_info, rt_warn, FaultState, WaveEngine, WaveGenerator, BOARD,
        DEFAULT_SETTINGS, LOG_STREAM,
    };

    // Process-lifetime state: the timer callback holds &'static references
    static ENGINE: WaveEngine = WaveEngine::new(BOARD.tick_period_us);
    static FAULT_STATE: FaultState = FaultState::new();

    /// Log drain / housekeeping period.
    const LOOP_MS: u32 = 20;

    pub fn run() -> ! {
        esp_idf_svc::sys::link_patches();

        let peripherals = match Peripherals::take() {
            Ok(p) => p,
            Err(_) => halt(),
        };

        let log_cfg = UartLoggerConfig::default();
        let mut uart = match uart_logger::init_uart_logger(
            peripherals.uart1,
            peripherals.pins.gpio17,
            &log_cfg,
        ) {
            Ok(uart) => uart,
            Err(_) => halt(),
        };

        rt_info!(LOG_STREAM, timestamp_us(), "{}", env!("VERSION_STRING"));

        // Restore last settings
        let mut store = EspDefaultNvsPartition::take()
            .ok()
            .and_then(|part| SettingsStore::new(part).ok());
        let initial = match store.as_ref().map(|s| s.load()) {
            Some(Ok(LoadResult::Loaded(settings))) => settings,
            Some(Ok(LoadResult::FreshInstall)) => DEFAULT_SETTINGS,
            Some(Err(e)) => {
                rt_warn!(LOG_STREAM, timestamp_us(), "nvs load failed: {:?}", e);
                DEFAULT_SETTINGS
            }
            None => {
                rt_warn!(LOG_STREAM, timestamp_us(), "nvs unavailable");
                DEFAULT_SETTINGS
            }
        };

        let dac = EspDac::new(BOARD.dac_channel);
        let timer = match EspTickTimer::new(&ENGINE, dac) {
            Ok(t) => t,
            Err(e) => {
                FAULT_STATE.raise(e);
                rt_error!(LOG_STREAM, timestamp_us(), "FAULT: {}", e);
                loop {
                    uart_logger::drain_to(&LOG_STREAM, &mut UartSink::new(&mut uart));
                    FreeRtos::delay_ms(1000);
                }
            }
        };
        let pulse = EspPulse::new(&BOARD);

        let mut generator =
            WaveGenerator::new(&ENGINE, dac, pulse, timer, &FAULT_STATE, &LOG_STREAM);

        // Failure is latched in FAULT_STATE and logged by the generator
        let _ = generator.apply(initial);
        let mut saved = generator.current();

        loop {
            uart_logger::drain_to(&LOG_STREAM, &mut UartSink::new(&mut uart));

            let current = generator.current();
            if current != saved && !FAULT_STATE.is_active() {
                if let Some(store) = store.as_mut() {
                    match store.save(&current) {
                        Ok(()) => saved = current,
                        Err(e) => {
                            rt_warn!(LOG_STREAM, timestamp_us(), "nvs save failed: {:?}", e)
                        }
                    }
                }
            }

            FreeRtos::delay_ms(LOOP_MS);
        }
    }

    /// Nothing to report to: park the task.
    fn halt() -> ! {
        loop {
            FreeRtos::delay_ms(1000);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use esp32_wavegen::hal::sim::SimBoard;
    use esp32_wavegen::uart_logger;
    use esp32_wavegen::{
        Adjustment, FaultState, WaveEngine, WaveGenerator, BOARD, DEFAULT_SETTINGS, LOG_STREAM,
    };

    /// Ticks per shape in the dry run (one period at step 1).
    const TICKS: u32 = 256;

    pub fn run() {
        let board = SimBoard::new();
        let engine = WaveEngine::new(BOARD.tick_period_us);
        let fault = FaultState::new();
        let mut generator = WaveGenerator::new(
            &engine,
            board.analog(),
            board.pulse(),
            board.timer(),
            &fault,
            &LOG_STREAM,
        );

        let mut settings = DEFAULT_SETTINGS;
        for _ in 0..4 {
            if let Err(e) = generator.apply(settings) {
                eprintln!("apply failed: {}", e);
                break;
            }

            let fired = board.run_ticks(&engine, TICKS);
            let current = generator.current();
            println!(
                "{} target={}Hz actual={}Hz amp={}% ticks={} last_level={} pulse={}Hz",
                current.wave.label(),
                current.target_hz,
                current.actual_hz,
                current.amp_percent(),
                fired,
                board.last_level(),
                board.pulse_hz()
            );

            settings = current.adjust(Adjustment::NextWave);
        }

        let mut out = String::new();
        uart_logger::drain_to(&LOG_STREAM, &mut out);
        print!("{}", out);

        if board.overlaps() != 0 {
            eprintln!("driver overlap detected: {}", board.overlaps());
        }
    }
}
