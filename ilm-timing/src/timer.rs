use std::cell::Cell;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Monotonic millisecond clock.
///
/// The same timer stamps input events, starts trial clocks and measures
/// response latencies, so every timestamp in a trial shares one epoch.
pub trait Timer {
    /// Milliseconds elapsed since the timer's epoch.
    fn now_ms(&self) -> f64;

    /// Milliseconds elapsed since `since_ms`, clamped at zero.
    fn elapsed_ms(&self, since_ms: f64) -> f64 {
        (self.now_ms() - since_ms).max(0.0)
    }

    fn sleep(&self, d: Duration);
}

impl<T: Timer + ?Sized> Timer for &T {
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }

    fn sleep(&self, d: Duration) {
        (**self).sleep(d)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

impl FrameStats {
    fn empty() -> Self {
        Self {
            average_frame_time_ns: 0.0,
            jitter_ns: 0.0,
            min_frame_time_ns: 0.0,
            max_frame_time_ns: 0.0,
            effective_fps: 0.0,
        }
    }
}

/// Wall-clock timer with platform sleeps and a rolling window of frame
/// durations.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
    frame_times: VecDeque<Duration>,
    max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1e3
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: VecDeque::with_capacity(1000),
            max_samples: 1000,
        }
    }

    pub fn record_frame(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(d);
    }

    pub fn frame_count(&self) -> usize {
        self.frame_times.len()
    }

    /// Mean, jitter (standard deviation) and extremes of the recorded frames.
    pub fn frame_stats(&self) -> FrameStats {
        if self.frame_times.is_empty() {
            return FrameStats::empty();
        }
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        FrameStats {
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(target_os = "macos")]
        self.macos_sleep(duration);
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` outlives the call and the remainder pointer may be null.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    #[cfg(target_os = "macos")]
    fn macos_sleep(&self, duration: Duration) {
        use mach2::mach_time::{mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t};

        // Short waits spin on the mach clock; the scheduler is too coarse for them.
        if duration.as_nanos() < 100_000 {
            unsafe {
                let start = mach_absolute_time();
                let mut timebase = mach_timebase_info_data_t { numer: 0, denom: 0 };
                mach_timebase_info(&mut timebase);

                let target_ticks =
                    duration.as_nanos() as u64 * timebase.denom as u64 / timebase.numer as u64;

                while mach_absolute_time() - start < target_ticks {
                    std::hint::spin_loop();
                }
            }
        } else {
            std::thread::sleep(duration);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer whose clock only moves when told to. Sleeping advances it.
#[derive(Debug, Default)]
pub struct ManualTimer {
    now: Cell<f64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: f64) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Timer for ManualTimer {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d.as_secs_f64() * 1e3);
    }
}
