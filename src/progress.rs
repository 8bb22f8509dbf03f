use log::info;

/// Receives the fraction of the conversion completed, in `0.0..=1.0`,
/// and the cumulative number of bytes written.
pub type ProgressCallback = Box<dyn FnMut(f32, u64) + Send>;

/// Logs progress whenever it has advanced by at least `step` percentage points.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    step: u32,
    last: u32,
}

impl Default for ProgressLogger {
    fn default() -> Self {
        Self::new(5)
    }
}

impl ProgressLogger {
    pub fn new(step: u32) -> Self {
        Self {
            step: step.max(1),
            last: 0,
        }
    }

    /// Returns true if the progress was logged.
    pub fn record(&mut self, fraction: f32, bytes_written: u64) -> bool {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u32;
        if percent < self.last + self.step {
            return false;
        }
        self.last = percent;
        info!("progress {percent}%, bytes written: {bytes_written}");
        true
    }

    pub fn into_callback(mut self) -> ProgressCallback {
        Box::new(move |fraction, bytes| {
            self.record(fraction, bytes);
        })
    }
}
