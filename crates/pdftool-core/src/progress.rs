//! Percent-complete notifications for multi-item operations

/// Wraps a caller callback and turns item counts into percentages
///
/// Reported values never decrease, and [`Progress::finish`] always delivers
/// a final `100`.
pub struct Progress<F: FnMut(u8)> {
    callback: F,
    total: usize,
    done: usize,
    last: Option<u8>,
}

impl<F: FnMut(u8)> Progress<F> {
    pub fn new(total: usize, callback: F) -> Self {
        Self {
            callback,
            total,
            done: 0,
            last: None,
        }
    }

    /// Report the starting `0`
    pub fn start(&mut self) {
        self.emit(0);
    }

    /// Mark one more item complete
    pub fn advance(&mut self) {
        self.done = (self.done + 1).min(self.total);
        let percent = if self.total == 0 {
            100
        } else {
            (self.done * 100 / self.total) as u8
        };
        self.emit(percent);
    }

    pub fn finish(&mut self) {
        self.done = self.total;
        self.emit(100);
    }

    fn emit(&mut self, percent: u8) {
        if matches!(self.last, Some(last) if percent <= last) {
            return;
        }
        self.last = Some(percent);
        (self.callback)(percent);
    }
}

/// Callback for callers that do not track progress
pub fn ignore(_: u8) {}
