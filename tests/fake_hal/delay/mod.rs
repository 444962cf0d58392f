use embedded_hal::delay::DelayNs;

/// Returns immediately, but keeps track of how long it was asked to wait.
#[derive(Debug, Default)]
pub struct Delay {
    pub total_ns: u64,
}

impl Delay {
    pub fn new() -> Delay {
        Delay { total_ns: 0 }
    }
}

impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}
