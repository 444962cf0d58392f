use super::concurrent;
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use std::time::Duration;
use tank_sensors::seelevel::pulse::micros_between;

/// An input pin that replays scripted samples, one per read.
///
/// The number of samples read so far is kept under the pin's name, so it can double as a clock
/// that ticks once per microsecond of polling (see [`micros_clock`]). Once the script runs out,
/// the pin reads its idle level forever.
#[derive(Debug)]
pub struct Pin {
    data_to_read: Vec<u8>,
    name: &'static str,
    idle_high: bool,
}

impl Pin {
    pub fn new(name: &'static str) -> Pin {
        concurrent::set_named_value(name, 0);
        Pin {
            data_to_read: Vec::new(),
            name: name,
            idle_high: true,
        }
    }

    pub fn set_idle_high(&mut self, idle_high: bool) {
        self.idle_high = idle_high;
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data_to_read = data;
        concurrent::set_named_value(self.name, 0);
    }

    pub fn samples_read(&self) -> usize {
        concurrent::get_named_value(self.name)
    }
}

impl ErrorType for Pin {
    type Error = Infallible;
}

impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let data_index = concurrent::get_and_increment_named_value(self.name);
        Ok(match self.data_to_read.get(data_index) {
            Some(sample) => *sample > 0,
            None => self.idle_high,
        })
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// The current time of the clock driven by the pin called `name`, in microseconds.
pub fn micros_clock(name: &'static str) -> impl Fn() -> u32 {
    move || concurrent::get_named_value(name) as u32
}

/// Time elapsed on the clock driven by the pin called `name`.
pub fn elapsed_since(name: &'static str) -> impl Fn(u32) -> Duration {
    move |start| {
        let now = concurrent::get_named_value(name) as u32;
        Duration::from_micros(micros_between(start, now) as u64)
    }
}

/// An output pin that remembers its level and counts rising edges.
#[derive(Debug, Default)]
pub struct CountingPin {
    high: bool,
    rising_edges: usize,
}

impl CountingPin {
    pub fn new() -> CountingPin {
        CountingPin {
            high: false,
            rising_edges: 0,
        }
    }

    pub fn is_set_high(&self) -> bool {
        self.high
    }

    pub fn rising_edges(&self) -> usize {
        self.rising_edges
    }
}

impl ErrorType for CountingPin {
    type Error = Infallible;
}

impl OutputPin for CountingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        return Ok(());
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.high {
            self.rising_edges += 1;
        }
        self.high = true;
        return Ok(());
    }
}
