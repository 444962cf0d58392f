/// Validation of response frames.
pub mod frame;
/// Conversion of segment readings into a tank fill percentage.
pub mod level;
/// Capture and decoding of the pulse train sent by the sensors.
pub mod pulse;

use core::convert::TryFrom;
use core::time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, warn};

use frame::FrameError;
use level::CalibrationTable;
use pulse::PULSES_PER_FRAME;

/// Returned by [`SeeLevel::read_tank_level`] when no level could be read.
pub const NO_READING: f32 = -1.0;

#[derive(Debug, PartialEq)]
pub enum Error<TIoError> {
    /// Wrapped error from the HAL.
    Wrapped(TIoError),
    /// Invalid argument was provided.
    InvalidArgument,
    /// The sensor did not send a complete frame before the response timeout.
    NoResponse,
    /// A frame was received but did not start with the SeeLevel preamble. Usually bus noise or a
    /// sensor that is not on the bus.
    PreambleInvalid,
    /// A frame was received but was corrupted in transmission.
    ChecksumMismatch,
}

impl<TIoError> From<TIoError> for Error<TIoError> {
    fn from(error: TIoError) -> Error<TIoError> {
        Error::Wrapped(error)
    }
}

impl<TIoError> Error<TIoError> {
    fn from_frame_error(error: FrameError) -> Error<TIoError> {
        match error {
            FrameError::NoResponse => Error::NoResponse,
            FrameError::PreambleInvalid => Error::PreambleInvalid,
            FrameError::ChecksumMismatch => Error::ChecksumMismatch,
        }
    }
}

/// Running totals of failed reads, by kind.
///
/// Counts only ever increase. Pass the same counters to every read to observe failure rates across
/// sensors, and replace them to start over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorCounters {
    no_response: u32,
    preamble_invalid: u32,
    checksum_mismatch: u32,
}

impl ErrorCounters {
    pub const fn new() -> ErrorCounters {
        ErrorCounters {
            no_response: 0,
            preamble_invalid: 0,
            checksum_mismatch: 0,
        }
    }

    pub fn no_response(&self) -> u32 {
        self.no_response
    }

    pub fn preamble_invalid(&self) -> u32 {
        self.preamble_invalid
    }

    pub fn checksum_mismatch(&self) -> u32 {
        self.checksum_mismatch
    }

    /// The number of failed reads of any kind.
    pub fn total(&self) -> u32 {
        self.no_response
            .saturating_add(self.preamble_invalid)
            .saturating_add(self.checksum_mismatch)
    }

    fn record(&mut self, error: FrameError) {
        let counter = match error {
            FrameError::NoResponse => &mut self.no_response,
            FrameError::PreambleInvalid => &mut self.preamble_invalid,
            FrameError::ChecksumMismatch => &mut self.checksum_mismatch,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Options to modify the timing of the SeeLevel driver.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// How long the bus is pulled low for each addressing pulse.
    pub select_off_hold: Duration,
    /// How long the bus is held high after each addressing pulse.
    pub select_on_hold: Duration,
    /// How long to wait after powering the bus before addressing a sensor.
    pub power_up_hold: Duration,
    /// How long to keep the bus powered after the last read.
    pub power_down_hold: Duration,
    /// The longest the driver will wait for any edge of the sensor's response before giving up
    /// with [`Error::NoResponse`].
    pub response_timeout: Duration,
}

pub const DEFAULT_OPTIONS: Options = Options {
    select_off_hold: Duration::from_micros(60),
    select_on_hold: Duration::from_micros(180),
    power_up_hold: Duration::from_micros(1_800),
    power_down_hold: Duration::from_millis(1),
    response_timeout: pulse::DEFAULT_RESPONSE_TIMEOUT,
};

/// `duration` in whole microseconds, if it fits the delay API.
fn hold_micros(duration: Duration) -> Option<u32> {
    u32::try_from(duration.as_micros()).ok()
}

/// A bus of daisy-chained SeeLevel tank sensors.
///
/// The output pin powers the bus and addresses sensors; the input pin carries their responses.
#[derive(Debug)]
pub struct SeeLevel<TInputPin, TOutputPin, TimeFn, ElapsedFn, TTime>
where
    TimeFn: Fn() -> TTime,
    ElapsedFn: Fn(TTime) -> Duration,
    TTime: Copy,
{
    input_pin: TInputPin,
    output_pin: TOutputPin,
    time_fn: TimeFn,
    elapsed_since_fn: ElapsedFn,
    options: Options,
    phantom_time: core::marker::PhantomData<TTime>,
}

impl<TInputPin, TOutputPin, TError, TimeFn, ElapsedFn, TTime>
    SeeLevel<TInputPin, TOutputPin, TimeFn, ElapsedFn, TTime>
where
    TInputPin: InputPin<Error = TError>,
    TOutputPin: OutputPin<Error = TError>,
    TError: core::fmt::Debug,
    TimeFn: Fn() -> TTime,
    ElapsedFn: Fn(TTime) -> Duration,
    TTime: Copy,
{
    /// Constructs a SeeLevel bus, and de-selects all sensors on it.
    ///
    /// If `options` is `None`, [`DEFAULT_OPTIONS`] are used. Options with a zero response timeout,
    /// zero addressing holds, or any hold longer than `u32::MAX` microseconds are rejected with
    /// [`Error::InvalidArgument`].
    ///
    /// The provided `time_fn` closure should provide some representation of a given instant that
    /// can be used with `elapsed_since_fn` to determine how much time has passed since then. Unlike
    /// most sensors, this needs microsecond precision or better, since bits differ by only a few
    /// tens of microseconds. For a wrapping `u32` microsecond counter, see
    /// [`micros_between`](pulse::micros_between).
    pub fn new(
        input_pin: TInputPin,
        mut output_pin: TOutputPin,
        time_fn: TimeFn,
        elapsed_since_fn: ElapsedFn,
        options: Option<Options>,
    ) -> Result<SeeLevel<TInputPin, TOutputPin, TimeFn, ElapsedFn, TTime>, Error<TError>> {
        let options = options.unwrap_or(DEFAULT_OPTIONS);
        if options.response_timeout == Duration::from_secs(0)
            || options.select_off_hold == Duration::from_secs(0)
            || options.select_on_hold == Duration::from_secs(0)
        {
            return Err(Error::InvalidArgument);
        }
        let holds = [
            options.select_off_hold,
            options.select_on_hold,
            options.power_up_hold,
            options.power_down_hold,
        ];
        if holds.iter().any(|hold| hold_micros(*hold).is_none()) {
            return Err(Error::InvalidArgument);
        }

        output_pin.set_low()?;
        Ok(SeeLevel {
            input_pin,
            output_pin,
            time_fn,
            elapsed_since_fn,
            options,
            phantom_time: core::marker::PhantomData,
        })
    }

    /// Powers the bus and waits for the sensors to start.
    pub fn power_up<TDelay: DelayNs>(&mut self, delay: &mut TDelay) -> Result<(), Error<TError>> {
        self.output_pin.set_high()?;
        delay.delay_us(hold_micros(self.options.power_up_hold).unwrap_or(u32::MAX));
        Ok(())
    }

    /// Removes power from the bus after a short hold.
    pub fn power_down<TDelay: DelayNs>(
        &mut self,
        delay: &mut TDelay,
    ) -> Result<(), Error<TError>> {
        delay.delay_us(hold_micros(self.options.power_down_hold).unwrap_or(u32::MAX));
        self.output_pin.set_low()?;
        Ok(())
    }

    /// Addresses the `sensor_id`th sensor on the chain (from 0) by pulsing the bus
    /// `sensor_id + 1` times. The bus must already be powered.
    pub fn select<TDelay: DelayNs>(
        &mut self,
        sensor_id: u8,
        delay: &mut TDelay,
    ) -> Result<(), Error<TError>> {
        let off_us = hold_micros(self.options.select_off_hold).unwrap_or(u32::MAX);
        let on_us = hold_micros(self.options.select_on_hold).unwrap_or(u32::MAX);
        for _ in 0..=sensor_id {
            self.output_pin.set_low()?;
            delay.delay_us(off_us);
            self.output_pin.set_high()?;
            delay.delay_us(on_us);
        }
        Ok(())
    }

    /// Reads the fill percentage of one tank. The bus must already be powered.
    ///
    /// Uses the calibration from `calibrations` for this sensor if there is one, or estimates the
    /// level from the tank geometry if not (see [`level`](level::level)). Protocol failures
    /// are also counted in `counters`; pin errors are not.
    ///
    /// Due to the tight timing necessary to distinguish bits in the response, this performs
    /// blocking I/O reads without yielding while receiving data. A silent bus returns
    /// [`Error::NoResponse`] once the response timeout has passed.
    pub fn read<TDelay, TCalibrations>(
        &mut self,
        sensor_id: u8,
        calibrations: &TCalibrations,
        counters: &mut ErrorCounters,
        delay: &mut TDelay,
    ) -> Result<f32, Error<TError>>
    where
        TDelay: DelayNs,
        TCalibrations: CalibrationTable + ?Sized,
    {
        self.select(sensor_id, delay)?;
        let pulses = pulse::capture(
            &mut self.input_pin,
            PULSES_PER_FRAME,
            self.options.response_timeout,
            &self.time_fn,
            &self.elapsed_since_fn,
        )?;
        debug!(
            "sensor {}: captured {}/{} pulses",
            sensor_id,
            pulses.len(),
            PULSES_PER_FRAME
        );

        let bytes = pulse::decode_bytes(&pulses);
        let segments = match frame::validate(&bytes) {
            Ok(segments) => segments,
            Err(err) => {
                warn!("sensor {}: bad response {:?}: {:02X?}", sensor_id, err, &bytes[..]);
                counters.record(err);
                return Err(Error::from_frame_error(err));
            }
        };

        let level = level::level(&segments, calibrations.get(sensor_id));
        debug!(
            "sensor {}: segments {:?}, level {:.1}%",
            sensor_id,
            &segments[..],
            level
        );
        Ok(level)
    }

    /// Like [`read`](Self::read), but reports any failure as [`NO_READING`].
    pub fn read_tank_level<TDelay, TCalibrations>(
        &mut self,
        sensor_id: u8,
        calibrations: &TCalibrations,
        counters: &mut ErrorCounters,
        delay: &mut TDelay,
    ) -> f32
    where
        TDelay: DelayNs,
        TCalibrations: CalibrationTable + ?Sized,
    {
        match self.read(sensor_id, calibrations, counters, delay) {
            Ok(level) => level,
            Err(Error::Wrapped(err)) => {
                warn!("sensor {}: pin error {:?}", sensor_id, err);
                NO_READING
            }
            Err(_) => NO_READING,
        }
    }

    /// Powers the bus, reads one tank, and powers the bus down again.
    ///
    /// The bus is powered down even if the read fails.
    pub fn read_powered<TDelay, TCalibrations>(
        &mut self,
        sensor_id: u8,
        calibrations: &TCalibrations,
        counters: &mut ErrorCounters,
        delay: &mut TDelay,
    ) -> Result<f32, Error<TError>>
    where
        TDelay: DelayNs,
        TCalibrations: CalibrationTable + ?Sized,
    {
        self.power_up(delay)?;
        let result = self.read(sensor_id, calibrations, counters, delay);
        self.power_down(delay)?;
        result
    }

    /// Releases the bus pins.
    pub fn release(self) -> (TInputPin, TOutputPin) {
        (self.input_pin, self.output_pin)
    }
}
