use core::time::Duration;
use embedded_hal::digital::InputPin;

/// The number of bytes in every SeeLevel response frame.
pub const FRAME_LEN: usize = 12;
/// The number of low-going pulses that make up a full response frame.
pub const PULSES_PER_FRAME: usize = 8 * FRAME_LEN;

/// Low pulses longer than this many microseconds are decoded as a 1 bit.
pub const ONE_BIT_THRESHOLD_US: u16 = 26;

/// The default bound on how long the capture waits for any single edge.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(10);

// Reading the clock costs about as much as reading the pin, so only check for a timeout every few
// samples.
const WATCHDOG_COUNTS: u32 = 16;

/// Widths of the captured low pulses, in microseconds.
pub type PulseDurations = heapless::Vec<u16, PULSES_PER_FRAME>;

/// Raw bytes decoded from a capture. Empty unless a complete frame was captured.
pub type FrameBytes = heapless::Vec<u8, FRAME_LEN>;

/// Microseconds from `start` to `now` on a free-running `u32` microsecond counter.
///
/// Tolerates a single wraparound of the counter between the two readings.
pub fn micros_between(start: u32, now: u32) -> u32 {
    now.wrapping_sub(start)
}

/// Records the width of up to `num_pulses` low pulses on `input_pin`.
///
/// The sensor holds the line high while idle and between bits; only the low phase carries data,
/// so the high phase is never timed. This spins on the pin without yielding, since the pulses are
/// only a few tens of microseconds wide.
///
/// If the line does not change level within `timeout`, the capture stops and returns the pulses
/// recorded so far. Callers should treat anything shorter than `num_pulses` as no response.
/// `num_pulses` is capped at [`PULSES_PER_FRAME`].
pub fn capture<TInput, TError, TimeFn, ElapsedFn, TTime>(
    input_pin: &mut TInput,
    num_pulses: usize,
    timeout: Duration,
    time_fn: TimeFn,
    elapsed_since_fn: ElapsedFn,
) -> Result<PulseDurations, TError>
where
    TInput: InputPin<Error = TError>,
    TimeFn: Fn() -> TTime,
    ElapsedFn: Fn(TTime) -> Duration,
    TTime: Copy,
{
    let mut durations = PulseDurations::new();
    for _ in 0..num_pulses.min(PULSES_PER_FRAME) {
        let wait_start = time_fn();
        if !wait_while_level(input_pin, true, wait_start, timeout, &elapsed_since_fn)? {
            return Ok(durations);
        }

        let pulse_start = time_fn();
        if !wait_while_level(input_pin, false, pulse_start, timeout, &elapsed_since_fn)? {
            return Ok(durations);
        }
        let width = elapsed_since_fn(pulse_start);

        // The loop is bounded by the capacity, so this never overflows.
        durations.push(saturating_micros(width)).ok();
    }
    Ok(durations)
}

/// Spins while the pin reads `high`. Returns `false` if `timeout` passed first.
#[inline]
fn wait_while_level<TInput, TError, ElapsedFn, TTime>(
    input_pin: &mut TInput,
    high: bool,
    start: TTime,
    timeout: Duration,
    elapsed_since_fn: &ElapsedFn,
) -> Result<bool, TError>
where
    TInput: InputPin<Error = TError>,
    ElapsedFn: Fn(TTime) -> Duration,
    TTime: Copy,
{
    let mut counter = 0u32;
    while input_pin.is_high()? == high {
        counter = counter.wrapping_add(1);
        if counter % WATCHDOG_COUNTS == 0 && elapsed_since_fn(start) > timeout {
            return Ok(false);
        }
    }
    Ok(true)
}

fn saturating_micros(duration: Duration) -> u16 {
    let micros = duration.as_micros();
    if micros > u16::MAX as u128 {
        u16::MAX
    } else {
        micros as u16
    }
}

/// Converts captured pulse widths into frame bytes.
///
/// Returns an empty result unless there is exactly one pulse per bit of a full frame. Bits are
/// sent most-significant first.
pub fn decode_bytes(durations: &[u16]) -> FrameBytes {
    if durations.len() != PULSES_PER_FRAME {
        return FrameBytes::new();
    }

    let mut frame = [0u8; FRAME_LEN];
    for (byte, bit_durations) in frame.iter_mut().zip(durations.chunks_exact(8)) {
        *byte = parse_byte(bit_durations);
    }
    frame.iter().copied().collect()
}

fn parse_byte(bit_durations: &[u16]) -> u8 {
    let mut byte = 0u8;
    for i in 0..8 {
        if bit_durations[i] > ONE_BIT_THRESHOLD_US {
            byte |= 1 << (7 - i);
        }
    }
    return byte;
}
