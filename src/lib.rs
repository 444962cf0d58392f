#![no_std]

/// Driver for a bus of daisy-chained SeeLevel RV tank sensors.
///
/// The sensors share a select line, which powers the bus and addresses one sensor at a time, and
/// a response line that the selected sensor pulses to send a 12-byte frame.
pub mod seelevel;
