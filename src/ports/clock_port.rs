//! Source of "today" for the engine.

use chrono::NaiveDate;

pub trait ClockPort {
    fn today(&self) -> NaiveDate;
}
