//! Operator toggles read by the interception rules.

use std::str::FromStr;

/// Fixed times of day the operator can pin the client to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Day,
    Night,
}

impl TimeOfDay {
    /// World time, in ticks, used for this time of day.
    pub fn ticks(self) -> i32 {
        match self {
            Self::Day => 6000,
            Self::Night => 18000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "night" => Ok(Self::Night),
            _ => Err(()),
        }
    }
}

/// The operator's switches. Only the command interpreter changes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modes {
    /// Record every relayed message.
    pub logging: bool,
    /// Compute proximity alerts for tracked players.
    pub radar: bool,
    /// Overwrite server time updates with `forced_time`.
    pub time_override: bool,
    /// World time pushed to the client while `time_override` is on.
    pub forced_time: i32,
    /// Apply buff effects whenever the local player's health drops low.
    pub low_health_effects: bool,
}

impl Modes {
    /// The forced time, if the override is on.
    pub fn forced_time(&self) -> Option<i32> {
        self.time_override.then_some(self.forced_time)
    }

    /// Pins the client's time of day.
    pub fn force_time(&mut self, time: TimeOfDay) {
        self.time_override = true;
        self.forced_time = time.ticks();
    }
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            logging: false,
            radar: false,
            time_override: false,
            forced_time: TimeOfDay::Night.ticks(),
            low_health_effects: false,
        }
    }
}
