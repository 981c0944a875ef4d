use std::fmt;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

pub const SENDER_NAME_COOKIE: &str = "sender-name";
pub const TIMEZONE_COOKIE: &str = "timezone";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(HandleId);

impl HandleId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Minutes between UTC and local time, `UTC - local`.
///
/// Positive west of Greenwich: UTC+02:00 is `-120`, UTC-05:00 is `300`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimezoneOffset(pub i32);

impl TimezoneOffset {
    pub fn from_fixed_offset(offset: FixedOffset) -> Self {
        Self(offset.utc_minus_local() / 60)
    }

    pub fn minutes(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TimezoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    Granted,
    Denied,
    #[default]
    Default,
}

impl NotificationPermission {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "granted" => Some(Self::Granted),
            "denied" => Some(Self::Denied),
            "default" => Some(Self::Default),
            _ => None,
        }
    }
}
