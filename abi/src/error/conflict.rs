// Postgres reports exclusion violations on office.bookings as e.g.
// "Key (room_id, timespan)=(12, [\"2024-01-10 09:30:00+00\",\"2024-01-10 09:45:00+00\")) conflicts with existing key (room_id, timespan)=(12, [\"2024-01-10 09:00:00+00\",\"2024-01-10 10:00:00+00\"))."
// and unique violations on the one-active-request index as
// "Key (device_id)=(5) already exists."

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::{collections::HashMap, convert::Infallible, fmt, str::FromStr};

use crate::{DeviceId, RoomId};

lazy_static! {
    static ref WINDOW_RE: Regex = Regex::new(
        r#"\((?P<k1>[a-zA-Z0-9_-]+)\s*,\s*(?P<k2>[a-zA-Z0-9_-]+)\)=\((?P<v1>[a-zA-Z0-9_-]+)\s*,\s*\[(?P<v2>[^\)\]]+)"#
    )
    .unwrap();
    static ref DEVICE_KEY_RE: Regex = Regex::new(r#"\(device_id\)=\((?P<id>-?\d+)\)"#).unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictInfo {
    /// the device already has a request in a non-terminal state
    ActiveDeviceRequest { device_id: DeviceId },
    Booking(BookingConflictInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingConflictInfo {
    Parsed(BookingConflict),
    UnParsed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConflict {
    pub new: BookingWindow,
    pub old: BookingWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingWindow {
    pub room_id: RoomId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ConflictInfo {
    /// Reads the device id out of a unique violation detail.
    pub fn from_active_request_detail(detail: &str) -> Option<Self> {
        let caps = DEVICE_KEY_RE.captures(detail)?;
        let device_id = caps["id"].parse().ok()?;
        Some(Self::ActiveDeviceRequest { device_id })
    }
}

impl fmt::Display for ConflictInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictInfo::ActiveDeviceRequest { device_id } => {
                write!(f, "device {} already has an active request", device_id)
            }
            ConflictInfo::Booking(BookingConflictInfo::Parsed(c)) => write!(
                f,
                "room {} booking [{}, {}) overlaps existing [{}, {})",
                c.new.room_id,
                c.new.start.to_rfc3339(),
                c.new.end.to_rfc3339(),
                c.old.start.to_rfc3339(),
                c.old.end.to_rfc3339()
            ),
            ConflictInfo::Booking(BookingConflictInfo::UnParsed(s)) => f.write_str(s),
        }
    }
}

impl FromStr for BookingConflictInfo {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(conflict) = s.parse() {
            Ok(Self::Parsed(conflict))
        } else {
            Ok(Self::UnParsed(s.to_string()))
        }
    }
}

impl FromStr for BookingConflict {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParsedInfo::from_str(s)?.try_into()
    }
}

impl TryFrom<ParsedInfo> for BookingConflict {
    type Error = ();

    fn try_from(value: ParsedInfo) -> Result<Self, Self::Error> {
        Ok(Self {
            new: value.new.try_into()?,
            old: value.old.try_into()?,
        })
    }
}

impl TryFrom<HashMap<String, String>> for BookingWindow {
    type Error = ();

    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        let timespan_str = value.get("timespan").ok_or(())?.replace('"', "");

        let mut split = timespan_str.splitn(2, ',');
        let start = parse_datetime(split.next().ok_or(())?)?;
        let end = parse_datetime(split.next().ok_or(())?)?;

        Ok(Self {
            room_id: value
                .get("room_id")
                .ok_or(())?
                .parse()
                .map_err(|_| ())?,
            start,
            end,
        })
    }
}

struct ParsedInfo {
    new: HashMap<String, String>,
    old: HashMap<String, String>,
}

impl FromStr for ParsedInfo {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut maps = WINDOW_RE.captures_iter(s).map(|cap| {
            let mut map = HashMap::new();
            map.insert(cap["k1"].to_string(), cap["v1"].to_string());
            map.insert(cap["k2"].to_string(), cap["v2"].to_string());
            map
        });

        match (maps.next(), maps.next(), maps.next()) {
            (Some(new), Some(old), None) => Ok(Self { new, old }),
            _ => Err(()),
        }
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, ()> {
    Ok(DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%#z")
        .map_err(|_| ())?
        .with_timezone(&Utc))
}
