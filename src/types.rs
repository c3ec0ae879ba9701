use crate::schema::{customers, services, staff};
use crate::status::AppointmentStatus;
use chrono::NaiveDate;
use diesel::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

lazy_static! {
    static ref TIME_REGEX: Regex = Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap();
}

/// Wall-clock start time within a single day, stored as minutes since midnight.
///
/// Crosses the HTTP and snapshot boundaries as a 24-hour `"HH:MM"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MINUTES_PER_DAY: i32 = 24 * 60;

    pub fn from_minutes(minutes: i32) -> Option<Self> {
        if (0..Self::MINUTES_PER_DAY).contains(&minutes) {
            Some(Self(minutes as u16))
        } else {
            None
        }
    }

    pub fn from_hm(hours: u32, minutes: u32) -> Option<Self> {
        if hours >= 24 || minutes >= 60 {
            return None;
        }
        Some(Self((hours * 60 + minutes) as u16))
    }

    pub fn minutes(self) -> i32 {
        i32::from(self.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = TIME_REGEX
            .captures(value.trim())
            .ok_or_else(|| format!("'{value}' is not a HH:MM time"))?;
        let hours: u32 = captures[1]
            .parse()
            .map_err(|_| format!("'{value}' has an invalid hour"))?;
        let minutes: u32 = captures[2]
            .parse()
            .map_err(|_| format!("'{value}' has an invalid minute"))?;
        Self::from_hm(hours, minutes).ok_or_else(|| format!("'{value}' is outside of a day"))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        time.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl Appointment {
    pub fn start_minutes(&self) -> i32 {
        self.time.minutes()
    }

    /// Exclusive end of the booked interval.
    pub fn end_minutes(&self) -> i32 {
        self.start_minutes() + self.duration_minutes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = customers)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = staff)]
pub struct Staff {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = services)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub duration_minutes: i32,
}
