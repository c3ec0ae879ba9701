use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Appointment can't change from {from} to {to}")]
pub struct InvalidTransitionError {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
}

impl AppointmentStatus {
    /// `completed` and `cancelled` are final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Scheduled)
    }

    /// Cancelled appointments no longer occupy their slot.
    pub fn holds_slot(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    pub fn transition(self, next: Self) -> Result<Self, InvalidTransitionError> {
        if self.is_terminal() || next == Self::Scheduled {
            return Err(InvalidTransitionError {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("Unknown appointment status '{other}'")),
        }
    }
}
