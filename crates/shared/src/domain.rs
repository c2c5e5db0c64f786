use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<$name> for RecordKey {
            fn from(value: $name) -> Self {
                RecordKey::Int(value.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Identity of a record inside a remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Int(value) => write!(f, "{value}"),
            RecordKey::Str(value) => f.write_str(value),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        RecordKey::Int(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        RecordKey::Str(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        RecordKey::Str(value)
    }
}

id_newtype!(EmployeeId);
id_newtype!(LeaveId);
id_newtype!(AttendanceId);
id_newtype!(HolidayId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "Pending",
            LeaveStatus::Approved => "Approved",
            LeaveStatus::Rejected => "Rejected",
        }
    }

    /// Approved and Rejected are final; a leave in either state is never reviewed again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::Rejected)
    }

    pub fn allows_review(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveType {
    Casual,
    Sick,
    Unpaid,
    Paid,
}

impl LeaveType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "casual" => Some(LeaveType::Casual),
            "sick" => Some(LeaveType::Sick),
            "unpaid" => Some(LeaveType::Unpaid),
            "paid" => Some(LeaveType::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LeaveDayType {
    #[default]
    #[serde(rename = "Full_Day")]
    FullDay,
    #[serde(rename = "Half_Day")]
    HalfDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    Employee,
}

impl Role {
    pub fn from_is_staff(is_staff: bool) -> Self {
        if is_staff {
            Role::Admin
        } else {
            Role::Employee
        }
    }
}

/// Clock actions on the daily log, each posted to its own endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogAction {
    CheckIn,
    BreakIn,
    BreakOut,
    CheckOut,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::CheckIn => "checkin",
            LogAction::BreakIn => "breakin",
            LogAction::BreakOut => "breakout",
            LogAction::CheckOut => "checkout",
        }
    }

    pub fn path(&self) -> String {
        format!("{}/", self.as_str())
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
