use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::RecordKey,
    protocol::{AttendanceRecord, Birthday, Employee, Holiday, Leave},
};

/// A row held by a list view. The shape belongs to the caller; the view only
/// needs a stable key and a JSON round trip for patching.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn key(&self) -> RecordKey;
}

impl Record for Employee {
    fn key(&self) -> RecordKey {
        self.id.into()
    }
}

impl Record for Leave {
    fn key(&self) -> RecordKey {
        self.id.into()
    }
}

impl Record for AttendanceRecord {
    fn key(&self) -> RecordKey {
        self.id.into()
    }
}

impl Record for Holiday {
    fn key(&self) -> RecordKey {
        self.id.into()
    }
}

impl Record for Birthday {
    fn key(&self) -> RecordKey {
        self.id.into()
    }
}

/// Shallow-merges the object fields of each patch over `record`, in order.
pub fn merge_fields<R: Record>(record: &R, patches: &[&Value]) -> Result<R, serde_json::Error> {
    let mut merged = serde_json::to_value(record)?;
    if let Value::Object(target) = &mut merged {
        for patch in patches {
            if let Value::Object(fields) = patch {
                for (name, value) in fields {
                    target.insert(name.clone(), value.clone());
                }
            }
        }
    }
    serde_json::from_value(merged)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared::domain::{EmployeeId, LeaveDayType, LeaveId, LeaveStatus, LeaveType};

    use super::*;

    fn leave() -> Leave {
        Leave {
            id: LeaveId(7),
            date: "2024-03-01".parse().expect("date"),
            leave_type: LeaveType::Casual,
            status: LeaveStatus::Pending,
            reason: "family".into(),
            leave_day_type: LeaveDayType::FullDay,
        }
    }

    #[test]
    fn keys_come_from_ids() {
        assert_eq!(leave().key(), RecordKey::Int(7));
        let employee: Employee =
            serde_json::from_value(json!({"id": 3, "username": "asha"})).expect("employee");
        assert_eq!(employee.key(), EmployeeId(3).into());
    }

    #[test]
    fn later_patches_win() {
        let first = json!({"status": "Approved"});
        let second = json!({"status": "Rejected", "reason": "overlap"});
        let merged = merge_fields(&leave(), &[&first, &second]).expect("merge");
        assert_eq!(merged.status, LeaveStatus::Rejected);
        assert_eq!(merged.reason, "overlap");
        assert_eq!(merged.id, LeaveId(7));
    }

    #[test]
    fn non_object_patches_are_ignored() {
        let merged = merge_fields(&leave(), &[&Value::Null, &json!([1, 2])]).expect("merge");
        assert_eq!(merged, leave());
    }
}
