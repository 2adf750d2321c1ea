//! Staff shift roster.
//!
//! A thin query/update layer over the `shifts` collection: the roster is
//! small (one bakery), so it is fetched whole and ordered by the shift's
//! time range.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::PosError;
use crate::models::{map_row, map_rows, Shift, ShiftStatus};
use crate::store::{Filter, SelectQuery, Store};

pub async fn list_shifts(store: &dyn Store) -> Result<Vec<Shift>, PosError> {
    let rows = store
        .select("shifts", SelectQuery::new().order_asc("time"))
        .await?;
    map_rows("shift", rows)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftInput {
    #[serde(default, alias = "shift_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub status: Option<ShiftStatus>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Create or update a roster entry.
pub async fn save_shift(store: &dyn Store, input: ShiftInput) -> Result<Shift, PosError> {
    let name = input.name.trim().to_string();
    let time = input.time.trim().to_string();
    if name.is_empty() || time.is_empty() {
        return Err(PosError::validation("Vui lòng nhập tên và khung giờ"));
    }
    let status = input.status.unwrap_or(ShiftStatus::Upcoming);

    if let Some(id) = input.id.as_deref().filter(|s| !s.trim().is_empty()) {
        let updated = store
            .update(
                "shifts",
                vec![Filter::eq("id", id)],
                serde_json::json!({
                    "name": name,
                    "role": input.role,
                    "time": time,
                    "status": status,
                    "image": input.image.unwrap_or_default(),
                }),
            )
            .await?;
        return match updated.into_iter().next() {
            Some(row) => map_row("shift", row),
            None => Err(PosError::validation("Không tìm thấy ca làm")),
        };
    }

    let shift = Shift {
        id: Uuid::new_v4().to_string(),
        name,
        role: input.role,
        time,
        status,
        image: input.image.unwrap_or_default(),
    };
    let created = store
        .insert(
            "shifts",
            serde_json::to_value(&shift).map_err(|e| PosError::backend(e.to_string()))?,
        )
        .await?;
    info!(shift_id = %shift.id, "shift created");
    match created.into_iter().next() {
        Some(row) => map_row("shift", row),
        None => Ok(shift),
    }
}

pub async fn delete_shift(store: &dyn Store, shift_id: &str) -> Result<(), PosError> {
    if shift_id.trim().is_empty() {
        return Err(PosError::validation("Missing shift id"));
    }
    store
        .delete("shifts", vec![Filter::eq("id", shift_id)])
        .await?;
    info!(shift_id, "shift deleted");
    Ok(())
}

/// Roster status counts for the header tiles.
pub fn summary_counts(shifts: &[Shift]) -> Value {
    let count = |status: ShiftStatus| shifts.iter().filter(|s| s.status == status).count();
    serde_json::json!({
        "active": count(ShiftStatus::Active),
        "upcoming": count(ShiftStatus::Upcoming),
        "completed": count(ShiftStatus::Completed),
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn shift(id: &str, time: &str, status: ShiftStatus) -> Shift {
        Shift {
            id: id.to_string(),
            name: "Nguyễn Thị Mai".to_string(),
            role: "Thu ngân".to_string(),
            time: time.to_string(),
            status,
            image: String::new(),
        }
    }

    #[tokio::test]
    async fn roster_is_ordered_by_time() {
        let store = MemoryStore::new();
        store.seed(
            "shifts",
            vec![
                serde_json::to_value(shift("s2", "14:00 - 22:00", ShiftStatus::Upcoming)).unwrap(),
                serde_json::to_value(shift("s1", "06:00 - 14:00", ShiftStatus::Active)).unwrap(),
            ],
        );
        let shifts = list_shifts(&store).await.unwrap();
        assert_eq!(shifts[0].id, "s1");
        assert_eq!(shifts[1].id, "s2");
    }

    #[tokio::test]
    async fn save_requires_name_and_time() {
        let store = MemoryStore::new();
        let err = save_shift(
            &store,
            ShiftInput {
                name: "Trần Văn Hùng".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.row_count("shifts"), 0);
    }

    #[tokio::test]
    async fn delete_removes_the_entry() {
        let store = MemoryStore::new();
        store.seed(
            "shifts",
            vec![serde_json::to_value(shift("s1", "06:00 - 12:00", ShiftStatus::Completed)).unwrap()],
        );
        delete_shift(&store, "s1").await.unwrap();
        assert_eq!(store.row_count("shifts"), 0);
    }

    #[test]
    fn summary_counts_by_status() {
        let shifts = vec![
            shift("s1", "06:00 - 14:00", ShiftStatus::Active),
            shift("s2", "14:00 - 22:00", ShiftStatus::Upcoming),
            shift("s3", "06:00 - 12:00", ShiftStatus::Completed),
            shift("s4", "12:00 - 18:00", ShiftStatus::Active),
        ];
        let summary = summary_counts(&shifts);
        assert_eq!(summary["active"], 2);
        assert_eq!(summary["upcoming"], 1);
        assert_eq!(summary["completed"], 1);
    }
}
