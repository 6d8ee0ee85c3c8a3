//! Medication stock model
//!
//! Pill counts per medication with a days-left estimate and refill alerts.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::RowUpdate;
use crate::db::{DbError, DbResult};

const CRITICAL_DAYS: i64 = 5;
const LOW_DAYS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockAlert {
    Critical,
    Low,
    Ok,
}

impl StockAlert {
    pub fn for_days_left(days_left: i64) -> Self {
        if days_left <= CRITICAL_DAYS {
            StockAlert::Critical
        } else if days_left <= LOW_DAYS {
            StockAlert::Low
        } else {
            StockAlert::Ok
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicationStock {
    pub id: i64,
    pub medication_id: i64,
    pub medication_name: String,
    pub pills_remaining: i64,
    pub pills_per_day: f64,
    /// Refill when fewer pills than this remain
    pub refill_threshold: i64,
    pub last_refill_date: NaiveDate,
    pub pharmacy_name: Option<String>,
    pub pharmacy_phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MedicationStockCreate {
    pub medication_id: i64,
    pub medication_name: String,
    pub pills_remaining: i64,
    pub pills_per_day: f64,
    pub refill_threshold: i64,
    pub last_refill_date: NaiveDate,
    pub pharmacy_name: Option<String>,
    pub pharmacy_phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MedicationStockUpdate {
    pub pills_remaining: Option<i64>,
    pub pills_per_day: Option<f64>,
    pub refill_threshold: Option<i64>,
    pub pharmacy_name: Option<String>,
    pub pharmacy_phone: Option<String>,
}

fn check_per_day(pills_per_day: f64) -> DbResult<()> {
    if pills_per_day > 0.0 {
        Ok(())
    } else {
        Err(DbError::InvalidValue(format!(
            "pills per day must be positive, got {}",
            pills_per_day
        )))
    }
}

impl MedicationStock {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            medication_id: row.get("medication_id")?,
            medication_name: row.get("medication_name")?,
            pills_remaining: row.get("pills_remaining")?,
            pills_per_day: row.get("pills_per_day")?,
            refill_threshold: row.get("refill_threshold")?,
            last_refill_date: row.get("last_refill_date")?,
            pharmacy_name: row.get("pharmacy_name")?,
            pharmacy_phone: row.get("pharmacy_phone")?,
        })
    }

    /// Whole days the remaining pills last
    pub fn days_left(&self) -> i64 {
        if self.pills_per_day <= 0.0 {
            return 0;
        }
        (self.pills_remaining.max(0) as f64 / self.pills_per_day).floor() as i64
    }

    pub fn alert(&self) -> StockAlert {
        StockAlert::for_days_left(self.days_left())
    }

    pub fn needs_refill(&self) -> bool {
        self.pills_remaining < self.refill_threshold
    }

    pub fn create(conn: &Connection, data: &MedicationStockCreate) -> DbResult<Self> {
        check_per_day(data.pills_per_day)?;

        conn.execute(
            r#"
            INSERT INTO medication_stock (
                medication_id, medication_name, pills_remaining, pills_per_day,
                refill_threshold, last_refill_date, pharmacy_name, pharmacy_phone
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                data.medication_id,
                data.medication_name,
                data.pills_remaining,
                data.pills_per_day,
                data.refill_threshold,
                data.last_refill_date,
                data.pharmacy_name,
                data.pharmacy_phone,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Medication stock",
            id,
        })
    }

    /// Insert a record exactly as exported, keeping its id
    pub fn restore(conn: &Connection, stock: &MedicationStock) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO medication_stock (
                id, medication_id, medication_name, pills_remaining, pills_per_day,
                refill_threshold, last_refill_date, pharmacy_name, pharmacy_phone
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                stock.id,
                stock.medication_id,
                stock.medication_name,
                stock.pills_remaining,
                stock.pills_per_day,
                stock.refill_threshold,
                stock.last_refill_date,
                stock.pharmacy_name,
                stock.pharmacy_phone,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let stock = conn
            .query_row(
                "SELECT * FROM medication_stock WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(stock)
    }

    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM medication_stock ORDER BY medication_name, id")?;
        let stock = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stock)
    }

    pub fn update(
        conn: &Connection,
        id: i64,
        data: &MedicationStockUpdate,
    ) -> DbResult<Option<Self>> {
        if let Some(per_day) = data.pills_per_day {
            check_per_day(per_day)?;
        }

        let mut update = RowUpdate::new();
        update.set("pills_remaining", data.pills_remaining);
        update.set("pills_per_day", data.pills_per_day);
        update.set("refill_threshold", data.refill_threshold);
        update.set("pharmacy_name", data.pharmacy_name.clone());
        update.set("pharmacy_phone", data.pharmacy_phone.clone());

        update.execute(conn, "medication_stock", id)?;
        Self::get_by_id(conn, id)
    }

    /// Add a refill to the count and stamp the refill date
    pub fn record_refill(
        conn: &Connection,
        id: i64,
        pills_added: i64,
        date: NaiveDate,
    ) -> DbResult<Option<Self>> {
        conn.execute(
            "UPDATE medication_stock SET pills_remaining = pills_remaining + ?2, last_refill_date = ?3 WHERE id = ?1",
            params![id, pills_added, date],
        )?;
        Self::get_by_id(conn, id)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM medication_stock WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn stock(remaining: i64, per_day: f64, threshold: i64) -> MedicationStock {
        MedicationStock {
            pills_remaining: remaining,
            pills_per_day: per_day,
            refill_threshold: threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_days_left_and_alert() {
        assert_eq!(stock(45, 1.5, 0).days_left(), 30);
        assert_eq!(stock(11, 2.0, 0).days_left(), 5);
        assert_eq!(stock(11, 2.0, 0).alert(), StockAlert::Critical);
        assert_eq!(stock(20, 2.0, 0).alert(), StockAlert::Low);
        assert_eq!(stock(28, 1.0, 0).alert(), StockAlert::Ok);
        assert!(stock(6, 1.0, 7).needs_refill());
        assert!(!stock(7, 1.0, 7).needs_refill());
    }

    #[test]
    fn test_refill_adds_pills() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();
        let day = |d| NaiveDate::from_ymd_opt(2026, 7, d).unwrap();

        let item = MedicationStock::create(
            &conn,
            &MedicationStockCreate {
                medication_id: 3,
                medication_name: "Madopar".to_string(),
                pills_remaining: 4,
                pills_per_day: 1.5,
                refill_threshold: 10,
                last_refill_date: day(1),
                pharmacy_name: None,
                pharmacy_phone: None,
            },
        )
        .unwrap();
        assert!(item.needs_refill());

        let item = MedicationStock::record_refill(&conn, item.id, 60, day(5))
            .unwrap()
            .unwrap();
        assert_eq!(item.pills_remaining, 64);
        assert_eq!(item.last_refill_date, day(5));
        assert!(!item.needs_refill());
    }
}
