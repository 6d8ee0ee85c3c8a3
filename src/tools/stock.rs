//! Medication stock tools
//!
//! Pill counts per medication with days-left and refill alerts.

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Database;
use crate::models::{Medication, MedicationStock, MedicationStockCreate, MedicationStockUpdate, StockAlert};

/// Stock entry with its derived alert state
#[derive(Debug, Serialize)]
pub struct StockView {
    #[serde(flatten)]
    pub stock: MedicationStock,
    pub days_left: i64,
    pub alert: StockAlert,
    pub needs_refill: bool,
}

impl From<MedicationStock> for StockView {
    fn from(stock: MedicationStock) -> Self {
        Self {
            days_left: stock.days_left(),
            alert: stock.alert(),
            needs_refill: stock.needs_refill(),
            stock,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListStockResponse {
    pub stock: Vec<StockView>,
    pub critical_count: usize,
    pub low_count: usize,
}

/// Start tracking stock for a medication; the name is taken from the medication
pub fn add_stock(
    db: &Database,
    medication_id: i64,
    pills_remaining: i64,
    pills_per_day: f64,
    refill_threshold: i64,
    pharmacy_name: Option<String>,
    pharmacy_phone: Option<String>,
    today: NaiveDate,
) -> Result<StockView, String> {
    if pills_remaining < 0 || refill_threshold < 0 {
        return Err("Pill counts cannot be negative".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let med = Medication::get_by_id(&conn, medication_id)
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| format!("Medication not found with id: {}", medication_id))?;

    let data = MedicationStockCreate {
        medication_id,
        medication_name: med.name,
        pills_remaining,
        pills_per_day,
        refill_threshold,
        last_refill_date: today,
        pharmacy_name,
        pharmacy_phone,
    };
    let stock = MedicationStock::create(&conn, &data)
        .map_err(|e| format!("Failed to add stock: {}", e))?;

    Ok(stock.into())
}

pub fn list_stock(db: &Database) -> Result<ListStockResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let stock: Vec<StockView> = MedicationStock::list(&conn)
        .map_err(|e| format!("Failed to list stock: {}", e))?
        .into_iter()
        .map(StockView::from)
        .collect();

    let critical_count = stock.iter().filter(|s| s.alert == StockAlert::Critical).count();
    let low_count = stock.iter().filter(|s| s.alert == StockAlert::Low).count();

    Ok(ListStockResponse {
        stock,
        critical_count,
        low_count,
    })
}

pub fn update_stock(
    db: &Database,
    id: i64,
    data: MedicationStockUpdate,
) -> Result<StockView, String> {
    if data.pills_remaining.is_some_and(|n| n < 0) || data.refill_threshold.is_some_and(|n| n < 0) {
        return Err("Pill counts cannot be negative".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    MedicationStock::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update stock: {}", e))?
        .map(StockView::from)
        .ok_or_else(|| format!("Stock entry not found with id: {}", id))
}

/// Add a refill to the pill count
pub fn refill(
    db: &Database,
    id: i64,
    pills_added: i64,
    today: NaiveDate,
) -> Result<StockView, String> {
    if pills_added <= 0 {
        return Err(format!("Refill must add at least one pill, got {}", pills_added));
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let stock = MedicationStock::record_refill(&conn, id, pills_added, today)
        .map_err(|e| format!("Failed to record refill: {}", e))?
        .ok_or_else(|| format!("Stock entry not found with id: {}", id))?;

    tracing::info!(id, pills_added, remaining = stock.pills_remaining, "Refill recorded");
    Ok(stock.into())
}

pub fn delete_stock(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    MedicationStock::delete(&conn, id).map_err(|e| format!("Failed to delete stock: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;
    use crate::models::fixtures::daily;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    #[test]
    fn test_alerts_follow_days_left() {
        let (_dir, db) = temp_database();
        let med = db
            .with_conn(|conn| Medication::create(conn, &daily("Madopar", 8, 0)))
            .unwrap();

        let low = add_stock(&db, med.id, 16, 2.0, 10, None, None, today()).unwrap();
        assert_eq!(low.days_left, 8);
        assert_eq!(low.alert, StockAlert::Low);
        assert!(!low.needs_refill);
        assert_eq!(low.stock.medication_name, "Madopar");

        let critical = update_stock(
            &db,
            low.stock.id,
            MedicationStockUpdate {
                pills_remaining: Some(9),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(critical.alert, StockAlert::Critical);
        assert!(critical.needs_refill);
        assert_eq!(list_stock(&db).unwrap().critical_count, 1);

        let refilled = refill(&db, low.stock.id, 60, today()).unwrap();
        assert_eq!(refilled.stock.pills_remaining, 69);
        assert_eq!(refilled.alert, StockAlert::Ok);
    }

    #[test]
    fn test_rejects_bad_input() {
        let (_dir, db) = temp_database();
        assert!(add_stock(&db, 42, 10, 1.0, 5, None, None, today()).is_err());
        assert!(refill(&db, 1, 0, today()).is_err());
        assert!(update_stock(&db, 1, MedicationStockUpdate { pills_remaining: Some(-1), ..Default::default() }).is_err());
    }
}
