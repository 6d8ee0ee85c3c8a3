//! Emergency contact model

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::RowUpdate;
use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyContact {
    pub id: i64,
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub is_primary: bool,
    /// Position in the list; new contacts go last
    pub order: i64,
}

#[derive(Debug, Clone)]
pub struct EmergencyContactCreate {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EmergencyContactUpdate {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
    pub is_primary: Option<bool>,
}

impl EmergencyContact {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            relationship: row.get("relationship")?,
            phone: row.get("phone")?,
            is_primary: row.get::<_, i32>("is_primary")? != 0,
            order: row.get("display_order")?,
        })
    }

    pub fn create(conn: &Connection, data: &EmergencyContactCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO emergency_contacts (name, relationship, phone, is_primary, display_order)
            VALUES (?1, ?2, ?3, ?4, (SELECT COUNT(*) FROM emergency_contacts))
            "#,
            params![data.name, data.relationship, data.phone, data.is_primary as i32],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Emergency contact",
            id,
        })
    }

    /// Insert a record exactly as exported, keeping its id
    pub fn restore(conn: &Connection, contact: &EmergencyContact) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO emergency_contacts (id, name, relationship, phone, is_primary, display_order)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                contact.id,
                contact.name,
                contact.relationship,
                contact.phone,
                contact.is_primary as i32,
                contact.order,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let contact = conn
            .query_row(
                "SELECT * FROM emergency_contacts WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(contact)
    }

    /// All contacts in display order
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM emergency_contacts ORDER BY display_order, id")?;
        let contacts = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    pub fn update(
        conn: &Connection,
        id: i64,
        data: &EmergencyContactUpdate,
    ) -> DbResult<Option<Self>> {
        let mut update = RowUpdate::new();
        update.set("name", data.name.clone());
        update.set("relationship", data.relationship.clone());
        update.set("phone", data.phone.clone());
        update.set("is_primary", data.is_primary.map(i32::from));

        update.execute(conn, "emergency_contacts", id)?;
        Self::get_by_id(conn, id)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM emergency_contacts WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn contact(name: &str, is_primary: bool) -> EmergencyContactCreate {
        EmergencyContactCreate {
            name: name.to_string(),
            relationship: "Daughter".to_string(),
            phone: "+355 69 000 0000".to_string(),
            is_primary,
        }
    }

    #[test]
    fn test_new_contacts_are_appended() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        let first = EmergencyContact::create(&conn, &contact("Ana", true)).unwrap();
        let second = EmergencyContact::create(&conn, &contact("Besa", false)).unwrap();
        assert_eq!(first.order, 0);
        assert_eq!(second.order, 1);

        let names: Vec<String> = EmergencyContact::list(&conn)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Besa"]);
    }

    #[test]
    fn test_update_primary_flag() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        let c = EmergencyContact::create(&conn, &contact("Ana", false)).unwrap();
        let update = EmergencyContactUpdate {
            is_primary: Some(true),
            ..Default::default()
        };
        let c = EmergencyContact::update(&conn, c.id, &update).unwrap().unwrap();
        assert!(c.is_primary);
        assert_eq!(c.name, "Ana");
    }
}
