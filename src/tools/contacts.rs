//! Emergency contact tools

use serde::Serialize;

use super::require_text;
use crate::db::Database;
use crate::models::{EmergencyContact, EmergencyContactCreate, EmergencyContactUpdate};

#[derive(Debug, Serialize)]
pub struct ListContactsResponse {
    pub contacts: Vec<EmergencyContact>,
    pub primary: Option<EmergencyContact>,
}

fn check_phone(phone: &str) -> Result<String, String> {
    let phone = require_text("Phone", phone)?;
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < 3 || !phone.chars().all(|c| c.is_ascii_digit() || "+-() ".contains(c)) {
        return Err(format!("Invalid phone number '{}'", phone));
    }
    Ok(phone)
}

pub fn add_contact(
    db: &Database,
    mut data: EmergencyContactCreate,
) -> Result<EmergencyContact, String> {
    data.name = require_text("Name", &data.name)?;
    data.phone = check_phone(&data.phone)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let contact = EmergencyContact::create(&conn, &data)
        .map_err(|e| format!("Failed to add contact: {}", e))?;

    tracing::info!(id = contact.id, "Emergency contact added");
    Ok(contact)
}

pub fn list_contacts(db: &Database) -> Result<ListContactsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let contacts =
        EmergencyContact::list(&conn).map_err(|e| format!("Failed to list contacts: {}", e))?;
    let primary = contacts.iter().find(|c| c.is_primary).cloned();
    Ok(ListContactsResponse { contacts, primary })
}

pub fn update_contact(
    db: &Database,
    id: i64,
    mut data: EmergencyContactUpdate,
) -> Result<EmergencyContact, String> {
    if let Some(ref name) = data.name {
        data.name = Some(require_text("Name", name)?);
    }
    if let Some(ref phone) = data.phone {
        data.phone = Some(check_phone(phone)?);
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    EmergencyContact::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update contact: {}", e))?
        .ok_or_else(|| format!("Contact not found with id: {}", id))
}

pub fn delete_contact(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    EmergencyContact::delete(&conn, id).map_err(|e| format!("Failed to delete contact: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn contact(name: &str, phone: &str, is_primary: bool) -> EmergencyContactCreate {
        EmergencyContactCreate {
            name: name.to_string(),
            relationship: "Daughter".to_string(),
            phone: phone.to_string(),
            is_primary,
        }
    }

    #[test]
    fn test_contacts_keep_insert_order() {
        let (_dir, db) = temp_database();
        add_contact(&db, contact("Elira", "+355 69 123 4567", false)).unwrap();
        let b = add_contact(&db, contact("Dr. Hoxha", "112", true)).unwrap();

        let listed = list_contacts(&db).unwrap();
        assert_eq!(listed.contacts[0].name, "Elira");
        assert_eq!(listed.primary.unwrap().id, b.id);

        assert!(add_contact(&db, contact("Nobody", "call me", false)).is_err());
        assert!(update_contact(&db, 999, EmergencyContactUpdate::default()).is_err());
        assert!(delete_contact(&db, b.id).unwrap());
    }
}
