use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::{Pet, User};

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, name, role) VALUES (?1, ?2, ?3)",
        params![user.id, user.name, user.role.as_str()],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, role FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, name, role)) => Ok(Some(User {
            id,
            name,
            role: Role::from_str(&role)?,
        })),
        None => Ok(None),
    }
}

pub fn insert_pet(conn: &Connection, pet: &Pet) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pets (id, name, species, owner_id) VALUES (?1, ?2, ?3, ?4)",
        params![pet.id, pet.name, pet.species, pet.owner_id],
    )?;
    Ok(())
}

pub fn get_pet(conn: &Connection, id: &str) -> Result<Option<Pet>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, species, owner_id FROM pets WHERE id = ?1",
        params![id],
        |row| {
            Ok(Pet {
                id: row.get(0)?,
                name: row.get(1)?,
                species: row.get(2)?,
                owner_id: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}
