//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table group; all public functions are re-exported here.

mod appointment;
mod directory;
mod notification;
mod token;
mod triage;

pub use appointment::*;
pub use directory::*;
pub use notification::*;
pub use token::*;
pub use triage::*;

#[cfg(test)]
pub(crate) mod fixtures {
    use rusqlite::Connection;

    use super::*;
    use crate::models::enums::Role;
    use crate::models::{Pet, User};

    pub const TUTOR: &str = "tutor-1";
    pub const OTHER_TUTOR: &str = "tutor-2";
    pub const VET: &str = "vet-1";
    pub const OTHER_VET: &str = "vet-2";
    pub const ADMIN: &str = "admin-1";
    pub const PET: &str = "pet-1";
    pub const OTHER_PET: &str = "pet-2";

    /// Two tutors, two vets, one admin; PET belongs to TUTOR, OTHER_PET to OTHER_TUTOR.
    pub fn seed_directory(conn: &Connection) {
        for (id, name, role) in [
            (TUTOR, "Ana Souza", Role::Tutor),
            (OTHER_TUTOR, "Bruno Lima", Role::Tutor),
            (VET, "Dra. Carla Mendes", Role::Veterinarian),
            (OTHER_VET, "Dr. Davi Rocha", Role::Veterinarian),
            (ADMIN, "Admin", Role::Admin),
        ] {
            insert_user(
                conn,
                &User {
                    id: id.into(),
                    name: name.into(),
                    role,
                },
            )
            .unwrap();
        }
        insert_pet(
            conn,
            &Pet {
                id: PET.into(),
                name: "Thor".into(),
                species: Some("cachorro".into()),
                owner_id: TUTOR.into(),
            },
        )
        .unwrap();
        insert_pet(
            conn,
            &Pet {
                id: OTHER_PET.into(),
                name: "Mia".into(),
                species: Some("gato".into()),
                owner_id: OTHER_TUTOR.into(),
            },
        )
        .unwrap();
    }
}
