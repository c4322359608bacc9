use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use once_cell::sync::Lazy;
use sea_orm::entity::prelude::*;

/// Stands in for a stored hash when a login names no admin.
static DUMMY_HASH: Lazy<String> =
    Lazy::new(|| hash_password(&uuid::Uuid::new_v4().to_string()).unwrap_or_default());

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "admins")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub password: String,
    pub created_at: DateTime,
}

impl Model {
    /// Constant-outcome check: a malformed stored hash is a mismatch, not an error.
    pub fn check_hash(&self, password: &str) -> bool {
        verify(&self.password, password)
    }
}

/// Runs a full argon2 verification that never succeeds, so a login for an
/// unknown username costs as much as one with a wrong password.
pub fn check_dummy_hash(password: &str) {
    verify(&DUMMY_HASH, password);
}

fn verify(hash: &str, password: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
