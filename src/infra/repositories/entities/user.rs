//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::config::ROLE_SEPARATOR;
use crate::domain::User;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password: String,
    pub salt: String,
    /// Comma separated, upper-case role names
    pub roles: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Serialize a role list for the `roles` column.
pub fn join_roles(roles: &[String]) -> String {
    roles.join(&ROLE_SEPARATOR.to_string())
}

/// Parse the `roles` column, skipping empty entries.
pub fn split_roles(column: &str) -> Vec<String> {
    column
        .split(ROLE_SEPARATOR)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convert database model to domain entity
impl From<Model> for User {
    fn from(model: Model) -> Self {
        User::from_stored(
            model.id,
            model.username,
            model.email,
            model.password,
            model.salt,
            model.created_at,
            split_roles(&model.roles),
        )
    }
}
