//! Users command - account administration from the shell.

use crate::cli::args::{UsersAction, UsersArgs};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::Database;
use crate::services::{ServiceContainer, Services};
use crate::types::PaginationParams;

/// Execute the users command
pub async fn execute(args: UsersArgs, config: Config) -> AppResult<()> {
    let db = Database::connect(&config).await?;
    let default_role = config.default_role.clone();
    let services = Services::from_connection(db.get_connection(), config);
    let users = services.users();

    match args.action {
        UsersAction::Create {
            username,
            email,
            password,
            roles,
        } => {
            let mut user = users.create_user(&username, &password, &email)?;
            user.add_role(&default_role);
            for role in &roles {
                user.add_role(role);
            }

            let user = match users.insert(user).await {
                Err(AppError::InvalidForm(fields)) => {
                    for (field, message) in &fields {
                        eprintln!("{}: {}", field, message);
                    }
                    return Err(AppError::InvalidForm(fields));
                }
                other => other?,
            };

            println!(
                "Created user #{} {} <{}> [{}]",
                user.id().unwrap_or_default(),
                user.username(),
                user.email(),
                user.roles().join(", ")
            );
        }
        UsersAction::List { page, per_page } => {
            let params = PaginationParams { page, per_page };
            let (list, total) = users.list_users(&params).await?;

            for user in &list {
                println!(
                    "{:>6}  {:<24} {:<32} {}",
                    user.id().unwrap_or_default(),
                    user.username(),
                    user.email(),
                    user.roles().join(",")
                );
            }
            println!("{} of {} users (page {})", list.len(), total, page);
        }
    }

    Ok(())
}
