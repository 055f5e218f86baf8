use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use music_catalog_server::user::auth::generate_secret;
use music_catalog_server::user::{Sex, TokenIssuer};
use music_catalog_server::{SqliteCatalogStore, SqliteUserStore, UserManager, UserRole};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding catalog.db and user.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a user with the given name and password.
    AddUser {
        username: String,
        password: String,

        /// "user" or "admin".
        #[clap(long, default_value = "user")]
        role: String,

        /// "male", "female" or "other".
        #[clap(long, default_value = "other")]
        sex: String,
    },

    /// Replaces the password of a user.
    SetPassword { username: String, password: String },

    /// Changes the role of a user.
    SetRole { username: String, role: String },

    /// Shows all users with their role.
    ListUsers,

    /// Deletes a user and their favorites.
    DeleteUser { username: String },
}

fn open_user_manager(db_dir: &Path) -> Result<UserManager> {
    let catalog_store = Arc::new(
        SqliteCatalogStore::new(db_dir.join("catalog.db"))
            .with_context(|| format!("Failed to open catalog db in {:?}", db_dir))?,
    );
    let user_store = Arc::new(
        SqliteUserStore::new(db_dir.join("user.db"))
            .with_context(|| format!("Failed to open user db in {:?}", db_dir))?,
    );
    // this tool never hands out tokens
    let tokens = TokenIssuer::new(&generate_secret(), Duration::from_secs(60));
    Ok(UserManager::new(user_store, catalog_store, tokens))
}

fn execute(command: Command, user_manager: &UserManager) -> Result<()> {
    match command {
        Command::AddUser {
            username,
            password,
            role,
            sex,
        } => {
            let role = UserRole::from_str(&role)?;
            let sex = Sex::from_str(&sex)?;
            let user = user_manager.create_user(&username, &password, role, sex)?;
            println!("Created {} {} with id {}", user.role, user.username, user.id);
        }
        Command::SetPassword { username, password } => {
            let user = user_manager.set_password(&username, &password)?;
            println!("Password of {} updated", user.username);
        }
        Command::SetRole { username, role } => {
            let user = user_manager
                .find_by_username(&username)?
                .with_context(|| format!("User {} not found", username))?;
            let user = user_manager.set_role(&user.id, Some(&role))?;
            println!("{} is now {}", user.username, user.role);
        }
        Command::ListUsers => {
            let users = user_manager.list_users()?;
            if users.is_empty() {
                println!("No users");
            }
            for entry in users {
                println!(
                    "{}  {:<24} {:<6} {} favorites",
                    entry.user.id,
                    entry.user.username,
                    entry.user.role,
                    entry.favorites.len()
                );
            }
        }
        Command::DeleteUser { username } => {
            let user = user_manager.delete_user_by_username(&username)?;
            println!("Deleted {} ({})", user.username, user.id);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let user_manager = open_user_manager(&cli_args.db_dir)?;
    execute(cli_args.command, &user_manager)
}
