use clap::{Parser, Subcommand};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use wildhaven_backend::config::Config;
use wildhaven_backend::helper::identity_helpers::SqliteIdentityProvider;
use wildhaven_backend::setup::{db_setup, seed_data};

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Create the identity and/or content databases.
    Setup { db_type: Option<String> },
    /// Write the sample blog posts and testimonials.
    Seed,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    /// Give an existing user the admin role.
    Grant {
        #[arg(long)]
        email: String,
    },
    /// Remove the admin role from a user.
    Revoke {
        #[arg(long)]
        email: String,
    },
    List,
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env(&cli.env_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load or parse configuration: {}", e);
            std::process::exit(1);
        }
    };

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup { db_type } => match db_type.as_deref() {
                Some("identity") => setup_identity_database(&config),
                Some("content") => setup_content_database(&config),
                Some(other) => eprintln!("❌ Error: Unknown database type '{}'. Use 'identity' or 'content'.", other),
                None => {
                    setup_identity_database(&config);
                    setup_content_database(&config);
                }
            },
            DbAction::Seed => seed_content(&config),
        },
        Commands::Admin { action } => {
            let Some(provider) = open_identity_provider(&config) else {
                return;
            };
            match action {
                AdminAction::Grant { email } => match provider.grant_admin(email) {
                    Ok(user) => println!("✅ '{}' is now an admin.", user.email),
                    Err(e) => eprintln!("❌ Error granting admin role: {}", e),
                },
                AdminAction::Revoke { email } => match provider.revoke_admin(email) {
                    Ok(true) => println!("✅ Admin role removed from '{}'.", email),
                    Ok(false) => println!("ℹ️ '{}' was not an admin.", email),
                    Err(e) => eprintln!("❌ Error revoking admin role: {}", e),
                },
                AdminAction::List => match provider.list_admins() {
                    Ok(admins) => {
                        println!("Listing Admin Users:");
                        for admin in admins {
                            println!("- {} ({})", admin.email, admin.display_name());
                        }
                    }
                    Err(e) => eprintln!("❌ Error fetching admins: {}", e),
                },
            }
        }
    }
}

fn setup_identity_database(config: &Config) {
    let db_path = config.identity_db_path();
    println!("\nSetting up identity database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Could not create database directory: {}", e);
            return;
        }
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Could not open identity database file: {}", e);
            return;
        }
    };
    match db_setup::setup_identity_db(&mut conn) {
        Ok(_) => println!("✅ Identity database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up identity database: {}", e),
    }
}

fn setup_content_database(config: &Config) {
    let db_path = config.content_db_path();
    println!("\nSetting up content database at '{}'...", db_path.display());
    match db_setup::setup_content_db(&db_path) {
        Ok(_) => println!("✅ Content database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up content database: {}", e),
    }
}

fn seed_content(config: &Config) {
    let store = match db_setup::setup_content_db(&config.content_db_path()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("❌ Error opening content database: {}", e);
            return;
        }
    };
    match seed_data::seed(&store) {
        Ok(_) => println!("✅ Sample blog posts and testimonials written."),
        Err(e) => eprintln!("❌ Error seeding content: {}", e),
    }
}

fn open_identity_provider(config: &Config) -> Option<SqliteIdentityProvider> {
    let db_path = config.identity_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Identity database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    let pool = match r2d2::Pool::builder().max_size(1).build(SqliteConnectionManager::file(&db_path)) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("❌ Could not open identity database: {}", e);
            return None;
        }
    };
    Some(SqliteIdentityProvider::new(pool, config.token_ttl()))
}
