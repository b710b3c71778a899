//! OctoCRM CLI
//!
//! Operator commands for bootstrapping admin credentials and API keys.

#![allow(clippy::print_stdout)]

mod keys;

use std::{
    io::{self, BufRead},
    path::PathBuf,
};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use infrastructure::{AppConfig, PasswordHasher};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::keys::{KeyAdmin, render_table};

/// OctoCRM CLI
#[derive(Parser)]
#[command(name = "octocrm-cli")]
#[command(author, version, about = "OctoCRM gateway administration", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash an admin password with Argon2id for the `admin_users` config
    ///
    /// Reads the password from standard input when it is not given, which
    /// keeps it out of shell history.
    /// Example: echo 'hunter2' | octocrm-cli hash-password --email ops@example.com
    HashPassword {
        /// The plaintext password
        password: Option<String>,

        /// Email to place in the printed config snippet
        #[arg(long, default_value = "admin@example.com")]
        email: String,
    },

    /// Manage API keys directly in the database
    Keys {
        /// Path to the SQLite database (defaults to `database.path` from config)
        #[arg(short, long, env = "OCTOCRM_DATABASE_PATH")]
        database: Option<PathBuf>,

        #[command(subcommand)]
        command: KeyCommand,
    },
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Issue a key; the plaintext is printed once
    Issue {
        /// Human-readable name
        #[arg(short, long)]
        name: String,

        /// Granted scope, repeatable (e.g. `--scope leads:read --scope contacts:*`)
        #[arg(short, long = "scope", required = true)]
        scopes: Vec<String>,
    },

    /// List keys, newest first
    List {
        /// Include revoked keys
        #[arg(long)]
        include_revoked: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Revoke a key by id
    Revoke {
        /// Key id (UUID)
        id: String,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Take the password from the argument, or the first line of `input`
fn read_password(arg: Option<String>, input: impl BufRead) -> anyhow::Result<SecretString> {
    let raw = match arg {
        Some(password) => password,
        None => input
            .lines()
            .next()
            .transpose()
            .context("Failed to read password from stdin")?
            .unwrap_or_default(),
    };

    let password = raw.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(SecretString::from(password))
}

/// Config snippet for one admin user
fn admin_user_snippet(email: &str, hash: &str) -> String {
    format!(
        "[[admin_users]]\nid = \"{}\"\nemail = \"{email}\"\ndisplay_name = \"Admin\"\npassword_hash = \"{hash}\"",
        domain::UserId::new()
    )
}

async fn run_keys(database: Option<PathBuf>, command: KeyCommand) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let mut settings = config.database;
    if let Some(path) = database {
        settings.path = path.display().to_string();
    }

    let admin = KeyAdmin::open(&settings).await?;
    let result = match command {
        KeyCommand::Issue { name, scopes } => match admin.issue(&name, &scopes).await {
            Ok(issued) => {
                println!("🔑 Issued API key {}", issued.key.id);
                println!();
                println!("{}", issued.plaintext.expose_secret());
                println!();
                println!("⚠️  Store it now; it cannot be shown again.");
                Ok(())
            },
            Err(e) => Err(anyhow::Error::new(e).context("Failed to issue API key")),
        },
        KeyCommand::List {
            include_revoked,
            json,
        } => match admin.list(include_revoked).await {
            Ok(keys) if json => serde_json::to_string_pretty(&keys)
                .map(|out| println!("{out}"))
                .context("Failed to serialize API keys"),
            Ok(keys) => {
                println!("{}", render_table(&keys));
                Ok(())
            },
            Err(e) => Err(anyhow::Error::new(e).context("Failed to list API keys")),
        },
        KeyCommand::Revoke { id } => admin.revoke(&id).await.map(|revoked| {
            if revoked {
                println!("✅ Revoked {id}");
            } else {
                println!("ℹ️  {id} was already revoked");
            }
        }),
    };

    admin.close().await;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(log_filter_from_verbosity(
            cli.verbose,
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match cli.command {
        Commands::HashPassword { password, email } => {
            let password = read_password(password, io::stdin().lock())?;
            let hash = PasswordHasher::new()
                .hash(password.expose_secret())
                .context("Failed to hash password")?;

            println!("🔐 Password hash (Argon2id):");
            println!();
            println!("{hash}");
            println!();
            println!("📋 Add to config.toml:");
            println!("{}", admin_user_snippet(&email, &hash));
        },

        Commands::Keys { database, command } => run_keys(database, command).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use std::{ffi::OsString, io::Cursor};

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let os_args: Vec<OsString> = args.iter().map(OsString::from).collect();
        Cli::try_parse_from(os_args)
    }

    #[test]
    fn log_filter_verbosity_levels() {
        assert_eq!(log_filter_from_verbosity(0), "warn");
        assert_eq!(log_filter_from_verbosity(1), "info");
        assert_eq!(log_filter_from_verbosity(2), "debug");
        assert_eq!(log_filter_from_verbosity(10), "trace");
    }

    #[test]
    fn parses_repeated_scopes() {
        let cli = parse(&[
            "octocrm-cli",
            "keys",
            "issue",
            "--name",
            "ci",
            "--scope",
            "leads:read",
            "-s",
            "contacts:*",
        ])
        .unwrap();

        let Commands::Keys {
            database,
            command: KeyCommand::Issue { name, scopes },
        } = cli.command
        else {
            panic!("Expected keys issue");
        };
        assert!(database.is_none());
        assert_eq!(name, "ci");
        assert_eq!(scopes, vec!["leads:read", "contacts:*"]);
    }

    #[test]
    fn issue_requires_a_scope() {
        assert!(parse(&["octocrm-cli", "keys", "issue", "--name", "ci"]).is_err());
    }

    #[test]
    fn parses_database_override_and_list_flags() {
        let cli = parse(&[
            "octocrm-cli",
            "keys",
            "--database",
            "/tmp/gw.db",
            "list",
            "--include-revoked",
            "--json",
        ])
        .unwrap();

        let Commands::Keys {
            database,
            command: KeyCommand::List {
                include_revoked,
                json,
            },
        } = cli.command
        else {
            panic!("Expected keys list");
        };
        assert_eq!(database, Some(PathBuf::from("/tmp/gw.db")));
        assert!(include_revoked);
        assert!(json);
    }

    #[test]
    fn parses_revoke_and_hash_password() {
        let cli = parse(&["octocrm-cli", "keys", "revoke", "0190e4b2-0000-7000-8000-000000000000"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Keys {
                command: KeyCommand::Revoke { .. },
                ..
            }
        ));

        let cli = parse(&["octocrm-cli", "hash-password"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::HashPassword { password: None, .. }
        ));
    }

    #[test]
    fn password_from_argument_wins() {
        let password = read_password(Some("hunter2".into()), Cursor::new("ignored\n")).unwrap();
        assert_eq!(password.expose_secret(), "hunter2");
    }

    #[test]
    fn password_from_first_stdin_line() {
        let password = read_password(None, Cursor::new("s3cret pass\r\nsecond\n")).unwrap();
        assert_eq!(password.expose_secret(), "s3cret pass");
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(read_password(None, Cursor::new("")).is_err());
        assert!(read_password(Some(String::new()), Cursor::new("")).is_err());
    }

    #[test]
    fn snippet_contains_hash_and_email() {
        let snippet = admin_user_snippet("ops@example.com", "$argon2id$v=19$abc");
        assert!(snippet.starts_with("[[admin_users]]"));
        assert!(snippet.contains("email = \"ops@example.com\""));
        assert!(snippet.contains("password_hash = \"$argon2id$v=19$abc\""));
    }
}
