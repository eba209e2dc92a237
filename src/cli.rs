//! Migration runner CLI.
//!
//! Online commands connect to the configured database; `--sql` switches
//! upgrade/downgrade into offline mode and prints the DDL script instead.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::pool;
use crate::schema::{list_tables, MigrationRunner, SchemaRegistry};

#[derive(Parser)]
#[command(name = "tagflow-store")]
#[command(author, version, about = "TagFlow schema and migration tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending schema revisions.
    Upgrade {
        /// Target revision (defaults to the latest).
        #[arg(short, long)]
        revision: Option<String>,

        /// Print the DDL script instead of executing it.
        #[arg(long)]
        sql: bool,
    },

    /// Roll back applied schema revisions.
    Downgrade {
        /// Target revision to keep, or "base" to remove every table.
        #[arg(short, long)]
        revision: String,

        /// Print the DDL script instead of executing it.
        #[arg(long)]
        sql: bool,
    },

    /// Show the latest applied revision.
    Current,

    /// Show the revision history with applied markers.
    History,

    /// List deployed tables.
    Tables,

    /// Verify database connectivity.
    Check,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let registry = SchemaRegistry::new();
        let runner = MigrationRunner::new(&registry)?;

        match self.command {
            Commands::Upgrade { revision, sql } => {
                if sql {
                    print!("{}", runner.upgrade_script(revision.as_deref())?);
                    return Ok(());
                }

                let pool = pool::connect(&Config::from_env()?).await?;
                let applied = runner.upgrade(&pool, revision.as_deref()).await?;
                println!("Applied {} revision(s)", applied);
            }

            Commands::Downgrade { revision, sql } => {
                let target = if revision == "base" {
                    None
                } else {
                    Some(revision.as_str())
                };

                if sql {
                    print!("{}", runner.downgrade_script(target)?);
                    return Ok(());
                }

                let pool = pool::connect(&Config::from_env()?).await?;
                let reverted = runner.downgrade(&pool, target).await?;
                println!("Reverted {} revision(s)", reverted);
            }

            Commands::Current => {
                let pool = pool::connect(&Config::from_env()?).await?;
                match runner.current_revision(&pool).await? {
                    Some(revision) => println!("{}", revision),
                    None => println!("empty"),
                }
            }

            Commands::History => {
                let pool = pool::connect(&Config::from_env()?).await?;
                let applied = runner.applied_revisions(&pool).await?;

                for revision in runner.history() {
                    let marker = if applied.iter().any(|a| a.revision == revision.id) {
                        "[applied]"
                    } else {
                        "[pending]"
                    };
                    println!("{} {} {}", revision.id, marker, revision.title);
                }
            }

            Commands::Tables => {
                let pool = pool::connect(&Config::from_env()?).await?;
                for table in list_tables(&pool).await? {
                    println!("{}", table);
                }
            }

            Commands::Check => {
                let config = Config::from_env()?;
                match pool::connect(&config).await {
                    Ok(_) => println!("Database connection successful"),
                    Err(e) => anyhow::bail!("Error connecting to the database: {}", e),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upgrade_offline() {
        let cli = Cli::try_parse_from(["tagflow-store", "upgrade", "--sql"]).unwrap();
        match cli.command {
            Commands::Upgrade { revision, sql } => {
                assert!(revision.is_none());
                assert!(sql);
            }
            _ => panic!("expected upgrade"),
        }
    }

    #[test]
    fn test_parse_downgrade_requires_revision() {
        assert!(Cli::try_parse_from(["tagflow-store", "downgrade"]).is_err());

        let cli =
            Cli::try_parse_from(["tagflow-store", "downgrade", "--revision", "base"]).unwrap();
        match cli.command {
            Commands::Downgrade { revision, sql } => {
                assert_eq!(revision, "base");
                assert!(!sql);
            }
            _ => panic!("expected downgrade"),
        }
    }
}
