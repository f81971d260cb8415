use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "vanish",
    about = "Encrypt and store short-lived secrets",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encrypt a payload and store it as a new secret.
    Save {
        /// Plaintext to protect; multiple words are joined with spaces.
        #[arg(required = true)]
        payload: Vec<String>,
        /// Lifetime in minutes (defaults to the configured TTL).
        #[arg(long)]
        ttl: Option<u32>,
        /// Organisation scope (defaults to the configured organisation).
        #[arg(long = "org")]
        organisation: Option<String>,
    },
    /// Print version and exit.
    Version,
    /// Round-trip a probe value through the encrypted store.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
