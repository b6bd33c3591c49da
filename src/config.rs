//! Configuration for fagri-access
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::flows::VerificationMode;
use crate::identity::IdentityKeyCodec;
use crate::session::DEFAULT_SESSION_TTL_SECS;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// fagri-access - identity keys, roles and sessions for the FAGRI platform
#[derive(Parser, Debug, Clone)]
#[command(name = "fagri-access")]
#[command(about = "Identity keys, role permissions and sign-in flows for the FAGRI platform")]
pub struct Args {
    /// Directory holding accounts.json and session.json
    #[arg(long, env = "FAGRI_DATA_DIR", default_value = ".fagri", global = true)]
    pub data_dir: PathBuf,

    /// Identity key prefix
    #[arg(long, env = "FAGRI_KEY_PREFIX", default_value = "FAGRI", global = true)]
    pub key_prefix: String,

    /// Session lifetime in seconds
    #[arg(long, env = "SESSION_TTL_SECONDS", default_value_t = DEFAULT_SESSION_TTL_SECS, global = true)]
    pub session_ttl_seconds: u64,

    /// Sign-in verification (lookup checks the account store, format-only does not)
    #[arg(long, env = "VERIFICATION_MODE", value_enum, default_value_t = VerificationMode::Lookup, global = true)]
    pub verification_mode: VerificationMode,

    /// Append access events as JSONL to this file
    #[arg(long, env = "AUDIT_LOG", global = true)]
    pub audit_log: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed on the command line
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Mint a new identity key
    Mint,

    /// Check whether a key is well formed
    Validate {
        /// Candidate key
        key: String,
    },

    /// List roles with their destinations and granted capabilities
    Roles,

    /// Register an account
    Register {
        /// Full name or organization name
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone: String,

        /// Extra profile field as NAME=VALUE (repeatable)
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Role tag, e.g. fagri-member or corporate
        #[arg(long)]
        role: String,
    },

    /// Sign in with a role and an identity key
    SignIn {
        #[arg(long)]
        role: String,

        #[arg(long)]
        key: String,
    },

    /// Clear the current session
    SignOut,

    /// Show the current session
    Session,

    /// Show build information
    Version,
}

impl Args {
    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn codec(&self) -> IdentityKeyCodec {
        IdentityKeyCodec::new(&self.key_prefix)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.key_prefix.is_empty()
            || !self.key_prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err("FAGRI_KEY_PREFIX must be non-empty and alphanumeric".to_string());
        }

        if self.session_ttl_seconds == 0 {
            return Err("SESSION_TTL_SECONDS must be greater than zero".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "LOG_LEVEL must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            ));
        }

        Ok(())
    }
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}
