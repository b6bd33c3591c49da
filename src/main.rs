//! fagri-access - identity and access for the FAGRI certification platform

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fagri_access::{
    auth::{self, AccountRole},
    config::{Args, Command},
    db::{JsonFileAccountStore, ProfileFields},
    events::EventBus,
    flows::{RegistrationFlow, RegistrationPolicy, SignInFlow, SignInPolicy},
    logging::AuditLogger,
    session::SessionStore,
    AccessError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logs go to stderr so command output stays clean on stdout
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("fagri_access={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    debug!("Data dir: {}", args.data_dir.display());
    debug!("Key prefix: {}", args.key_prefix);
    debug!("Session TTL: {}s", args.session_ttl_seconds);
    debug!("Verification: {}", args.verification_mode);

    let events = EventBus::new();
    let audit = start_audit(&args, &events).await?;

    let outcome = execute(&args, events.clone()).await;

    // Closing the bus lets the audit task drain and exit
    drop(events);
    if let Some(handle) = audit {
        let _ = handle.await;
    }
    outcome
}

async fn start_audit(args: &Args, events: &EventBus) -> anyhow::Result<Option<JoinHandle<()>>> {
    let Some(path) = &args.audit_log else {
        return Ok(None);
    };
    let logger = AuditLogger::new(env!("CARGO_PKG_NAME"));
    logger
        .init_file(path)
        .await
        .with_context(|| format!("opening audit log {}", path.display()))?;
    Ok(Some(logger.spawn(events.subscribe())))
}

async fn execute(args: &Args, events: EventBus) -> anyhow::Result<()> {
    let codec = args.codec();

    match &args.command {
        Command::Mint => {
            println!("{}", codec.mint());
        }

        Command::Validate { key: candidate } => {
            let key = codec
                .parse(candidate)
                .map_err(AccessError::from)
                .with_context(|| format!("checking {}", candidate.trim()))?;
            let minted = key
                .minted_at()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            println!("{} is valid (minted {})", key, minted);
        }

        Command::Roles => {
            for role in AccountRole::ALL {
                let granted: Vec<&str> = auth::derive(role).granted().map(|c| c.as_str()).collect();
                println!(
                    "{:<14} {:<22} {}",
                    role.as_str(),
                    role.destination().as_str(),
                    granted.join(", ")
                );
            }
        }

        Command::Register {
            name,
            email,
            phone,
            fields,
            role,
        } => {
            let accounts = JsonFileAccountStore::open(args.accounts_path()).await?;
            let mut profile: ProfileFields = fields.iter().cloned().collect();
            profile.merge(
                ProfileFields::new()
                    .with("name", name)
                    .with("email", email)
                    .with("phone", phone),
            );

            let mut flow = RegistrationFlow::new(codec, RegistrationPolicy::default())
                .with_events(events);
            flow.submit_fields(profile)?;
            flow.begin_role_selection()?;
            flow.select_role(role)?;
            let record = flow.complete(&accounts).await?;

            info!("Account stored in {}", accounts.path().display());
            println!("{}", record.identity_key());
            println!("role: {} -> {}", record.role(), record.role().destination());
        }

        Command::SignIn { role, key } => {
            let accounts = JsonFileAccountStore::open(args.accounts_path()).await?;
            let sessions = session_store(args, events);

            let mut flow = SignInFlow::new(
                codec,
                SignInPolicy::default().with_verification(args.verification_mode),
            );
            flow.select_role(role)?;
            flow.enter_key(key)?;
            let session = flow.submit(&accounts, &sessions).await?;

            if let Some(destination) = session.destination() {
                println!("Signed in; continue to {}", destination);
            }
        }

        Command::SignOut => {
            session_store(args, events).clear();
            println!("Signed out");
        }

        Command::Session => {
            let session = session_store(args, events).check(Utc::now());
            println!("{}", serde_json::to_string_pretty(&session)?);
            if let Some(destination) = session.destination() {
                println!("destination: {}", destination);
            }
        }

        Command::Version => {
            println!(
                "{} {} (commit {}, built {})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
                option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
            );
        }
    }

    Ok(())
}

fn session_store(args: &Args, events: EventBus) -> SessionStore {
    SessionStore::open(args.session_path(), args.session_ttl_seconds).with_events(events)
}
