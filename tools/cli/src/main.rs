//! ResearchHub CLI - operator interface for project membership.
//!
//! This tool drives the membership state machine over a SQLite database,
//! with folder provisioning and access mirroring against the configured
//! storage providers.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use researchhub_common::{Email, ProjectId, Provider, SecretToken, UserId};
use researchhub_credentials::{
    Credential, CredentialResolver, CredentialStore, OAuthRefresher, SqliteCredentialStore,
};
use researchhub_membership::{
    ActivityLog, GlobalRole, MembershipRole, MembershipService, MembershipStatus,
    MembershipStore, SqliteMembershipStore, TracingActivityRecorder, TracingNotifier, User,
    Visibility,
};
use researchhub_mirror::{
    AccessMirror, FolderBrowser, FolderProvisioner, MirrorReport, ProviderOutcome,
};
use researchhub_storage::create_default_registry;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "researchhub")]
#[command(about = "ResearchHub - Project membership and shared folder management")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding the configuration file.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users.
    #[command(subcommand)]
    User(UserCommand),

    /// Manage projects.
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Manage provider credentials.
    #[command(subcommand)]
    Credential(CredentialCommand),

    /// Request to join a project.
    Request {
        #[arg(short, long)]
        project: String,

        /// Requesting user.
        #[arg(short, long)]
        user: String,
    },

    /// Approve a pending membership request.
    Approve {
        #[arg(short, long)]
        project: String,

        /// Member whose request is approved.
        #[arg(short, long)]
        user: String,

        /// User performing the approval.
        #[arg(short, long)]
        actor: String,
    },

    /// Reject a pending membership request.
    Reject {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        actor: String,
    },

    /// Remove an active member.
    Remove {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        actor: String,
    },

    /// Invite users by email as active members.
    Invite {
        #[arg(short, long)]
        project: String,

        /// Role for invited users: pi, co-author or assistant.
        #[arg(short, long, default_value = "co-author")]
        role: String,

        #[arg(short, long)]
        actor: String,

        /// Email addresses to invite.
        #[arg(required = true)]
        emails: Vec<String>,
    },

    /// List project members.
    Members {
        #[arg(short, long)]
        project: String,

        /// Only show rows with this status.
        #[arg(short, long)]
        status: Option<String>,
    },

    /// List files in a project's provider folder.
    Files {
        #[arg(short, long)]
        project: String,

        /// Provider: gdrive or dropbox.
        #[arg(long)]
        provider: String,
    },

    /// Re-apply folder sharing for a member's current status.
    Resync {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register or update a user.
    Add {
        #[arg(long)]
        id: String,

        #[arg(long)]
        email: String,

        /// Grant the global administrator role.
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Create a project and provision its provider folders.
    Create {
        #[arg(short, long)]
        owner: String,

        #[arg(short, long)]
        title: String,

        /// Make the project private.
        #[arg(long)]
        private: bool,
    },
}

#[derive(Subcommand)]
enum CredentialCommand {
    /// Store a user's OAuth tokens for a provider (prompts for the tokens).
    Set {
        #[arg(short, long)]
        user: String,

        /// Provider: gdrive or dropbox.
        #[arg(long)]
        provider: String,

        /// Also prompt for a refresh token.
        #[arg(long)]
        with_refresh: bool,
    },
}

/// Wired-up services over one database.
struct App {
    store: Arc<SqliteMembershipStore>,
    credentials: Arc<SqliteCredentialStore>,
    service: MembershipService,
    mirror: Arc<AccessMirror>,
    provisioner: FolderProvisioner,
    browser: FolderBrowser,
}

impl App {
    fn build(config: &AppConfig) -> Result<Self> {
        let timeout = config.call_timeout();
        let mirror_config = config.mirror();

        let store = Arc::new(
            SqliteMembershipStore::open(&config.database).context("Failed to open database")?,
        );
        let credentials = Arc::new(
            SqliteCredentialStore::open(&config.database)
                .context("Failed to open credential store")?,
        );

        let refresher = Arc::new(
            OAuthRefresher::new(config.oauth.clone(), timeout)
                .context("Failed to configure OAuth clients")?,
        );
        let resolver = CredentialResolver::new(credentials.clone(), refresher, timeout);
        let registry =
            create_default_registry(config.gdrive.clone(), config.dropbox.clone(), timeout)
                .context("Failed to configure storage providers")?;

        let mirror = Arc::new(AccessMirror::new(
            store.clone(),
            store.clone(),
            resolver.clone(),
            registry.clone(),
            mirror_config.clone(),
        ));
        let provisioner = FolderProvisioner::new(
            store.clone(),
            resolver.clone(),
            registry.clone(),
            mirror_config.clone(),
        );
        let browser = FolderBrowser::new(store.clone(), resolver, registry, mirror_config);

        let service = MembershipService::new(
            store.clone(),
            store.clone(),
            Arc::new(TracingNotifier),
            Arc::new(config.email_policy()),
        )
        .with_listener(mirror.clone())
        .with_listener(Arc::new(ActivityLog::new(Arc::new(TracingActivityRecorder))));

        Ok(Self {
            store,
            credentials,
            service,
            mirror,
            provisioner,
            browser,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    let app = App::build(&config)?;

    match cli.command {
        Commands::User(UserCommand::Add { id, email, admin }) => {
            cmd_user_add(&app, &id, &email, admin)
        }

        Commands::Project(ProjectCommand::Create {
            owner,
            title,
            private,
        }) => cmd_project_create(&app, &owner, &title, private).await,

        Commands::Credential(CredentialCommand::Set {
            user,
            provider,
            with_refresh,
        }) => cmd_credential_set(&app, &user, &provider, with_refresh).await,

        Commands::Request { project, user } => cmd_request(&app, &project, &user).await,

        Commands::Approve {
            project,
            user,
            actor,
        } => cmd_decide(&app, Decision::Approve, &project, &user, &actor).await,

        Commands::Reject {
            project,
            user,
            actor,
        } => cmd_decide(&app, Decision::Reject, &project, &user, &actor).await,

        Commands::Remove {
            project,
            user,
            actor,
        } => cmd_decide(&app, Decision::Remove, &project, &user, &actor).await,

        Commands::Invite {
            project,
            role,
            actor,
            emails,
        } => cmd_invite(&app, &project, &role, &actor, &emails).await,

        Commands::Members { project, status } => {
            cmd_members(&app, &project, status.as_deref()).await
        }

        Commands::Files { project, provider } => cmd_files(&app, &project, &provider).await,

        Commands::Resync { project, user } => cmd_resync(&app, &project, &user).await,
    }
}

fn project_id(raw: &str) -> Result<ProjectId> {
    ProjectId::new(raw).context("Invalid project id")
}

fn user_id(raw: &str) -> Result<UserId> {
    UserId::new(raw).context("Invalid user id")
}

fn provider(raw: &str) -> Result<Provider> {
    raw.parse().context("Invalid provider")
}

fn print_report(report: &MirrorReport) {
    if let Some(error) = &report.error {
        println!("  (not attempted: {})", error);
    }
    for entry in &report.providers {
        let status = match &entry.outcome {
            ProviderOutcome::Applied => "done".to_string(),
            ProviderOutcome::AlreadyInSync => "already in sync".to_string(),
            ProviderOutcome::Skipped(reason) => format!("skipped ({:?})", reason),
            ProviderOutcome::Failed(error) => format!("failed: {}", error),
        };
        println!("  {:<8} {}", entry.provider, status);
    }
}

/// Register or update a user.
fn cmd_user_add(app: &App, id: &str, email: &str, admin: bool) -> Result<()> {
    let user = User {
        id: user_id(id)?,
        email: Email::parse(email).context("Invalid email")?,
        role: if admin { GlobalRole::Admin } else { GlobalRole::User },
    };
    app.store.upsert_user(&user).context("Failed to save user")?;

    println!("User saved: {} <{}> ({})", user.id, user.email, user.role.as_str());
    Ok(())
}

/// Create a project, then provision folders on connected providers.
async fn cmd_project_create(app: &App, owner: &str, title: &str, private: bool) -> Result<()> {
    let owner = user_id(owner)?;
    let visibility = if private {
        Visibility::Private
    } else {
        Visibility::Public
    };

    let project = app
        .service
        .create_project(&owner, title, visibility)
        .await
        .context("Failed to create project")?;

    println!("Project created!");
    println!("  ID: {}", project.id);
    println!("  Title: {}", project.title);
    println!("  Owner: {}", project.owner_id);

    let report = app.provisioner.provision(&project).await;
    println!("Folders:");
    print_report(&report);
    for link in app.store.folder_links(&project.id).await? {
        println!("  {:<8} {}", link.provider, link.folder_url);
    }

    Ok(())
}

/// Store OAuth tokens for a user.
async fn cmd_credential_set(app: &App, user: &str, provider_name: &str, with_refresh: bool) -> Result<()> {
    let user = user_id(user)?;
    let provider = provider(provider_name)?;

    let access = rpassword::prompt_password("Access token: ").context("Failed to read token")?;
    if access.trim().is_empty() {
        anyhow::bail!("Access token cannot be empty");
    }

    let refresh = if with_refresh {
        let token =
            rpassword::prompt_password("Refresh token: ").context("Failed to read token")?;
        Some(SecretToken::new(token.trim()))
    } else {
        None
    };

    app.credentials
        .set(
            &user,
            provider,
            Credential::new(SecretToken::new(access.trim()), refresh),
        )
        .await
        .context("Failed to store credential")?;

    info!(user_id = %user, provider = %provider, "Credential stored");
    println!("Credential stored for {} on {}", user, provider);
    Ok(())
}

async fn cmd_request(app: &App, project: &str, user: &str) -> Result<()> {
    let membership = app
        .service
        .request_membership(&project_id(project)?, &user_id(user)?)
        .await
        .context("Membership request failed")?;

    println!(
        "Requested: {} on {} is {}",
        membership.user_id, membership.project_id, membership.status
    );
    Ok(())
}

#[derive(Clone, Copy)]
enum Decision {
    Approve,
    Reject,
    Remove,
}

/// Approve, reject or remove. Mirror failures are logged, not returned.
async fn cmd_decide(app: &App, decision: Decision, project: &str, user: &str, actor: &str) -> Result<()> {
    let project = project_id(project)?;
    let user = user_id(user)?;
    let actor = user_id(actor)?;

    let membership = match decision {
        Decision::Approve => app.service.approve(&project, &user, &actor).await,
        Decision::Reject => app.service.reject(&project, &user, &actor).await,
        Decision::Remove => app.service.remove_member(&project, &user, &actor).await,
    }
    .context("Membership update failed")?;

    println!(
        "{} on {} is now {} ({})",
        membership.user_id, membership.project_id, membership.status, membership.role
    );
    Ok(())
}

async fn cmd_invite(app: &App, project: &str, role: &str, actor: &str, emails: &[String]) -> Result<()> {
    let role: MembershipRole = role.parse().context("Invalid role")?;

    let added = app
        .service
        .invite_members(&project_id(project)?, emails, role, &user_id(actor)?)
        .await
        .context("Invitation failed")?;

    println!("Invited {} of {} address(es) as {}", added, emails.len(), role);
    Ok(())
}

async fn cmd_members(app: &App, project: &str, status: Option<&str>) -> Result<()> {
    let status: Option<MembershipStatus> = status
        .map(|s| s.parse::<MembershipStatus>())
        .transpose()
        .context("Invalid status")?;

    let members = app
        .service
        .list_members(&project_id(project)?, status)
        .await
        .context("Failed to list members")?;

    if members.is_empty() {
        println!("No members.");
    } else {
        for m in members {
            println!(
                "  {:<20} {:<9} {:<10} since {}",
                m.user_id,
                m.status,
                m.role,
                m.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}

async fn cmd_files(app: &App, project: &str, provider_name: &str) -> Result<()> {
    let provider = provider(provider_name)?;
    let files = app
        .browser
        .list_files(&project_id(project)?, provider)
        .await
        .context("Failed to list files")?;

    if files.is_empty() {
        println!("Folder is empty.");
    } else {
        for entry in files {
            if entry.is_folder {
                println!("  [DIR]  {}/", entry.name);
            } else {
                let size_str = entry.size.map(|s| format!("{} bytes", s)).unwrap_or_default();
                println!("  [FILE] {} ({})", entry.name, size_str);
            }
        }
    }
    Ok(())
}

async fn cmd_resync(app: &App, project: &str, user: &str) -> Result<()> {
    match app
        .mirror
        .resync(&project_id(project)?, &user_id(user)?)
        .await
        .context("Resync failed")?
    {
        Some(report) => {
            println!("Resynced {} on {}:", report.user_id, report.project_id);
            print_report(&report);
        }
        None => println!("Membership is pending; nothing to mirror."),
    }
    Ok(())
}
