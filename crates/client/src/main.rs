//! `warden` command-line client.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use warden_auth::{GateCondition, Permission, catalog, explain};
use warden_client::{
    AdminOperations, ClientConfig, Guard, GuardState, HttpBackend, InMemoryBackend, PermissionBackend,
    PermissionCache, ReferenceData, resolver,
};
use warden_core::UserId;

#[derive(Parser)]
#[command(name = "warden", version, about = "Inspect and administer role-based permissions")]
struct Cli {
    /// Backend base URL (defaults to WARDEN_API_URL, then http://localhost:8080)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, global = true, env = "WARDEN_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Use the built-in in-memory backend instead of HTTP
    #[arg(long, global = true)]
    demo: bool,

    /// Demo only: act as this user
    #[arg(long = "as", global = true, requires = "demo")]
    act_as: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current principal's permissions
    Whoami,
    /// Check tokens against the current principal
    Check {
        #[arg(required = true)]
        tokens: Vec<String>,
        /// Require every token instead of any
        #[arg(long)]
        all: bool,
        /// Ask the backend instead of the local snapshot
        #[arg(long)]
        remote: bool,
    },
    /// Explain why a token is allowed or denied
    Explain { token: String },
    /// Print the role hierarchy
    Roles,
    /// Print the built-in token catalog
    Catalog,
    /// Assign a role to a user
    AssignRole { user: String, role: String },
    /// Grant custom permissions to a user
    Grant {
        user: String,
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Revoke custom permissions from a user
    Revoke {
        user: String,
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Drop all custom permissions of a user
    Reset { user: String },
    /// Assign one role to many users
    BulkAssign {
        role: String,
        #[arg(required = true)]
        users: Vec<String>,
    },
    /// Precheck a role change without applying it
    ValidateRole { user: String, role: String },
    /// Show how a user's permissions are composed
    Analysis { user: String },
}

impl Cli {
    fn backend(&self) -> Result<Arc<dyn PermissionBackend>> {
        if self.demo {
            let backend = InMemoryBackend::demo();
            if let Some(user) = &self.act_as {
                backend.sign_in(&user.parse::<UserId>()?);
            }
            return Ok(Arc::new(backend));
        }

        let mut config = match &self.api_url {
            Some(url) => ClientConfig::new(url.as_str())?,
            None => ClientConfig::from_env()?,
        };
        if let Some(token) = &self.token {
            config = config.with_token(token.as_str());
        }
        tracing::debug!(base_url = %config.base_url, "using HTTP backend");
        Ok(Arc::new(HttpBackend::new(config)?))
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_user(raw: &str) -> Result<UserId> {
    raw.parse::<UserId>().with_context(|| format!("invalid user id '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    warden_observability::init();

    let cli = Cli::parse();

    if let Command::Catalog = cli.command {
        return print_json(&catalog::entries());
    }

    let backend = cli.backend()?;
    let snapshot = resolver::fetch_current(backend.as_ref())
        .await
        .context("failed to resolve permissions for the current session")?;

    let cache = PermissionCache::new(Arc::clone(&backend));
    cache.login_with_snapshot(snapshot);
    let reference = ReferenceData::new(Arc::clone(&backend));
    let admin = AdminOperations::new(cache.clone(), reference.clone());

    match cli.command {
        Command::Catalog => print_json(&catalog::entries())?,
        Command::Whoami => {
            let snapshot = cache.ensure_resolved().await?;
            print_json(&*snapshot)?;
        }
        Command::Check { tokens, all, remote } => {
            let tokens: Vec<Permission> = tokens.into_iter().map(Permission::from).collect();
            if remote {
                if let [token] = tokens.as_slice() {
                    print_json(&backend.check_permission(token).await?)?;
                } else {
                    print_json(&backend.check_any(&tokens).await?)?;
                }
            } else {
                let condition = if all {
                    GateCondition::all_of(tokens.iter().cloned())
                } else {
                    GateCondition::any_of(tokens.iter().cloned())
                };
                let decision = Guard::new(cache.clone(), condition).decide().await;
                let snapshot = cache.ensure_resolved().await?;
                print_json(&json!({
                    "allowed": decision == GuardState::Allowed,
                    "requireAll": all,
                    "matchedPermissions": snapshot.matched(&tokens),
                }))?;
            }
        }
        Command::Explain { token } => {
            let snapshot = cache.ensure_resolved().await?;
            let reference = match reference.load().await {
                Ok(reference) => Some(reference),
                Err(err) => {
                    tracing::warn!(error = %err, "role hierarchy unavailable; no role suggestions");
                    None
                }
            };
            let hierarchy = reference.as_ref().map(|r| &r.hierarchy);
            print_json(&explain(&snapshot, &token, hierarchy))?;
        }
        Command::Roles => {
            let reference = reference.load().await?;
            print_json(&reference.hierarchy)?;
        }
        Command::AssignRole { user, role } => {
            print_json(&admin.assign_role(&parse_user(&user)?, &role).await?)?;
        }
        Command::Grant { user, tokens } => {
            print_json(&admin.grant_permissions(&parse_user(&user)?, tokens).await?)?;
        }
        Command::Revoke { user, tokens } => {
            print_json(&admin.revoke_permissions(&parse_user(&user)?, tokens).await?)?;
        }
        Command::Reset { user } => {
            print_json(&admin.reset_permissions(&parse_user(&user)?).await?)?;
        }
        Command::BulkAssign { role, users } => {
            let users = users.iter().map(|u| parse_user(u)).collect::<Result<Vec<_>>>()?;
            let resp = admin.bulk_assign_role(&users, &role).await?;
            for failure in resp.failed() {
                tracing::warn!(
                    user_id = %failure.user_id,
                    reason = failure.message.as_deref().unwrap_or("unknown"),
                    "role assignment failed"
                );
            }
            print_json(&resp)?;
        }
        Command::ValidateRole { user, role } => {
            print_json(&admin.validate_role_transition(&parse_user(&user)?, &role).await?)?;
        }
        Command::Analysis { user } => {
            print_json(&admin.permission_analysis(&parse_user(&user)?).await?)?;
        }
    }

    Ok(())
}
