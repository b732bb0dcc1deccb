//! gitee-issue - Create Gitee issues from the command line
//!
//! Access tokens live in an encrypted SQLite vault under ~/.gitee-issue.
//!
//! Commands:
//! - add: Store a token for owner/repo (first one becomes the default)
//! - list: Show stored repositories
//! - default: Choose the default repository
//! - delete: Remove a repository's tokens
//! - create: Open an issue, filling gaps from the default repository

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use gitee_issue::{Cipher, CredentialStore, IssueClient, NewIssue};
use issue_core::{Config, Paths};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gitee-issue")]
#[command(about = "Gitee issue manager - create issues using tokens from an encrypted local vault")]
#[command(version)]
#[command(after_help = r#"STORAGE:
    Tokens are stored in ~/.gitee-issue/config.db (override the directory
    with GITEE_ISSUE_HOME). API settings are read from config.json in the
    same directory.

LOGGING:
    Set RUST_LOG=debug for diagnostics on stderr."#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an access token for a repository
    Add {
        /// Repository owner (user or organization)
        #[arg(long)]
        owner: String,
        /// Repository name
        #[arg(long)]
        repo: String,
        /// Access token (omit for secure hidden prompt)
        #[arg(long, conflicts_with = "use_default_token")]
        token: Option<String>,
        /// Reuse the token of the current default repository
        #[arg(long)]
        use_default_token: bool,
    },

    /// List stored repositories (tokens hidden)
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Set the default repository
    Default {
        /// Repository name
        #[arg(required_unless_present = "id")]
        repo: Option<String>,
        /// Select by id instead of name (see `list`)
        #[arg(long, conflicts_with = "repo")]
        id: Option<i64>,
    },

    /// Delete all stored tokens for owner/repo
    Delete {
        /// Repository owner
        #[arg(long)]
        owner: String,
        /// Repository name
        #[arg(long)]
        repo: String,
    },

    /// Create an issue
    Create {
        /// Issue title
        #[arg(long)]
        title: String,
        /// Issue body
        #[arg(long)]
        body: Option<String>,
        /// Comma-separated labels
        #[arg(long)]
        labels: Option<String>,
        /// Repository owner (defaults to the default repository's owner)
        #[arg(long)]
        owner: Option<String>,
        /// Repository name (defaults to the default repository)
        #[arg(long)]
        repo: Option<String>,
        /// Access token (defaults to the default repository's token)
        #[arg(long)]
        token: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `list --json` stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = Paths::new();
    let mut store = CredentialStore::open(&paths.database)
        .with_context(|| format!("Failed to open database: {}", paths.database.display()))?;

    let result = match cli.command {
        Some(Commands::Add {
            owner,
            repo,
            token,
            use_default_token,
        }) => cmd_add(&mut store, &owner, &repo, token, use_default_token),
        Some(Commands::List { json }) => cmd_list(&store, json),
        Some(Commands::Default { repo, id }) => cmd_default(&mut store, repo, id),
        Some(Commands::Delete { owner, repo }) => cmd_delete(&mut store, &owner, &repo),
        Some(Commands::Create {
            title,
            body,
            labels,
            owner,
            repo,
            token,
        }) => {
            let config = Config::load(&paths.config)?;
            let issue = NewIssue {
                title,
                body,
                labels,
            };
            cmd_create(&store, &config, &issue, owner, repo, token)
        }
        None => cmd_list(&store, false),
    };

    store.close();
    result
}

/// Store a token
fn cmd_add<C: Cipher>(
    store: &mut CredentialStore<C>,
    owner: &str,
    repo: &str,
    token: Option<String>,
    use_default_token: bool,
) -> Result<()> {
    let token = match token {
        Some(t) => t,
        None if use_default_token => store
            .get_decrypted_default_token()
            .context("Cannot reuse the default token")?,
        None => rpassword::prompt_password("Enter access token: ")
            .context("Failed to read access token")?,
    };

    if token.is_empty() {
        bail!("Empty token not allowed");
    }

    let credential = store
        .add_credential(repo, owner, &token)
        .context("Failed to add repository")?;

    println!("success: Repository added: {}", credential.slug());
    if credential.is_default {
        println!("It is now the default repository.");
    }

    Ok(())
}

/// List stored repositories
fn cmd_list<C: Cipher>(store: &CredentialStore<C>, json: bool) -> Result<()> {
    let credentials = store.list_credentials()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&credentials)?);
        return Ok(());
    }

    if credentials.is_empty() {
        println!("No repositories stored. Add one with: gitee-issue add --owner <OWNER> --repo <REPO>");
        return Ok(());
    }

    println!("Stored Repositories");
    println!();

    for credential in &credentials {
        let marker = if credential.is_default { "*" } else { " " };
        println!("  {} {:>3}) {}", marker, credential.id, credential.slug());
    }

    Ok(())
}

/// Choose the default repository
fn cmd_default<C: Cipher>(
    store: &mut CredentialStore<C>,
    repo: Option<String>,
    id: Option<i64>,
) -> Result<()> {
    if let Some(id) = id {
        store.set_default_by_id(id)?;
        let credential = store
            .get_credential(id)?
            .ok_or_else(|| anyhow!("Repository {} disappeared", id))?;
        println!("success: Default repository set: {}", credential.slug());
        return Ok(());
    }

    let repo = repo.ok_or_else(|| anyhow!("Repository name or --id required"))?;

    // Refuse unknown names here so a typo does not clear the current default
    if !store.list_credentials()?.iter().any(|c| c.repo == repo) {
        bail!("No stored repository named '{}'", repo);
    }

    store.set_default(&repo)?;
    println!("success: Default repository set: {}", repo);

    Ok(())
}

/// Delete a repository's tokens
fn cmd_delete<C: Cipher>(store: &mut CredentialStore<C>, owner: &str, repo: &str) -> Result<()> {
    let had_default = store.get_default_credential()?.is_some();
    let deleted = store.delete_credential(owner, repo)?;

    if deleted == 0 {
        println!("warning: No repository found: {}/{}", owner, repo);
        return Ok(());
    }

    println!("success: Repository deleted: {}/{}", owner, repo);
    if had_default && store.get_default_credential()?.is_none() {
        println!("No default repository is set now. Choose one with: gitee-issue default <REPO>");
    }

    Ok(())
}

/// Fill missing owner, repo and token from the default credential
fn resolve_target<C: Cipher>(
    store: &CredentialStore<C>,
    owner: Option<String>,
    repo: Option<String>,
    token: Option<String>,
) -> Result<(String, String, String)> {
    match (owner, repo, token) {
        (Some(owner), Some(repo), Some(token)) => Ok((owner, repo, token)),
        (owner, repo, token) => {
            let default = store.get_default_credential()?.ok_or_else(|| {
                anyhow!("No default repository config found, and some required fields are missing")
            })?;

            let token = match token {
                Some(t) => t,
                None => store
                    .decrypt_token(&default)
                    .context("Failed to decrypt token")?,
            };

            Ok((
                owner.unwrap_or_else(|| default.owner.clone()),
                repo.unwrap_or_else(|| default.repo.clone()),
                token,
            ))
        }
    }
}

/// Create an issue
fn cmd_create<C: Cipher>(
    store: &CredentialStore<C>,
    config: &Config,
    issue: &NewIssue,
    owner: Option<String>,
    repo: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let (owner, repo, token) = resolve_target(store, owner, repo, token)?;

    let client = IssueClient::new(config, &owner, &repo, &token)?;
    let created = client
        .create_issue(issue)
        .context("Failed to create issue")?;

    match created.id {
        Some(id) => println!("success: Issue created. Issue ID: #{}", id),
        None => println!("success: Issue created (issue ID could not be extracted)"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["gitee-issue", "add", "--owner", "o", "--repo", "r"]).unwrap();
        if let Some(Commands::Add {
            owner,
            repo,
            token,
            use_default_token,
        }) = cli.command
        {
            assert_eq!(owner, "o");
            assert_eq!(repo, "r");
            assert_eq!(token, None);
            assert!(!use_default_token);
        } else {
            panic!("Expected Add command");
        }

        let cli = Cli::try_parse_from(["gitee-issue", "default", "repoB"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Default { repo: Some(ref r), id: None }) if r == "repoB"
        ));

        let cli = Cli::try_parse_from(["gitee-issue", "default", "--id", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Default { repo: None, id: Some(3) })
        ));

        let cli = Cli::try_parse_from(["gitee-issue"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_rejects_bad_combinations() {
        assert!(Cli::try_parse_from(["gitee-issue", "default"]).is_err());
        assert!(Cli::try_parse_from(["gitee-issue", "default", "r", "--id", "1"]).is_err());
        assert!(Cli::try_parse_from([
            "gitee-issue",
            "add",
            "--owner",
            "o",
            "--repo",
            "r",
            "--token",
            "t",
            "--use-default-token"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["gitee-issue", "create"]).is_err());
    }

    #[test]
    fn test_cli_create() {
        let cli = Cli::try_parse_from([
            "gitee-issue",
            "create",
            "--title",
            "Bug",
            "--labels",
            "bug,ui",
        ])
        .unwrap();
        if let Some(Commands::Create {
            title,
            body,
            labels,
            owner,
            repo,
            token,
        }) = cli.command
        {
            assert_eq!(title, "Bug");
            assert_eq!(body, None);
            assert_eq!(labels.as_deref(), Some("bug,ui"));
            assert!(owner.is_none() && repo.is_none() && token.is_none());
        } else {
            panic!("Expected Create command");
        }
    }

    #[test]
    fn test_resolve_target_uses_default() {
        let tmp = TempDir::new().unwrap();
        let mut store = CredentialStore::open(&tmp.path().join("config.db")).unwrap();
        store.add_credential("repoA", "ownerA", "tok1").unwrap();

        let resolved = resolve_target(&store, None, None, None).unwrap();
        assert_eq!(
            resolved,
            ("ownerA".to_string(), "repoA".to_string(), "tok1".to_string())
        );

        let resolved = resolve_target(&store, Some("other".to_string()), None, None).unwrap();
        assert_eq!(resolved.0, "other");
        assert_eq!(resolved.1, "repoA");
    }

    #[test]
    fn test_resolve_target_explicit_needs_no_default() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::open(&tmp.path().join("config.db")).unwrap();

        let resolved = resolve_target(
            &store,
            Some("o".to_string()),
            Some("r".to_string()),
            Some("t".to_string()),
        )
        .unwrap();
        assert_eq!(resolved, ("o".to_string(), "r".to_string(), "t".to_string()));

        assert!(resolve_target(&store, Some("o".to_string()), None, None).is_err());
    }

    #[test]
    fn test_default_by_unknown_name_keeps_current() {
        let tmp = TempDir::new().unwrap();
        let mut store = CredentialStore::open(&tmp.path().join("config.db")).unwrap();
        store.add_credential("repoA", "ownerA", "tok1").unwrap();

        assert!(cmd_default(&mut store, Some("typo".to_string()), None).is_err());
        assert_eq!(store.get_default_credential().unwrap().unwrap().repo, "repoA");
    }

    #[test]
    fn test_add_reusing_default_token() {
        let tmp = TempDir::new().unwrap();
        let mut store = CredentialStore::open(&tmp.path().join("config.db")).unwrap();
        store.add_credential("repoA", "ownerA", "tok1").unwrap();

        cmd_add(&mut store, "ownerB", "repoB", None, true).unwrap();

        let credentials = store.list_credentials().unwrap();
        assert_eq!(credentials.len(), 2);
        assert_eq!(store.decrypt_token(&credentials[1]).unwrap(), "tok1");
    }
}
