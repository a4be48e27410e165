//! `agora` operator binary.
//!
//! Opens the SQLite store named in `agora.toml` (or the path given with
//! `--config`) and drives the engagement engine from the command line.
//! Results are printed as JSON on stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```
//! agora register alice alice@example.com      # password read from stdin
//! export AGORA_TOKEN=$(agora login alice | jq -r .token)
//! agora post "Hello" "First post" --category general
//! agora react <POST_ID> like
//! agora inbox
//! agora category general                      # works without a token
//! ```

mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agora_core::{
  content::PostEdit,
  reaction::Target,
};
use agora_engine::{Engine, EngineConfig, credentials::hash_password};
use agora_store_sqlite::SqliteStore;
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use settings::Settings;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "agora", version, about = "Agora forum engagement engine")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "agora.toml")]
  config: PathBuf,

  /// Session token for commands that act on behalf of a user.
  #[arg(long, env = "AGORA_TOKEN", global = true, hide_env_values = true)]
  token: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the database file and schema, then exit.
  Init,

  /// Print the argon2 hash for a password entered on stdin.
  HashPassword,

  /// Create an account. The password is read from stdin.
  Register { username: String, email: String },

  /// Open a session. The password is read from stdin.
  Login { username: String },

  /// Close the session named by `--token`.
  Logout,

  /// Show the identity behind `--token`.
  Whoami,

  /// Change the caller's username and avatar.
  Profile {
    username: String,
    #[arg(long)]
    avatar:   Option<String>,
  },

  /// Publish a post.
  Post {
    title:      String,
    body:       String,
    /// One or two categories.
    #[arg(short = 'C', long = "category", required = true)]
    categories: Vec<String>,
    #[arg(long)]
    image:      Option<String>,
  },

  /// Every post, newest first.
  Home,

  /// Every category with its post count.
  Categories,

  /// Posts tagged with a category.
  Category { name: String },

  /// Posts written by a user.
  Posts { username: String },

  /// Show a post with its comments.
  View { post_id: Uuid },

  /// Delete one of the caller's posts.
  DeletePost { post_id: Uuid },

  /// Toggle a reaction (`like` or `dislike`) on a post or comment.
  React {
    id:      Uuid,
    action:  String,
    /// Treat `id` as a comment rather than a post.
    #[arg(long)]
    comment: bool,
  },

  /// Comment on a post.
  Comment { post_id: Uuid, body: String },

  /// Delete one of the caller's comments.
  DeleteComment { comment_id: Uuid },

  /// Posts the caller currently likes.
  Liked,

  /// Unread notifications.
  Inbox,

  /// Mark a notification read and print the post it leads to.
  Open { notification_id: Uuid },

  /// The caller's activity feed.
  Activity,

  /// Delete expired sessions.
  PurgeSessions,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if let Command::HashPassword = cli.command {
    let password = read_password()?;
    println!("{}", hash_password(&password)?);
    return Ok(());
  }

  let settings = Settings::load(&cli.config)?;
  let store = open_store(&settings).await?;
  let engine = Engine::new(
    Arc::new(store),
    EngineConfig { session_ttl: settings.session_ttl() },
  );
  let token = cli.token.as_deref();

  match cli.command {
    // Handled before the store is opened.
    Command::HashPassword => {}
    Command::Init => {
      tracing::info!(path = %settings.store_path.display(), "store ready");
    }
    Command::Register { username, email } => {
      let password = read_password()?;
      print_json(&engine.identity().register(&username, &email, &password).await?)?;
    }
    Command::Login { username } => {
      let password = read_password()?;
      print_json(&engine.identity().login(&username, &password).await?)?;
    }
    Command::Logout => {
      let token = token.context("--token or AGORA_TOKEN is required")?;
      print_json(&engine.identity().logout(token).await?)?;
    }
    Command::Whoami => {
      print_json(&engine.identity().viewer(token).await?)?;
    }
    Command::Profile { username, avatar } => {
      print_json(&engine.identity().edit_profile(token, &username, avatar).await?)?;
    }
    Command::Post { title, body, categories, image } => {
      let draft = PostEdit { title, body, image, categories };
      print_json(&engine.create_post(token, draft).await?)?;
    }
    Command::Home => {
      print_json(&engine.home(token).await?)?;
    }
    Command::Categories => {
      print_json(&engine.categories().await?)?;
    }
    Command::Category { name } => {
      print_json(&engine.category_view(token, &name).await?)?;
    }
    Command::Posts { username } => {
      print_json(&engine.profile_posts(token, &username).await?)?;
    }
    Command::View { post_id } => {
      print_json(&engine.post_view(token, post_id).await?)?;
    }
    Command::DeletePost { post_id } => {
      engine.delete_post(token, post_id).await?;
    }
    Command::React { id, action, comment } => {
      let target = if comment { Target::Comment(id) } else { Target::Post(id) };
      let engagement = engine.react(token, target, &action).await?;
      if !engagement.is_complete() {
        tracing::warn!(degraded = ?engagement.degraded, "reaction applied with degraded follow-up");
      }
      print_json(&engagement)?;
    }
    Command::Comment { post_id, body } => {
      print_json(&engine.comment(token, post_id, &body).await?)?;
    }
    Command::DeleteComment { comment_id } => {
      engine.delete_comment(token, comment_id).await?;
    }
    Command::Liked => {
      print_json(&engine.liked_posts(token).await?)?;
    }
    Command::Inbox => {
      print_json(&engine.inbox(token).await?)?;
    }
    Command::Open { notification_id } => {
      print_json(&engine.open_notification(token, notification_id).await?)?;
    }
    Command::Activity => {
      print_json(&engine.activity_page(token).await?)?;
    }
    Command::PurgeSessions => {
      print_json(&engine.identity().purge_expired_sessions().await?)?;
    }
  }

  Ok(())
}

async fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
  let path = &settings.store_path;
  ensure_parent(path)?;
  let store = SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open store at {path:?}"))?;
  store
    .set_busy_timeout(settings.busy_timeout())
    .await
    .context("failed to set busy timeout")?;
  Ok(store)
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
  if let Some(dir) = path.parent()
    && !dir.as_os_str().is_empty()
  {
    std::fs::create_dir_all(dir)
      .with_context(|| format!("failed to create {}", dir.display()))?;
  }
  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Read a password from the first line of stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
