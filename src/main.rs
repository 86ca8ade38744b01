use anyhow::{Context, Result, anyhow};
use chaptersync::selectors;
use chaptersync::{
    AuthIdentity, ConnectionStatus, HttpTransport, InMemoryBackend, Profile,
    ProfileField, ProfileUpdate, SyncConfig, SyncStore, ViewerStatus,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chaptersync")]
#[command(about = "Inspect and drive the chapter connection/profile cache")]
struct Cli {
    /// Override CHAPTERSYNC_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Override CHAPTERSYNC_SESSION_DIR
    #[arg(long, global = true)]
    session_dir: Option<PathBuf>,

    /// Sign in as this user id before running the command
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk through a request/accept scenario against an in-process backend
    Demo,
    /// List the signed-in user's connections
    Connections {
        #[arg(long)]
        force: bool,
        /// Only show connections with this viewer-relative label
        #[arg(long)]
        only: Option<Label>,
    },
    /// Send a connection request
    Send {
        recipient: String,
        #[arg(long)]
        message: Option<String>,
    },
    /// Answer or block a connection
    Respond { id: String, action: Action },
    /// Withdraw a pending request you sent
    Cancel { id: String },
    /// Show or edit your profile
    Profile {
        #[arg(long)]
        force: bool,
        #[arg(long)]
        chapter: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Forget the persisted session
    SignOut,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    Accept,
    Decline,
    Block,
}

impl From<Action> for ConnectionStatus {
    fn from(action: Action) -> Self {
        match action {
            Action::Accept => ConnectionStatus::Accepted,
            Action::Decline => ConnectionStatus::Declined,
            Action::Block => ConnectionStatus::Blocked,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Label {
    PendingSent,
    PendingReceived,
    Accepted,
    Declined,
    Blocked,
}

impl From<Label> for ViewerStatus {
    fn from(label: Label) -> Self {
        match label {
            Label::PendingSent => ViewerStatus::PendingSent,
            Label::PendingReceived => ViewerStatus::PendingReceived,
            Label::Accepted => ViewerStatus::Accepted,
            Label::Declined => ViewerStatus::Declined,
            Label::Blocked => ViewerStatus::Blocked,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let Cli {
        api_url,
        session_dir,
        user,
        command,
    } = Cli::parse();
    let remote = RemoteOptions {
        api_url,
        session_dir,
        user,
    };

    match command {
        Command::Demo => run_demo().await?,
        Command::Connections { force, only } => {
            let (store, viewer) = remote.open().await?;
            store.fetch_connections(force).await?;
            let state = store.connections().await;
            let rows = match only {
                Some(label) => {
                    selectors::connections_with_status(state.table(), &viewer, label.into())
                }
                None => selectors::all_connections(state.table()),
            };
            for connection in rows {
                let other = connection
                    .counterpart(&viewer)
                    .map(|p| p.full_name.clone())
                    .or_else(|| connection.counterpart_id(&viewer).map(str::to_string))
                    .unwrap_or_default();
                println!(
                    "{}  {:<16}  {}",
                    connection.id,
                    selectors::viewer_status_of(&viewer, connection).as_str(),
                    other
                );
            }
        }
        Command::Send { recipient, message } => {
            let (store, _) = remote.open().await?;
            if let Some(connection) = store.send_request(&recipient, message.as_deref()).await? {
                println!("requested {} ({})", connection.id, connection.status);
            }
        }
        Command::Respond { id, action } => {
            let (store, _) = remote.open().await?;
            store.fetch_connections(false).await?;
            if let Some(connection) = store.transition_connection(&id, action.into()).await? {
                println!("{} is now {}", connection.id, connection.status);
            }
        }
        Command::Cancel { id } => {
            let (store, _) = remote.open().await?;
            store.fetch_connections(false).await?;
            if store.cancel_request(&id).await? {
                println!("cancelled {}", id);
            }
        }
        Command::Profile {
            force,
            chapter,
            bio,
        } => {
            let (store, viewer) = remote.open().await?;
            let mut update = ProfileUpdate::new();
            if let Some(chapter) = chapter {
                update = update.set(ProfileField::Chapter(Some(chapter)));
            }
            if let Some(bio) = bio {
                update = update.set(ProfileField::Bio(Some(bio)));
            }

            if update.is_empty() {
                store.fetch_profile(force).await?;
            } else {
                store.update_profile(update).await?;
            }

            match selectors::profile(&store.profile().await) {
                Some(profile) => println!("{}", serde_json::to_string_pretty(profile)?),
                None => println!("no profile for {}", viewer),
            }
        }
        Command::SignOut => {
            let store = remote.build_store()?;
            store.sign_out().await?;
            println!("signed out");
        }
    }

    Ok(())
}

struct RemoteOptions {
    api_url: Option<String>,
    session_dir: Option<PathBuf>,
    user: Option<String>,
}

impl RemoteOptions {
    fn build_store(&self) -> Result<SyncStore> {
        let mut config = SyncConfig::from_env()?;
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(dir) = &self.session_dir {
            config = config.session_dir(dir.clone());
        }

        let transport = Arc::new(HttpTransport::from_config(&config)?);
        SyncStore::builder(transport.clone(), transport)
            .config(config)
            .build()
            .context("failed to build sync store")
    }

    /// Build the store, restore the persisted session and sign in if asked
    async fn open(&self) -> Result<(SyncStore, String)> {
        let store = self.build_store()?;
        store.rehydrate().await?;
        if let Some(user) = &self.user {
            store.sign_in(AuthIdentity::new(user.clone())).await;
        }
        let viewer = store
            .viewer_id()
            .await
            .ok_or_else(|| anyhow!("not signed in; pass --user <id>"))?;
        Ok((store, viewer))
    }
}

async fn run_demo() -> Result<()> {
    let backend = Arc::new(InMemoryBackend::default());
    backend.seed_profile(Profile::new("u1", "Ada Lovelace", Utc::now())).await;
    backend.seed_profile(Profile::new("u2", "Grace Hopper", Utc::now())).await;

    let store = SyncStore::builder(backend.clone(), backend.clone()).build()?;

    store.sign_in(AuthIdentity::new("u1")).await;
    let request = store
        .send_request("u2", Some("Let's connect"))
        .await?
        .ok_or_else(|| anyhow!("request was not sent"))?;
    println!("u1 sent {} -> {}", request.id, selectors::viewer_status_of("u1", &request));

    store.sign_in(AuthIdentity::new("u2")).await;
    store.fetch_connections(false).await?;
    let state = store.connections().await;
    println!(
        "u2 sees {}",
        selectors::viewer_status_with(state.table(), "u2", "u1")
    );
    store.accept_request(&request.id).await?;

    store.sign_in(AuthIdentity::new("u1")).await;
    let first = store.fetch_connections(false).await?;
    let second = store.fetch_connections(false).await?;
    let state = store.connections().await;
    println!(
        "u1 sees {} (first fetch hit network: {}, second: {})",
        selectors::viewer_status_with(state.table(), "u1", "u2"),
        first.hit_network(),
        second.hit_network()
    );
    println!("backend calls: {:?}", backend.calls());
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chaptersync=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
