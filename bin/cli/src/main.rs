mod app;
mod commands;
mod config;
mod constants;
mod logger;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::{FileId, PermissionType, UserId};
use config::{CliConfig, GlobalArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chunkctl", version, about = "Chunked file storage across simulated servers")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user (or rename an existing one)
    AddUser {
        #[arg(long)]
        id: UserId,
        #[arg(long)]
        name: String,
    },
    /// Upload a file, printing the new file id
    Upload {
        /// File to upload
        path: PathBuf,
        /// Owning user id
        #[arg(long)]
        owner: UserId,
        /// Name to record instead of the file name
        #[arg(long)]
        name: Option<String>,
        /// MIME type to record instead of the detected one
        #[arg(long = "type")]
        file_type: Option<String>,
    },
    /// Download a file, verifying every chunk checksum
    Download {
        file_id: FileId,
        /// Destination path
        #[arg(short, long)]
        output: PathBuf,
        /// User the download is recorded against in the audit log
        #[arg(long = "as")]
        actor: Option<UserId>,
    },
    /// Delete a file from every server and from metadata
    Delete {
        file_id: FileId,
        /// User the delete is recorded against in the audit log
        #[arg(long = "as")]
        actor: Option<UserId>,
    },
    /// Grant another user access to a file
    Share {
        file_id: FileId,
        /// User receiving access
        #[arg(long = "with")]
        grantee: UserId,
        /// read, write or download
        #[arg(long, default_value = "read")]
        permission: PermissionType,
        /// Requesting user, must own the file
        #[arg(long = "as")]
        requester: UserId,
    },
    /// List files owned by or shared with a user
    List {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        json: bool,
    },
    /// Show the chunk layout of a file
    Chunks {
        file_id: FileId,
        #[arg(long)]
        json: bool,
    },
    /// Show the server registry
    Servers {
        #[arg(long)]
        json: bool,
    },
    /// Show recorded audit events
    Audit {
        /// Only events about this file
        #[arg(long)]
        file: Option<FileId>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let cli = Cli::parse();
    let config = CliConfig::load(&cli.global)?;
    let app = app::build(&config).await?;
    let result = run(&app, cli.command).await;
    app.shutdown().await;
    result
}

async fn run(app: &app::App, command: Commands) -> Result<()> {
    let orchestrator = &app.orchestrator;
    match command {
        Commands::AddUser { id, name } => commands::add_user(orchestrator, id, name).await,
        Commands::Upload {
            path,
            owner,
            name,
            file_type,
        } => commands::upload(orchestrator, &path, owner, name, file_type)
            .await
            .map(|_| ()),
        Commands::Download {
            file_id,
            output,
            actor,
        } => commands::download(orchestrator, file_id, &output, actor).await,
        Commands::Delete { file_id, actor } => commands::delete(orchestrator, file_id, actor).await,
        Commands::Share {
            file_id,
            grantee,
            permission,
            requester,
        } => commands::share(orchestrator, file_id, grantee, permission, requester).await,
        Commands::List { user, json } => commands::list(orchestrator, user, json).await,
        Commands::Chunks { file_id, json } => commands::chunks(orchestrator, file_id, json).await,
        Commands::Servers { json } => commands::servers(orchestrator, json),
        Commands::Audit { file, json } => commands::audit(app, file, json).await,
    }
}
