//! rsftp - command-line SFTP client
//!
//! Runs `ssh -s <host> sftp` and speaks SFTP over the subprocess's stdio.
//! Authentication and encryption are left entirely to ssh.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rsftp_client::{ChildStream, Client, Duplex, SessionConfig, StreamTransport};
use rsftp_protocol::PROTOCOL_VERSION;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rsftp")]
#[command(about = "SFTP client running over an ssh subprocess")]
#[command(version)]
struct Cli {
    /// Remote host, as accepted by ssh ([user@]host)
    #[arg(env = "RSFTP_HOST")]
    host: String,

    /// ssh program to run
    #[arg(long, env = "RSFTP_SSH", default_value = "ssh")]
    ssh: String,

    /// Port passed to ssh
    #[arg(short, long)]
    port: Option<u16>,

    /// Extra ssh option (-o), may be repeated
    #[arg(short = 'o', long = "ssh-option")]
    ssh_options: Vec<String>,

    /// Highest protocol version to offer (1-6)
    #[arg(long, env = "RSFTP_MAX_VERSION", default_value_t = PROTOCOL_VERSION)]
    max_version: u32,

    /// Print results as JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List a directory
    Ls {
        #[arg(default_value = ".")]
        path: String,

        /// Long listing
        #[arg(short, long)]
        long: bool,

        /// Include entries starting with '.'
        #[arg(short, long)]
        all: bool,
    },

    /// Show file attributes
    Stat {
        path: String,

        /// Describe a symbolic link itself rather than its target
        #[arg(long)]
        no_follow: bool,
    },

    /// Download a file
    Get {
        remote: String,

        /// Local destination (defaults to the remote file name)
        local: Option<PathBuf>,
    },

    /// Upload a file
    Put {
        local: PathBuf,

        /// Remote destination (defaults to the local file name)
        remote: Option<String>,
    },

    /// Create a directory
    Mkdir {
        path: String,

        /// Permissions in octal, e.g. 755
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// Remove an empty directory
    Rmdir { path: String },

    /// Remove a file
    Rm { path: String },

    /// Rename a file or directory
    Mv {
        from: String,
        to: String,

        /// Replace an existing destination (sent by protocol version 4 and later)
        #[arg(short, long)]
        force: bool,
    },

    /// Create a link
    Ln {
        /// Create a symbolic link
        #[arg(short, long)]
        symbolic: bool,

        /// What the link points to
        target: String,

        /// Path of the new link
        link: String,
    },

    /// Print the target of a symbolic link
    Readlink { path: String },

    /// Print the canonical form of a path
    Realpath {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Show free space (version 6 servers with space-available)
    Df {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Print the server-computed checksum of a file (check-file extension)
    Sum { path: String },

    /// Show the negotiated protocol version and server extensions
    Version,
}

type Sftp = Client<StreamTransport<ChildStream>>;

/// Spawns ssh and completes the SFTP handshake over its pipes.
async fn connect(cli: &Cli) -> Result<(Sftp, Child), Box<dyn std::error::Error>> {
    let mut command = Command::new(&cli.ssh);
    if let Some(port) = cli.port {
        command.arg("-p").arg(port.to_string());
    }
    for option in &cli.ssh_options {
        command.arg("-o").arg(option);
    }
    command
        .arg("-s")
        .arg(&cli.host)
        .arg("sftp")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    tracing::debug!("Spawning {} for {}", cli.ssh, cli.host);
    let mut child = command.spawn()?;
    let stdin = child.stdin.take().ok_or("ssh stdin is not piped")?;
    let stdout = child.stdout.take().ok_or("ssh stdout is not piped")?;

    let transport = StreamTransport::new(Duplex::new(stdout, stdin));
    let config = SessionConfig::new()
        .with_max_version(cli.max_version)
        .with_on_ready(|version| tracing::debug!("Negotiated protocol version {}", version));
    let client = Client::connect(transport, config).await?;
    Ok((client, child))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (mut client, mut child) = connect(&cli).await?;

    let result = commands::execute(&mut client, cli.command, cli.json).await;

    if let Err(e) = client.disconnect().await {
        tracing::debug!("Disconnect failed: {}", e);
    }
    match child.wait().await {
        Ok(status) => tracing::debug!("ssh exited with {}", status),
        Err(e) => tracing::debug!("Failed to reap ssh: {}", e),
    }

    let output = result?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
}
