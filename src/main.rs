// docledger - Node process and client commands

use clap::{Args, Parser, Subcommand};
use docledger::attest;
use docledger::config::{NodeConfig, DEFAULT_DATA_DIR, DEFAULT_PORT};
use docledger::ledger::{DocumentRecord, Entry};
use docledger::node::{Node, NodeError};
use docledger::sync::{DocumentQuery, Message, MessageType};
use docledger::transport::{
    PeerAddress, PeerClient, TcpPeerClient, TcpTransport, TcpTransportConfig, TransportConfig,
    TransportError,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected reply from node: {0:?}")]
    UnexpectedReply(MessageType),

    #[error("Node refused the request: {0}")]
    Rejected(String),

    #[error("Either --hash or --file is required")]
    MissingContent,
}

#[derive(Parser)]
#[command(name = "docledger", version, about = "Permissioned document attestation ledger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a ledger node
    Run(RunArgs),

    /// Attest a document on a running node
    Submit {
        #[command(flatten)]
        target: Target,
        /// Document identifier
        #[arg(long)]
        id: String,
        #[command(flatten)]
        content: Content,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        issuer: String,
        #[arg(long, default_value = "")]
        recipient: String,
        #[arg(long, default_value = "")]
        issue_date: String,
        /// Opaque (already encrypted) reference to where the file is stored
        #[arg(long, default_value = "")]
        storage_ref: String,
    },

    /// Look a document up by id or content
    Verify {
        #[command(flatten)]
        target: Target,
        /// Look up by document id instead of content
        #[arg(long, conflicts_with_all = ["hash", "file"])]
        id: Option<String>,
        #[command(flatten)]
        content: Content,
    },

    /// Print a node's chain
    List {
        #[command(flatten)]
        target: Target,
    },

    /// Print a node's peers, optionally teaching it new ones
    Peers {
        #[command(flatten)]
        target: Target,
        /// Addresses to merge into the node's registry
        #[arg(long = "add")]
        add: Vec<PeerAddress>,
    },

    /// Ask a node to run conflict resolution now
    Resolve {
        #[command(flatten)]
        target: Target,
    },

    /// Show a node's status
    Ping {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, env = "NODE_NAME")]
    node_name: Option<String>,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Host peers should use to reach this node
    #[arg(long, env = "ADVERTISE_HOST")]
    advertise_host: Option<String>,

    #[arg(long, env = "DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Peer to join on startup
    #[arg(long, env = "BOOTSTRAP_NODE")]
    bootstrap: Option<PeerAddress>,

    /// Comma-separated validator identities
    #[arg(long, env = "AUTHORITIES", value_delimiter = ',')]
    authorities: Vec<String>,

    /// Run conflict resolution every N seconds (0 disables)
    #[arg(long, env = "RESOLVE_INTERVAL_SECS", default_value_t = 0)]
    resolve_interval_secs: u64,

    #[arg(long, env = "PEER_TIMEOUT_SECS", default_value_t = 5)]
    peer_timeout_secs: u64,
}

impl RunArgs {
    fn into_config(self) -> NodeConfig {
        let mut config = NodeConfig::new()
            .with_bind_address(&self.bind)
            .with_port(self.port)
            .with_data_dir(self.data_dir)
            .with_peer_timeout(Duration::from_secs(self.peer_timeout_secs))
            .with_resolve_interval(
                (self.resolve_interval_secs > 0)
                    .then(|| Duration::from_secs(self.resolve_interval_secs)),
            );

        if let Some(name) = self.node_name {
            config = config.with_node_name(&name);
        }
        if let Some(host) = self.advertise_host {
            config = config.with_advertise_host(&host);
        }
        if let Some(peer) = self.bootstrap {
            config = config.with_bootstrap(peer);
        }
        if !self.authorities.is_empty() {
            config = config.with_authorities(self.authorities);
        }
        config
    }
}

#[derive(Args)]
struct Target {
    /// Node to talk to
    #[arg(long, env = "DOCLEDGER_NODE", default_value = "127.0.0.1:3000")]
    node: PeerAddress,

    #[arg(long, default_value_t = 10)]
    timeout_secs: u32,
}

impl Target {
    async fn request(&self, message: Message) -> Result<Message, CliError> {
        let client = TcpPeerClient::new(
            TransportConfig::new()
                .with_connection_timeout(self.timeout_secs)
                .with_message_timeout(self.timeout_secs),
        );
        match client.request(&self.node, message).await? {
            Message::Rejected(reason) => Err(CliError::Rejected(reason)),
            reply => Ok(reply),
        }
    }
}

#[derive(Args)]
struct Content {
    /// SHA-256 hex of the document content
    #[arg(long, conflicts_with = "file")]
    hash: Option<String>,

    /// Document file to hash
    #[arg(long)]
    file: Option<PathBuf>,
}

impl Content {
    async fn resolve(&self) -> Result<Option<String>, CliError> {
        match (&self.hash, &self.file) {
            (Some(hash), _) => Ok(Some(hash.to_lowercase())),
            (None, Some(path)) => Ok(Some(attest::hash_file(path).await?)),
            (None, None) => Ok(None),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docledger=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Err(e) = execute(cli.command).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn execute(command: Command) -> Result<(), CliError> {
    match command {
        Command::Run(args) => run_node(args.into_config()).await,

        Command::Submit {
            target,
            id,
            content,
            title,
            issuer,
            recipient,
            issue_date,
            storage_ref,
        } => {
            let hash = content.resolve().await?.ok_or(CliError::MissingContent)?;
            let record = DocumentRecord::new(&id, &hash)
                .with_title(&title)
                .with_issuer(&issuer)
                .with_recipient(&recipient)
                .with_issue_date(&issue_date)
                .with_storage_ref(&storage_ref);

            match target.request(Message::SubmitDocument(record)).await? {
                Message::EntryAppended(entry) => {
                    print_entry(&entry);
                    Ok(())
                }
                other => Err(CliError::UnexpectedReply(other.message_type())),
            }
        }

        Command::Verify { target, id, content } => {
            let query = match id {
                Some(id) => DocumentQuery::ById(id),
                None => DocumentQuery::ByContentHash(
                    content.resolve().await?.ok_or(CliError::MissingContent)?,
                ),
            };

            match target.request(Message::FindDocument(query)).await? {
                Message::DocumentMatch(Some(entry)) => {
                    println!("VERIFIED");
                    print_entry(&entry);
                    Ok(())
                }
                Message::DocumentMatch(None) => {
                    println!("NOT FOUND");
                    Ok(())
                }
                other => Err(CliError::UnexpectedReply(other.message_type())),
            }
        }

        Command::List { target } => match target.request(Message::ChainRequest).await? {
            Message::ChainResponse(chain) => {
                for entry in &chain {
                    print_entry(entry);
                }
                println!("{} entries", chain.len());
                Ok(())
            }
            other => Err(CliError::UnexpectedReply(other.message_type())),
        },

        Command::Peers { target, add } => match target.request(Message::SyncPeers(add)).await? {
            Message::PeerList(peers) => {
                for peer in peers {
                    println!("{peer}");
                }
                Ok(())
            }
            other => Err(CliError::UnexpectedReply(other.message_type())),
        },

        Command::Resolve { target } => match target.request(Message::Resolve).await? {
            Message::Resolved(replaced) => {
                if replaced {
                    println!("chain replaced with a longer peer chain");
                } else {
                    println!("local chain is authoritative");
                }
                Ok(())
            }
            other => Err(CliError::UnexpectedReply(other.message_type())),
        },

        Command::Ping { target } => match target.request(Message::Ping).await? {
            Message::Pong(status) => {
                println!("node:    {}", status.node_name);
                println!("address: {}", status.address);
                println!("length:  {}", status.chain_length);
                println!("tip:     {}", status.tip_hash);
                println!("peers:   {}", status.peers.len());
                Ok(())
            }
            other => Err(CliError::UnexpectedReply(other.message_type())),
        },
    }
}

async fn run_node(config: NodeConfig) -> Result<(), CliError> {
    let transport_config = TransportConfig::new()
        .with_message_timeout(config.peer_timeout.as_secs().clamp(1, u32::MAX as u64) as u32);
    let client: Arc<dyn PeerClient> = Arc::new(TcpPeerClient::new(transport_config.clone()));

    let node = Arc::new(Node::open(&config, client)?);

    let mut transport = TcpTransport::new(
        TcpTransportConfig::new()
            .with_base_config(transport_config)
            .with_bind_address(&config.bind_address)
            .with_bind_port(config.port),
    );
    transport.start(node.clone()).await?;

    if let Some(peer) = &config.bootstrap {
        if let Err(e) = node.bootstrap(peer).await {
            warn!(peer = %peer, error = %e, "bootstrap failed, continuing alone");
        }
    }

    let resolver = config.resolve_interval.map(|every| {
        let node = node.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = node.resolve().await {
                    error!(error = %e, "periodic resolve failed");
                }
            }
        })
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    if let Some(handle) = resolver {
        handle.abort();
    }
    node.shutdown();
    transport.stop().await?;
    Ok(())
}

fn print_entry(entry: &Entry) {
    match entry.document() {
        Some(doc) => println!(
            "#{} {} id={} content={} title={:?} issuer={:?} recipient={:?} validator={}",
            entry.index(),
            entry.hash(),
            doc.document_id,
            doc.document_hash,
            doc.title,
            doc.issuer,
            doc.recipient,
            entry.validator()
        ),
        None => println!("#{} {} (genesis)", entry.index(), entry.hash()),
    }
}
