// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use gitgate::keys::{self, AuthorizedKeys};
use gitgate::server::checks::GitInspector;
use gitgate::server::{App, Config, Directory};

use std::fs::read_to_string;
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;

use anyhow::{bail, Context as _};
use async_std::net::TcpListener;
use async_std::sync::Arc;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Access-control gateway for Git over HTTP and SSH.
///
/// Any command-line options listed here may be specified by one or
/// more configuration files, which can be used by passing the
/// name of the file on the command-line with the syntax `@config.toml`.
/// The configuration file must contain valid TOML table mapping argument
/// names to their values.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the gateway configuration file.
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the Git smart HTTP and internal API endpoints.
    Serve {
        /// Address to bind to.
        #[arg(long)]
        addr: Option<SocketAddr>,

        /// Path to the directory of users, tokens and projects.
        #[arg(long)]
        directory: Option<Utf8PathBuf>,

        /// Root of the bare repositories inspected by push rules.
        #[arg(long)]
        repositories: Option<Utf8PathBuf>,
    },
    /// Manage the `authorized_keys` file read by sshd.
    #[command(subcommand)]
    Keys(KeysCommand),
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Add a single key.
    Add { id: String, key: String },
    /// Add all `<id> <key>` lines of a file, `-` for standard input.
    Batch { file: String },
    /// Remove the key with the given ID.
    Remove { id: String },
    /// Check whether a key with the given ID is present.
    Exists { id: String },
    /// List the numeric IDs of all managed keys.
    List,
    /// Remove all keys.
    Clear,
    /// Check that the file is readable.
    Check,
}

fn default_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080)
}

fn default_repositories() -> Utf8PathBuf {
    "/var/opt/gitlab/git-data/repositories".into()
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    addr: SocketAddr,
    directory: Option<Utf8PathBuf>,
    repositories: Utf8PathBuf,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            directory: None,
            repositories: default_repositories(),
        }
    }
}

/// Tables of the configuration file used by the binary itself.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerSection,
    keys: keys::Config,
}

fn expand_args() -> anyhow::Result<Vec<String>> {
    std::env::args().try_fold(Vec::new(), |mut args, arg| {
        if let Some(path) = arg.strip_prefix('@') {
            let conf =
                read_to_string(path).context(format!("failed to read config file at `{path}`"))?;
            conf.parse::<toml::Table>()
                .context(format!("failed to parse config file at `{path}` as TOML"))?
                .into_iter()
                .try_for_each(|(k, v)| {
                    match v {
                        toml::Value::String(v) => args.push(format!("--{k}={v}")),
                        toml::Value::Integer(v) => args.push(format!("--{k}={v}")),
                        toml::Value::Float(v) => args.push(format!("--{k}={v}")),
                        toml::Value::Boolean(v) => {
                            if v {
                                args.push(format!("--{k}"))
                            }
                        }
                        _ => bail!(
                            "unsupported value type for field `{k}` in config file at `{path}`"
                        ),
                    }
                    Ok(())
                })?;
        } else {
            args.push(arg);
        }
        Ok(args)
    })
}

fn init_logging(json: bool) {
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    if json {
        fmt.json().init()
    } else {
        fmt.init()
    }
}

fn read_config(path: Option<&Utf8PathBuf>) -> anyhow::Result<(Config, FileConfig)> {
    let Some(path) = path else {
        return Ok(Default::default());
    };
    let s = read_to_string(path).with_context(|| format!("failed to read `{path}`"))?;
    let conf = Config::from_toml(&s).with_context(|| format!("invalid gateway config in `{path}`"))?;
    let file = toml::from_str(&s).with_context(|| format!("invalid config in `{path}`"))?;
    Ok((conf, file))
}

async fn serve(
    conf: Config,
    ServerSection {
        addr,
        directory,
        repositories,
    }: ServerSection,
) -> anyhow::Result<()> {
    let directory = directory.context("no directory file given, use `--directory`")?;
    if conf.shared_secret.is_none() {
        warn!(target: "gitgate::main", "no `shared_secret` configured, the internal API will reject every call");
    }
    let directory = Directory::read(&directory)
        .await
        .with_context(|| format!("failed to load directory `{directory}`"))?;
    let app = App::builder(conf)
        .directory(Arc::new(directory))
        .inspector(Arc::new(GitInspector::new(repositories)))
        .build()
        .context("failed to build app")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!(target: "gitgate::main", "listening on {addr}");
    listener
        .incoming()
        .for_each_concurrent(None, |stream| async {
            if let Err(e) = async {
                let stream = stream.context("failed to initialize connection")?;
                let peer = stream.peer_addr().ok();
                debug!(target: "gitgate::main", "received TCP connection from {peer:?}");
                app.handle(stream, peer).await
            }
            .await
            {
                error!(target: "gitgate::main", "failed to handle request: {e:#}");
            }
        })
        .await;
    Ok(())
}

fn run_keys(store: &AuthorizedKeys, command: KeysCommand) -> anyhow::Result<bool> {
    let ok = match command {
        KeysCommand::Add { id, key } => store.add_key(&id, &key)?,
        KeysCommand::Batch { file } => {
            let input = if file == "-" {
                let mut buf = String::new();
                let _ = io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read standard input")?;
                buf
            } else {
                read_to_string(&file).with_context(|| format!("failed to read `{file}`"))?
            };
            let keys = input
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| {
                    line.trim()
                        .split_once(char::is_whitespace)
                        .map(|(id, key)| (id.to_string(), key.trim().to_string()))
                        .with_context(|| format!("expected `<id> <key>`, got `{line}`"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            store.batch_add_keys(keys)?
        }
        KeysCommand::Remove { id } => store.remove_key(&id)?,
        KeysCommand::Exists { id } => store.key_exists(&id)?,
        KeysCommand::List => {
            for id in store.list_key_ids()? {
                println!("{id}");
            }
            true
        }
        KeysCommand::Clear => store.clear()?,
        KeysCommand::Check => {
            let ok = store.accessible()?;
            if ok {
                println!("Checking {} ... OK", store.file());
            } else {
                println!("Checking {} ... Failed: file is not accessible", store.file());
            }
            ok
        }
    };
    Ok(ok)
}

#[async_std::main]
async fn main() -> anyhow::Result<ExitCode> {
    let Args {
        config,
        log_json,
        command,
    } = expand_args()
        .map(Args::parse_from)
        .context("Failed to parse arguments")?;
    init_logging(log_json);

    let (conf, file) = read_config(config.as_ref())?;
    match command {
        Command::Serve {
            addr,
            directory,
            repositories,
        } => {
            let mut server = file.server;
            server.addr = addr.unwrap_or(server.addr);
            server.directory = directory.or(server.directory);
            server.repositories = repositories.unwrap_or(server.repositories);
            serve(conf, server).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Keys(command) => {
            let store = AuthorizedKeys::from(file.keys);
            Ok(if run_keys(&store, command)? {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
