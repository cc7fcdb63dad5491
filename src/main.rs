use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr as StdSocketAddr},
    panic,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use axum::Router;
use blogicum::{
    api::{self, GlobalServerContext},
    app::{
        LocationId,
        category::NewCategory,
        location::NewLocation,
        store::BlogStore,
        user::{create_user, is_valid_username},
    },
    blog_config::{self, blog_config},
    database::PgBlogStore,
};
use clap::{Args, Parser, Subcommand};
use futures_util::{StreamExt, stream::FuturesUnordered};
use hyper::{Request, body::Incoming};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server,
};
use rustls::{
    ServerConfig,
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    runtime,
    sync::oneshot,
};
use tokio_rustls::TlsAcceptor;
use tower::Service as _;
use tracing::{error, info, level_filters::LevelFilter, warn};

#[derive(Parser, Debug)]
#[clap(name = "blogicum", args_conflicts_with_subcommands = true)]
struct Opt {
    #[clap(subcommand)]
    command: Option<Command>,
    /// Options for `serve`, which also runs when no subcommand is given.
    #[clap(flatten)]
    serve: ServeOpt,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the blog over HTTP(S).
    Serve(ServeOpt),
    /// Create a staff account with every permission.
    CreateSuperuser {
        #[clap(long)]
        username: String,
        #[clap(long, default_value = "")]
        email: String,
        #[clap(long)]
        password: String,
    },
    AddCategory {
        #[clap(long)]
        title: String,
        /// Used in the category URL, must be unique.
        #[clap(long)]
        slug: String,
        #[clap(long, default_value = "")]
        description: String,
        /// Hide the category and every post in it.
        #[clap(long)]
        unpublished: bool,
    },
    AddLocation {
        #[clap(long)]
        name: String,
        #[clap(long)]
        unpublished: bool,
    },
    /// Delete a category by slug. Its posts stay, without a category.
    DeleteCategory {
        #[clap(long)]
        slug: String,
    },
    /// Delete a location. Its posts stay, without a location.
    DeleteLocation {
        #[clap(long)]
        id: i64,
    },
    /// Delete a user together with their posts and comments.
    DeleteUser {
        #[clap(long)]
        username: String,
    },
}

#[derive(Args, Debug, Clone)]
struct ServeOpt {
    /// file to log TLS keys to for debugging
    #[clap(long)]
    keylog: bool,
    /// TLS private key in PEM format
    #[clap(short = 'k', long, requires = "cert")]
    key: Option<PathBuf>,
    /// TLS certificate in PEM format
    #[clap(short = 'c', long, requires = "key")]
    cert: Option<PathBuf>,
    /// Address(es) to listen on, can be either IPv4 or IPv6.
    /// Pass multiple times to listen on more than one address.
    #[clap(long, default_values_t = [IpAddr::V4(Ipv4Addr::UNSPECIFIED)])]
    listen_addr: Vec<IpAddr>,
    /// The network port to use for all given listen addresses.
    #[clap(long, default_value_t = 443)]
    port: u16,
    /// Serve plain HTTP. Only meant for running behind a reverse proxy that terminates
    /// TLS, or for local development.
    #[clap(long)]
    no_https: bool,
}

fn main() {
    if let Err(e) = blog_config::load_config() {
        eprintln!("failed to load config from blogicum.toml or environment. {e}");
        ::std::process::exit(2);
    }
    let env_filter = match tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("BLOGICUM_LOG")
        .from_env()
    {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("invalid logging filter set in env var BLOGICUM_LOG. {e}");
            ::std::process::exit(2);
        }
    };
    if let Err(e) = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(env_filter)
            .finish(),
    ) {
        eprintln!("failed to install tracing subscriber. {e}");
        ::std::process::exit(2);
    }
    panic::set_hook(Box::new(tracing_panic::panic_hook));
    let opt = Opt::parse();
    let runtime = match runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("unable to init tokio runtime {e}");
            ::std::process::exit(2);
        }
    };
    let command = opt.command.unwrap_or(Command::Serve(opt.serve));
    let code = {
        let result = match command {
            Command::Serve(options) => runtime.block_on(serve(options)),
            command => runtime.block_on(administer(command)),
        };
        if let Err(e) = result {
            error!("ERROR: {e:#}");
            1
        } else {
            0
        }
    };
    runtime.shutdown_timeout(Duration::from_secs(5));
    ::std::process::exit(code);
}

/// Runs one of the administration subcommands against the configured database.
async fn administer(command: Command) -> Result<()> {
    let config = blog_config().await;
    let Some(database_url) = config.database_url else {
        bail!("administration commands need database_url, the in-memory store does not outlive the command");
    };
    let store = PgBlogStore::connect(&database_url).context("failed to set up the database pool")?;
    match command {
        Command::Serve(_) => unreachable!("serve is dispatched by main"),
        Command::CreateSuperuser {
            username,
            email,
            password,
        } => {
            if !is_valid_username(&username) {
                bail!("invalid username {username:?}");
            }
            let user = create_user(&store, &username, &email, &password, true).await?;
            info!(id = %user.id, "created superuser {}", user.username);
        }
        Command::AddCategory {
            title,
            slug,
            description,
            unpublished,
        } => {
            let category = store
                .create_category(NewCategory {
                    title,
                    description,
                    slug,
                    is_published: !unpublished,
                })
                .await?;
            info!(id = %category.id, "created category {}", category.slug);
        }
        Command::AddLocation { name, unpublished } => {
            let location = store
                .create_location(NewLocation {
                    name,
                    is_published: !unpublished,
                })
                .await?;
            info!(id = %location.id, "created location {}", location.name);
        }
        Command::DeleteCategory { slug } => {
            let Some(category) = store.category_by_slug(&slug).await? else {
                bail!("no category with slug {slug}");
            };
            store.delete_category(category.id).await?;
            info!(id = %category.id, "deleted category {slug}, its posts are now uncategorized");
        }
        Command::DeleteLocation { id } => {
            if !store.delete_location(LocationId(id)).await? {
                bail!("no location with id {id}");
            }
            info!(%id, "deleted location");
        }
        Command::DeleteUser { username } => {
            let Some(user) = store.user_by_username(&username).await? else {
                bail!("no user named {username}");
            };
            store.delete_user(user.id).await?;
            info!(id = %user.id, "deleted user {username} with their posts and comments");
        }
    }
    Ok(())
}

async fn serve(options: ServeOpt) -> Result<()> {
    let (exit_tx, mut exit_rx) = oneshot::channel();
    let mut exit_tx = Some(exit_tx);
    ctrlc::set_handler(move || {
        if let Some(exit_tx) = exit_tx.take() {
            let _ = exit_tx.send(());
            info!("stopping the blog server");
        }
    })?;
    let tls_acceptor = if options.no_https {
        warn!("--no-https given, pages and session cookies travel unencrypted");
        None
    } else {
        Some(tls_acceptor(&options)?)
    };

    let config = blog_config().await;
    let context = GlobalServerContext::new()
        .await
        .context("cannot open blog storage")?;
    let app = api::make_router(context, config.secure_cookies);
    let listeners = bind_listeners(&options.listen_addr, options.port).await?;

    loop {
        let mut accepts: FuturesUnordered<_> = listeners.iter().map(|l| l.accept()).collect();
        let socket = tokio::select! {
            accepted = accepts.next() => match accepted {
                Some(Ok((socket, _))) => socket,
                Some(Err(e)) => {
                    error!("accepting a connection failed {e}");
                    continue;
                }
                None => unreachable!("there is always at least one listener"),
            },
            _ = &mut exit_rx => break Ok(()),
        };
        let tls_acceptor = tls_acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            match tls_acceptor {
                Some(acceptor) => match acceptor.accept(socket).await {
                    Ok(tls_stream) => serve_connection(tls_stream, app).await,
                    Err(e) => warn!("TLS handshake failed {e}"),
                },
                None => serve_connection(socket, app).await,
            }
        });
    }
}

fn tls_acceptor(options: &ServeOpt) -> Result<TlsAcceptor> {
    let (certs, key) = load_certificate(options)?;
    let mut server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("TLS certificate and key do not match")?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    if options.keylog {
        server_config.key_log = Arc::new(rustls::KeyLogFile::new());
    }
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Binds every address that is available. Fails only when none is.
async fn bind_listeners(addrs: &[IpAddr], port: u16) -> Result<Vec<TcpListener>> {
    let mut listeners = Vec::with_capacity(addrs.len());
    for &addr in addrs {
        match TcpListener::bind(StdSocketAddr::new(addr, port)).await {
            Ok(listener) => {
                info!("blog listening on {}", listener.local_addr()?);
                listeners.push(listener);
            }
            Err(e) => warn!("cannot listen on {addr}:{port}: {e}"),
        }
    }
    if listeners.is_empty() {
        bail!("none of the listen addresses could be bound on port {port}");
    }
    Ok(listeners)
}

/// Serves HTTP/1 or HTTP/2 on one accepted stream, plain or TLS.
async fn serve_connection<IO>(stream: IO, app: Router)
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        app.clone().call(request)
    });
    if let Err(e) = server::conn::auto::Builder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(TokioIo::new(stream), service)
        .await
    {
        warn!("connection closed with an error {e}");
    }
}

/// Certificate and key for the HTTPS listener: the pair given on the command line, or a
/// development certificate for localhost that is created once and reused.
fn load_certificate(
    options: &ServeOpt,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    match (&options.key, &options.cert) {
        (Some(key_path), Some(cert_path)) => {
            Ok((read_cert_chain(cert_path)?, read_private_key(key_path)?))
        }
        _ => development_certificate(),
    }
}

fn is_der(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "der")
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let bytes =
        fs::read(path).with_context(|| format!("cannot read TLS key {}", path.display()))?;
    if is_der(path) {
        return Ok(PrivatePkcs8KeyDer::from(bytes).into());
    }
    rustls_pemfile::private_key(&mut bytes.as_slice())
        .with_context(|| format!("TLS key {} is not valid PEM", path.display()))?
        .with_context(|| format!("TLS key file {} holds no private key", path.display()))
}

fn read_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let bytes = fs::read(path)
        .with_context(|| format!("cannot read TLS certificate {}", path.display()))?;
    if is_der(path) {
        return Ok(vec![CertificateDer::from(bytes)]);
    }
    let chain = rustls_pemfile::certs(&mut bytes.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("TLS certificate {} is not valid PEM", path.display()))?;
    if chain.is_empty() {
        bail!("TLS certificate file {} holds no certificate", path.display());
    }
    Ok(chain)
}

/// Self-signed certificate for `localhost`, kept under the blog's local data directory.
fn development_certificate() -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let dirs = directories_next::ProjectDirs::from("org", "blogicum", "blogicum")
        .context("no home directory for the development certificate, pass --key and --cert")?;
    let tls_dir = dirs.data_local_dir().join("tls");
    let cert_path = tls_dir.join("localhost-cert.der");
    let key_path = tls_dir.join("localhost-key.der");
    if cert_path.exists() && key_path.exists() {
        info!("using development certificate {}", cert_path.display());
        return Ok((read_cert_chain(&cert_path)?, read_private_key(&key_path)?));
    }

    warn!(
        "no --key/--cert given, creating a self-signed certificate for localhost in {}",
        tls_dir.display()
    );
    let generated = rcgen::generate_simple_self_signed(vec![
        "localhost".to_owned(),
        "127.0.0.1".to_owned(),
    ])
    .context("cannot generate the development certificate")?;
    let key = PrivatePkcs8KeyDer::from(generated.key_pair.serialize_der());
    let cert: CertificateDer<'static> = generated.cert.into();
    fs::create_dir_all(&tls_dir)
        .with_context(|| format!("cannot create {}", tls_dir.display()))?;
    fs::write(&cert_path, &cert)
        .with_context(|| format!("cannot write {}", cert_path.display()))?;
    fs::write(&key_path, key.secret_pkcs8_der())
        .with_context(|| format!("cannot write {}", key_path.display()))?;
    Ok((vec![cert], key.into()))
}
