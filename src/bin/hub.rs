use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hostmon::{
    actors::SweepHandle,
    config::{Config, read_config_file},
    ingest::Listener,
    notify::{Dispatcher, SmtpTransport},
    pipeline::Pipeline,
    storage,
    throttle::ThrottleState,
    util::{get_default_addr, get_http_addr, get_port},
};
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Ingests host telemetry reports and mails alerts")]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,

    /// Address to accept agent connections on
    #[arg(short, default_value_t = get_default_addr())]
    bind: IpAddr,

    /// Port to accept agent connections on [env: HOSTMON_PORT, default: 5962]
    #[arg(short)]
    port: Option<u16>,

    /// Serve the HTTP front end on this address [env: HOSTMON_HTTP_ADDR]
    #[arg(long)]
    http: Option<SocketAddr>,

    /// More output per occurrence (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = filter::Targets::new().with_targets(vec![
        ("hostmon", level),
        ("hostmon_hub", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Startup configuration report; never includes the database password
fn log_config(config: &Config) {
    let db = &config.database;
    info!(
        backend = %db.backend,
        user = %db.user,
        host = %db.host,
        database = %db.name,
        "database"
    );
    info!(
        to = %config.mail.to,
        from = %config.mail.from,
        relay = %format!("{}:{}", config.mail.smtp_host, config.mail.smtp_port),
        "notifications"
    );

    let t = &config.thresholds;
    info!(
        load = t.load_abs,
        load_delta = t.load_delta,
        swap = t.swap_abs_pct,
        swap_delta = t.swap_delta_pct,
        disk = t.disk_pct,
        disk_interval_secs = t.disk_report_interval_secs,
        "thresholds"
    );
    info!(
        sweep_interval = ?config.sweep_interval,
        protocol = %config.protocol,
        "runtime"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)
        .with_context(|| format!("cannot load configuration from {}", args.file))?;
    log_config(&config);

    let store = storage::open(&config.database)
        .await
        .context("cannot open report store")?;

    let transport = SmtpTransport::new(&config.mail).context("invalid mail settings")?;
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(transport),
        Arc::new(ThrottleState::new()),
        config.thresholds.disk_report_interval_secs,
    ));

    let pipeline = Arc::new(Pipeline::new(store.clone(), config.thresholds, dispatcher));

    let sweep = SweepHandle::spawn(pipeline.clone(), config.sweep_interval);

    if let Some(addr) = args.http.or_else(get_http_addr) {
        spawn_http(addr, pipeline.clone()).await?;
    }

    let bind_addr = SocketAddr::new(args.bind, args.port.unwrap_or_else(get_port));
    let listener = Listener::bind(bind_addr, pipeline, config.protocol)
        .await
        .with_context(|| format!("cannot listen on {bind_addr}"))?;

    tokio::select! {
        _ = listener.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("cannot wait for ctrl-c: {e}");
            }
            info!("shutting down");
        }
    }

    if let Err(e) = sweep.shutdown().await {
        warn!("{e:#}");
    }
    store.close().await?;

    Ok(())
}

#[cfg(feature = "api")]
async fn spawn_http(addr: SocketAddr, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    use hostmon::api::{ApiConfig, ApiState, spawn_api_server};

    spawn_api_server(ApiConfig { bind_addr: addr }, ApiState::new(pipeline)).await?;
    Ok(())
}

#[cfg(not(feature = "api"))]
async fn spawn_http(addr: SocketAddr, _: Arc<Pipeline>) -> anyhow::Result<()> {
    warn!("built without the `api` feature, not serving HTTP on {addr}");
    Ok(())
}
