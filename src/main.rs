use anyhow::Context;
use mapsync::{
    ClientConfig, GeoPoint, LocationStatus, MapSession, MockTransport, ReplayLocationSource,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: mapsync [--config FILE] [--mock] [--track FILE] [--frames N] [--player-id ID]";

struct Args {
    config: Option<String>,
    mock: bool,
    track: Option<String>,
    frames: usize,
    player_id: Option<String>,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut parsed = Args {
        config: None,
        mock: false,
        track: None,
        frames: 5,
        player_id: None,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(iter.next().context(USAGE)?.clone()),
            "--mock" => parsed.mock = true,
            "--track" => parsed.track = Some(iter.next().context(USAGE)?.clone()),
            "--frames" => {
                let raw = iter.next().context(USAGE)?;
                parsed.frames = raw
                    .parse()
                    .with_context(|| format!("invalid frame count '{}'", raw))?;
            }
            "--player-id" => parsed.player_id = Some(iter.next().context(USAGE)?.clone()),
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument '{}'\n{}", other, USAGE),
        }
    }
    Ok(parsed)
}

/// Short walk across the map, used when no track file is given
fn default_track(config: &ClientConfig) -> Vec<GeoPoint> {
    let b = config.bounds;
    (0..=8)
        .map(|step| {
            let t = step as f64 / 8.0;
            GeoPoint::new(
                b.lat_min + b.lat_span() * (0.2 + 0.6 * t),
                b.lon_min + b.lon_span() * (0.3 + 0.4 * t),
            )
        })
        .collect()
}

fn load_track(path: &str) -> anyhow::Result<Vec<GeoPoint>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading track '{}'", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing track '{}'", path))
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args)?;

    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    config.apply_env_overrides()?;

    let platform_id = args.player_id.as_deref();
    let mut mock = None;
    let mut session = if args.mock {
        let transport = Arc::new(MockTransport::new());
        let center = config.default_center_point();
        transport.seed_player("p1", center.lat, center.lon);
        transport.seed_player(
            "p2",
            config.bounds.lat_min + config.bounds.lat_span() * 0.25,
            config.bounds.lon_min + config.bounds.lon_span() * 0.75,
        );
        info!("using in-process mock server");
        mock = Some(Arc::clone(&transport));
        MapSession::start(&config, config.resolve_player_id(platform_id), transport)?
    } else {
        info!(server = config.effective_server_base(), "connecting to position server");
        MapSession::connect(&config, platform_id)?
    };

    let track = match &args.track {
        Some(path) => load_track(path)?,
        None => default_track(&config),
    };
    let source = ReplayLocationSource::new(track).repeating();
    if let Err(e) = session.attach_location_source(&source) {
        warn!(error = %e, "continuing without local location");
    }

    for frame_index in 0..args.frames {
        if frame_index == args.frames / 2 {
            if let Some(transport) = &mock {
                info!("mock player p2 leaves the map");
                transport.remove_player("p2");
            }
        }
        thread::sleep(config.poll_interval() + Duration::from_millis(100));
        let frame = session.render_frame();
        info!(
            frame = frame_index,
            generation = frame.generation,
            remote_players = frame.others.len(),
            "render frame"
        );
        println!("{}", serde_json::to_string(&frame)?);
    }

    let stats = session.stats();
    session.shutdown();
    if stats.location != LocationStatus::Active {
        warn!(status = ?stats.location, "location feed was not active at shutdown");
    }
    println!(
        "cycles: {} ok / {} failed, reports: {} sent / {} failed / {} dropped",
        stats.poller.cycles_completed,
        stats.poller.cycles_failed,
        stats.reporter.sent,
        stats.reporter.failed,
        stats.reporter.dropped
    );
    Ok(())
}
