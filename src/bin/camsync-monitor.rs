//! Connect to a render server, orbit the camera and report frame latency.

use anyhow::{Context, Result};
use camsync::{ClientConfig, OrbitPose, RemoteConnection};
use clap::Parser;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "camsync-monitor")]
#[command(about = "Exercise a camera-sync render server and report latency")]
struct Args {
    /// Server URL; overrides the config file
    #[arg(long, env = "CAMSYNC_URL")]
    url: Option<String>,

    /// YAML client config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How long to run, in seconds
    #[arg(short, long, default_value_t = 10.0)]
    duration: f64,

    /// Request rate; overrides the config file
    #[arg(long)]
    fps: Option<f64>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Camera orbit speed in degrees per second
    #[arg(long, default_value_t = 30.0)]
    spin: f32,

    /// Orbit radius
    #[arg(long, default_value_t = 2.0)]
    radius: f32,
}

#[derive(Debug, Default)]
struct LatencySummary {
    count: u32,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

impl LatencySummary {
    fn record(&mut self, latency: Duration) {
        self.count += 1;
        self.total += latency;
        self.min = Some(self.min.map_or(latency, |min| min.min(latency)));
        self.max = self.max.max(latency);
    }

    fn mean(&self) -> Option<Duration> {
        (self.count > 0).then(|| self.total / self.count)
    }
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    config = config.with_env_overrides().context("applying environment overrides")?;

    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(fps) = args.fps {
        config.target_fps = fps;
    }
    if let Some(width) = args.width {
        config.width = width;
        config.pin_viewport = true;
    }
    if let Some(height) = args.height {
        config.height = height;
        config.pin_viewport = true;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let url = config.url.clone();

    let pose = OrbitPose::new(15.0, 0.0, args.radius).with_auto_rotate(args.spin);
    let connection = RemoteConnection::connect_with_pose(config, pose)
        .await
        .with_context(|| format!("connecting to {url}"))?;

    let mut frames = Box::pin(connection.frames());
    let mut summary = LatencySummary::default();
    let deadline = tokio::time::sleep(Duration::from_secs_f64(args.duration.max(0.0)));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            frame = frames.next() => {
                let Some(frame) = frame else {
                    warn!("Frame stream ended");
                    break;
                };
                summary.record(frame.latency);
                info!(
                    sequence = frame.sequence,
                    time = frame.time,
                    width = frame.image.width,
                    height = frame.image.height,
                    latency_ms = frame.latency.as_secs_f64() * 1000.0,
                    "Frame"
                );
            }
        }
    }

    let status = connection.status();
    connection.close().ok();

    println!("frames:          {}", summary.count);
    if let (Some(min), Some(mean)) = (summary.min, summary.mean()) {
        println!("latency min:     {:.1} ms", min.as_secs_f64() * 1000.0);
        println!("latency mean:    {:.1} ms", mean.as_secs_f64() * 1000.0);
        println!("latency max:     {:.1} ms", summary.max.as_secs_f64() * 1000.0);
    }
    if let Some(params) = status.params {
        println!(
            "server:          T={} {} {}x{} fov {}",
            params.frame_count, params.format, params.width, params.height, params.fov
        );
    }
    println!("sends:           {}", status.stats.sends);
    println!("skipped sends:   {}", status.stats.skipped_sends);
    println!("decode failures: {}", status.stats.decode_failures);
    println!("server errors:   {}", status.stats.server_errors);
    println!("timeouts:        {}", status.stats.timeouts);
    if let Some(notice) = status.last_notice {
        println!("last notice:     {:?}: {}", notice.kind, notice.message);
    }
    Ok(())
}
