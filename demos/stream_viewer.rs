//! Streaming point-cloud viewer
//!
//! Publishes a synthetic depth camera on an in-process bus (or listens on
//! zenoh with `--features zenoh`), runs the pipeline at a fixed display rate
//! and draws into a headless GPU target, falling back to a logging sink when
//! no adapter is available.

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use teleview_core::{
    DecodedFrame, Matrix4, Point3f, PointSink, RawPointMessage, TfMessage, TransformStamped,
};
use teleview_gpu::GpuPointRenderer;
use teleview_stream::codec::{encode_point_cloud, encode_transforms};
use teleview_stream::{LocalBus, Pipeline, StreamContext, ViewerConfig};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const SYNTHETIC_TOPIC: &str = "/rgbd/point_cloud";

#[derive(Parser, Debug)]
#[command(name = "stream_viewer")]
#[command(about = "Stream a point cloud topic into an instanced point renderer", long_about = None)]
struct Args {
    /// JSON viewer configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Point cloud topic, overrides the config and the saved topic
    #[arg(short, long)]
    topic: Option<String>,

    /// Number of display frames to run
    #[arg(short, long, default_value = "300")]
    frames: u64,

    /// Display rate in Hz
    #[arg(long, default_value = "60")]
    rate: f64,

    /// Synthetic sensor rate in Hz
    #[arg(long, default_value = "15")]
    sensor_rate: f64,

    /// Points per synthetic frame
    #[arg(long, default_value = "20000")]
    points: usize,

    /// Fraction of max_points drawn per frame
    #[arg(long)]
    density: Option<f32>,

    /// Skip the GPU and log draws instead
    #[arg(long)]
    cpu: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Subscribe over zenoh instead of the synthetic in-process sensor
    #[cfg(feature = "zenoh")]
    #[arg(long)]
    zenoh: bool,

    /// zenoh mode (peer or client)
    #[cfg(feature = "zenoh")]
    #[arg(long, default_value = "peer")]
    mode: String,

    /// zenoh endpoints to connect to
    #[cfg(feature = "zenoh")]
    #[arg(long)]
    connect: Vec<String>,
}

/// Draws nothing; logs what the GPU would have drawn
struct LoggingSink {
    capacity: usize,
    stored: usize,
    draws: u64,
}

impl PointSink for LoggingSink {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn upload(&mut self, frame: &DecodedFrame) -> teleview_core::Result<()> {
        self.stored = frame.len();
        Ok(())
    }

    fn draw(&mut self, instance_count: u32, point_size: f32, world: &Matrix4<f32>) -> teleview_core::Result<()> {
        self.draws += 1;
        debug!(
            "draw #{}: {} of {} stored points, size {}, origin ({:.3}, {:.3}, {:.3})",
            self.draws,
            instance_count,
            self.stored,
            point_size,
            world[(0, 3)],
            world[(1, 3)],
            world[(2, 3)]
        );
        Ok(())
    }
}

type Publish = Arc<dyn Fn(&str, Vec<u8>) + Send + Sync>;

/// Rippling surface in front of the camera, colored by depth
fn synthetic_frame(points: usize, t: f32, rng: &mut impl Rng) -> DecodedFrame {
    let side = (points as f32).sqrt().ceil().max(1.0) as usize;
    (0..points)
        .map(|i| {
            let u = (i % side) as f32 / side as f32 - 0.5;
            let v = (i / side) as f32 / side as f32 - 0.5;
            let depth = 1.5 + 0.25 * (u * 9.0 + t).sin() * (v * 7.0 - t).cos() + rng.gen_range(-0.01..0.01);
            let shade = ((depth - 1.0) / 1.0).clamp(0.0, 1.0);
            (Point3f::new(u * 2.0, v * 1.5, depth), [shade, 0.4, 1.0 - shade])
        })
        .collect()
}

fn camera_transforms() -> TfMessage {
    let mut optical = TransformStamped::default();
    optical.header.frame_id = "camera_link".to_string();
    optical.child_frame_id = "camera_color_frame".to_string();
    optical.transform.translation.y = 0.015;
    optical.transform.rotation.x = -0.5;
    optical.transform.rotation.y = 0.5;
    optical.transform.rotation.z = -0.5;
    optical.transform.rotation.w = 0.5;

    let mut mount = TransformStamped::default();
    mount.header.frame_id = "base_link".to_string();
    mount.child_frame_id = "camera_link".to_string();
    mount.transform.translation.z = 0.4;

    TfMessage { transforms: vec![mount, optical] }
}

/// Publish synthetic frames until `running` is cleared
fn spawn_sensor(
    publish: Publish,
    topic: String,
    transform_topic: String,
    points: usize,
    rate: f64,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    let period = Duration::from_secs_f64(1.0 / rate.max(0.1));

    thread::spawn(move || {
        let mut rng = rand::thread_rng();
        let started = Instant::now();
        let mut last_tf: Option<Instant> = None;

        while running.load(Ordering::Relaxed) {
            let tick = Instant::now();
            // static transforms are not latched on the bus; repeat them
            if last_tf.map_or(true, |at| at.elapsed() >= Duration::from_secs(1)) {
                match encode_transforms(&camera_transforms()) {
                    Ok(bytes) => publish(&transform_topic, bytes),
                    Err(e) => warn!("failed to encode transforms: {}", e),
                }
                last_tf = Some(tick);
            }

            let frame = synthetic_frame(points, started.elapsed().as_secs_f32(), &mut rng);
            let encoded = RawPointMessage::encode_points(&frame, 32).and_then(|mut msg| {
                msg.header.frame_id = "camera_color_frame".to_string();
                encode_point_cloud(&msg)
            });
            match encoded {
                Ok(bytes) => publish(&topic, bytes),
                Err(e) => warn!("failed to encode synthetic frame: {}", e),
            }

            thread::sleep(period.saturating_sub(tick.elapsed()));
        }
    })
}

/// Wait for the sensor thread; a panic is reported rather than propagated.
/// Returns whether the thread finished cleanly.
fn join_sensor(handle: thread::JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("synthetic sensor thread panicked: {}", reason);
            false
        }
    }
}

fn make_sink(args: &Args, capacity: usize) -> Box<dyn PointSink> {
    if !args.cpu {
        match pollster::block_on(GpuPointRenderer::new_headless(1280, 720, capacity)) {
            Ok(renderer) => {
                info!("drawing into a headless {}x{} target", 1280, 720);
                return Box::new(renderer);
            }
            Err(e) => warn!("GPU unavailable ({}), logging draws instead", e),
        }
    }
    Box::new(LoggingSink { capacity, stored: 0, draws: 0 })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if config.state_file.is_none() {
        config.state_file = Some(PathBuf::from("teleview_state.json"));
    }

    let (context, sensor_bus) = connect(&args)?;
    let sink = make_sink(&args, config.render.max_points);
    let mut pipeline = Pipeline::new(context, &config, sink)?;

    match args.topic.as_deref() {
        Some(topic) => pipeline.set_topic(Some(topic))?,
        None => {
            let fallback = config.point_topic.clone().unwrap_or_else(|| SYNTHETIC_TOPIC.to_string());
            pipeline.restore_topic(Some(&fallback))?;
        }
    }
    if let Some(density) = args.density {
        pipeline.set_density(density);
    }

    let running = Arc::new(AtomicBool::new(true));
    let sensor = match (sensor_bus, pipeline.topic()) {
        (Some(publish), Some(topic)) => Some(spawn_sensor(
            publish,
            topic.to_string(),
            config.transform_topic.clone(),
            args.points,
            args.sensor_rate,
            Arc::clone(&running),
        )),
        _ => None,
    };

    let period = Duration::from_secs_f64(1.0 / args.rate.max(1.0));
    let report_every = args.rate.max(1.0) as u64;
    let started = Instant::now();

    for frame in 1..=args.frames {
        let tick = Instant::now();
        let report = pipeline.tick(period)?;
        if let Some(stats) = report.uploaded {
            debug!("frame {}: uploaded {} (sampled {})", frame, stats.accepted, stats.sampled);
        }
        if frame % report_every == 0 {
            let status = pipeline.status();
            info!(
                "frame {}: drawing {} points, received {}, published {}, malformed {}, late {}, transform {}",
                frame,
                report.drawn,
                status.received,
                status.published,
                status.malformed,
                status.late,
                if pipeline.controller().transform_cache().is_captured() { "captured" } else { "pending" }
            );
        }
        thread::sleep(period.saturating_sub(tick.elapsed()));
    }

    running.store(false, Ordering::Relaxed);
    if let Some(sensor) = sensor {
        join_sensor(sensor);
    }
    info!("ran {} frames in {:.2?}", args.frames, started.elapsed());
    Ok(())
}

/// Build the transport; the in-process bus also returns a publish handle
/// for the synthetic sensor.
#[cfg(feature = "zenoh")]
fn connect(args: &Args) -> anyhow::Result<(StreamContext, Option<Publish>)> {
    if args.zenoh {
        let session_config = teleview_stream::zenoh_transport::session_config(&args.mode, &args.connect, &[])?;
        let transport = Arc::new(teleview_stream::ZenohTransport::open(session_config)?);
        return Ok((StreamContext::new(transport), None));
    }
    Ok(local_bus())
}

#[cfg(not(feature = "zenoh"))]
fn connect(_args: &Args) -> anyhow::Result<(StreamContext, Option<Publish>)> {
    Ok(local_bus())
}

fn local_bus() -> (StreamContext, Option<Publish>) {
    let bus = Arc::new(LocalBus::new());
    let publish: Publish = {
        let bus = Arc::clone(&bus);
        Arc::new(move |topic: &str, payload: Vec<u8>| {
            bus.publish(topic, &payload);
        })
    };
    (StreamContext::new(bus), Some(publish))
}
