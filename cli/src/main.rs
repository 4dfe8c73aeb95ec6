use std::fs;
use std::io::{self, Read};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use taskmap::camera::{Camera, Point, Transform};
use taskmap::config::{ConfigError, EngineConfig};
use taskmap::consts::FIT_PADDING_RATIO;
use taskmap::layout::LayoutParams;
use taskmap::record::{LINK_Z_INDEX, NodeKind, RecordStore};
use taskmap::scene::SceneGraph;
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid records: {0}")]
    Records(#[source] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "taskmap", about = "Layout, hit-test and fit queries over a taskmap record set")]
struct Cli {
    /// Records file `{domains, projects, tasks}`, or - for stdin.
    #[arg(long, short, env = "TASKMAP_RECORDS", default_value = "-")]
    input: String,

    /// Engine options as JSON.
    #[arg(long, env = "TASKMAP_CONFIG")]
    config: Option<String>,

    #[arg(long, default_value_t = 1600.0)]
    width: f64,

    #[arg(long, default_value_t = 900.0)]
    height: f64,

    /// Lay out only this domain.
    #[arg(long)]
    domain: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every laid-out node and tag edge.
    Layout,
    /// Print the nodes under a world point, nearest first.
    Hit(HitArgs),
    /// Print the camera transform that fits the given nodes (all when empty).
    Fit(FitArgs),
}

#[derive(Args, Debug)]
struct HitArgs {
    #[arg(allow_negative_numbers = true)]
    x: f64,
    #[arg(allow_negative_numbers = true)]
    y: f64,

    /// Extra pick radius in world units.
    #[arg(long)]
    radius: Option<f64>,
}

#[derive(Args, Debug)]
struct FitArgs {
    ids: Vec<String>,

    #[arg(long, default_value_t = FIT_PADDING_RATIO)]
    padding: f64,
}

#[derive(Debug, Serialize)]
struct EdgeOut<'a> {
    a: &'a str,
    b: &'a str,
    tag: &'a str,
    z_index: u8,
}

#[derive(Debug, Serialize)]
struct HitOut<'a> {
    id: &'a str,
    kind: NodeKind,
    distance: f64,
}

#[derive(Debug, Serialize)]
struct FitOut {
    scale: f64,
    tx: f64,
    ty: f64,
}

impl From<Transform> for FitOut {
    fn from(t: Transform) -> Self {
        Self { scale: t.scale, tx: t.tx, ty: t.ty }
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "taskmap failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json(&read_input(path)?)?,
        None => EngineConfig::default(),
    };
    let records = RecordStore::from_json(&read_input(&cli.input)?).map_err(CliError::Records)?;
    let params = LayoutParams {
        active_domain: cli.domain.clone(),
        viewport_width: cli.width,
        viewport_height: cli.height,
        mode: config.layout_mode,
        edge_cap: config.max_edges,
    };
    let mut scene = SceneGraph::new();
    scene.rebuild(&records, &params);

    let out = match cli.command {
        Command::Layout => layout_json(&scene)?,
        Command::Hit(args) => hit_json(&scene, &args)?,
        Command::Fit(args) => fit_json(&scene, &config, &params, &args)?,
    };
    print_json(&out)
}

fn read_input(path: &str) -> Result<String, CliError> {
    let read = if path == "-" {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw).map(|_| raw)
    } else {
        fs::read_to_string(path)
    };
    read.map_err(|source| CliError::Read { path: path.to_owned(), source })
}

fn layout_json(scene: &SceneGraph) -> Result<Value, CliError> {
    let edges: Vec<EdgeOut<'_>> = scene
        .edges()
        .iter()
        .map(|e| EdgeOut { a: &e.a, b: &e.b, tag: &e.tag, z_index: LINK_Z_INDEX })
        .collect();
    Ok(serde_json::json!({
        "nodes": serde_json::to_value(scene.nodes())?,
        "edges": serde_json::to_value(edges)?,
    }))
}

fn hit_json(scene: &SceneGraph, args: &HitArgs) -> Result<Value, CliError> {
    let at = Point::new(args.x, args.y);
    let hits: Vec<HitOut<'_>> = scene
        .hit_test(args.x, args.y, args.radius)
        .into_iter()
        .map(|n| HitOut { id: &n.id, kind: n.kind, distance: n.center().distance(at) })
        .collect();
    tracing::debug!(x = args.x, y = args.y, hits = hits.len(), "hit test");
    Ok(serde_json::to_value(hits)?)
}

fn fit_json(
    scene: &SceneGraph,
    config: &EngineConfig,
    params: &LayoutParams,
    args: &FitArgs,
) -> Result<Value, CliError> {
    let bbox = if args.ids.is_empty() {
        scene.bbox()
    } else {
        let ids: Vec<&str> = args.ids.iter().map(String::as_str).collect();
        scene.bbox_of(&ids)
    };
    let mut camera = Camera::with_bounds(config.scale_bounds[0], config.scale_bounds[1]);
    camera.set_viewport(params.viewport_width, params.viewport_height);
    let fit = camera.fit_to_bbox(bbox, args.padding).map(FitOut::from);
    if fit.is_none() {
        tracing::warn!(ids = ?args.ids, "nothing to fit");
    }
    Ok(serde_json::to_value(fit)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
