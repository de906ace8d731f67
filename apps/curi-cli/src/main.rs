use action_dispatch::{ReplyError, ReplyParser};
use anyhow::{bail, Context, Result};
use camera_geometry::{
    deproject_with, io, BoundingBox, DepthSampling, Frame, ImageExtent, PixelFormat,
};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use curi_runtime::config::{CameraSourceKind, ManipulatorKind};
use curi_runtime::{setup, CuriConfig, InstructionMode, Pipeline, SessionSummary};
use dialogue::{ReasoningEndpoint, ScriptedEndpoint};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "curi",
    version,
    about = "Voice-driven tabletop manipulation with a vision-language model",
    disable_help_subcommand = true
)]
struct Cli {
    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(long, short, action = ArgAction::SetTrue, global = true)]
    verbose: bool,

    /// YAML (or JSON) configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Sampling {
    Center,
    Median,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an interactive session
    Run {
        /// Number of rounds
        #[arg(long)]
        rounds: Option<u32>,
        /// Keep earlier exchanges in the prompt
        #[arg(long, action = ArgAction::SetTrue)]
        prompt_append: bool,
        /// Type instructions instead of speaking them
        #[arg(long, action = ArgAction::SetTrue)]
        text: bool,
        /// Mock camera and manipulator, scripted model replies (pair with --text
        /// unless a speech backend is configured)
        #[arg(long, action = ArgAction::SetTrue)]
        mock: bool,
        /// Replies for --mock, separated by lines containing only `---`
        #[arg(long, requires = "mock")]
        replies: Option<PathBuf>,
    },
    /// Validate a model reply and print what would be dispatched
    ParseReply {
        /// Reply file; stdin when omitted
        file: Option<PathBuf>,
        /// Frame width the boxes refer to
        #[arg(long)]
        width: Option<u32>,
        /// Frame height the boxes refer to
        #[arg(long)]
        height: Option<u32>,
    },
    /// Deproject the center of a box through a 16-bit depth PNG
    Deproject {
        /// Box as x1,y1,x2,y2 in pixels
        #[arg(long, value_delimiter = ',', num_args = 4)]
        bbox: Vec<u32>,
        /// Depth PNG in millimetres
        #[arg(long)]
        depth: PathBuf,
        /// Color PNG aligned with the depth image
        #[arg(long)]
        rgb: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Sampling::Median)]
        sampling: Sampling,
        /// Median window radius (at most 32)
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(0..=32))]
        radius: u32,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => CuriConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CuriConfig::default(),
    };

    match cli.command {
        Commands::Run {
            rounds,
            prompt_append,
            text,
            mock,
            replies,
        } => {
            let mut config = config;
            if let Some(n) = rounds {
                config.session.rounds = n;
            }
            if prompt_append {
                config.session.prompt_append = true;
            }
            if text {
                config.session.instructions = InstructionMode::Text;
            }
            let summary = run_session(config, mock, replies.as_deref()).await?;
            print_summary(&summary)?;
        }
        Commands::ParseReply {
            file,
            width,
            height,
        } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut s = String::new();
                    std::io::stdin().read_to_string(&mut s)?;
                    s
                }
            };
            let intr = config.camera.intrinsics;
            let parser = ReplyParser::new(config.camera.grid);
            let parsed = parser.parse(
                &raw,
                width.unwrap_or(intr.width),
                height.unwrap_or(intr.height),
            );
            print_reply(parsed)?;
        }
        Commands::Deproject {
            bbox,
            depth,
            rgb,
            sampling,
            radius,
        } => deproject_cmd(&config, &bbox, &depth, rgb.as_deref(), sampling, radius)?,
        Commands::ShowConfig => {
            config.validate()?;
            print!("{}", config.to_yaml()?);
        }
    }
    Ok(())
}

async fn run_session(
    mut config: CuriConfig,
    mock: bool,
    replies: Option<&Path>,
) -> Result<SessionSummary> {
    let model = config.validate()?;
    let endpoint: Arc<dyn ReasoningEndpoint> = if mock {
        config.camera.source = CameraSourceKind::Mock;
        config.manipulator.backend = ManipulatorKind::Mock;
        Arc::new(scripted_endpoint(replies)?)
    } else {
        setup::endpoint_from_config(&config, model)?
    };
    let parts = setup::parts_from_config(&config, endpoint)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing current round");
                cancel.cancel();
            }
        });
    }

    info!(%model, mock, "starting session");
    let summary = Pipeline::new(config, parts, cancel)?.run().await?;
    Ok(summary)
}

fn scripted_endpoint(replies: Option<&Path>) -> Result<ScriptedEndpoint> {
    let Some(path) = replies else {
        return Ok(ScriptedEndpoint::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading replies {}", path.display()))?;
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim() == "---" {
            chunks.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    chunks.push(current);
    Ok(ScriptedEndpoint::with_replies(
        chunks.into_iter().filter(|c| !c.trim().is_empty()),
    ))
}

fn print_summary(summary: &SessionSummary) -> Result<()> {
    let rounds: Vec<_> = summary
        .rounds
        .iter()
        .map(|r| {
            serde_json::json!({
                "round": r.round,
                "instruction": r.instruction,
                "verbal_response": r.verbal_response,
                "action": r.dispatched.as_ref().map(|d| d.action.as_str()),
                "points": r.dispatched.as_ref().map(|d| {
                    d.points.iter().map(|p| p.to_array()).collect::<Vec<_>>()
                }),
                "error": r.error.as_ref().map(|e| {
                    serde_json::json!({ "kind": e.kind(), "message": e.to_string() })
                }),
            })
        })
        .collect();
    let out = serde_json::json!({
        "session_id": summary.session_id.to_string(),
        "cancelled": summary.cancelled,
        "rounds": rounds,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_reply(parsed: std::result::Result<action_dispatch::StructuredReply, ReplyError>) -> Result<()> {
    match parsed {
        Ok(reply) => {
            println!("{}", serde_json::to_string_pretty(&reply)?);
            if reply.actions.len() > 1 {
                warn!(ignored = reply.actions.len() - 1, "only the first action would run");
            }
            Ok(())
        }
        Err(e) => {
            let out = serde_json::json!({
                "error": e.kind(),
                "message": e.to_string(),
                "verbal_response": e.verbal_response(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            bail!("reply rejected: {e}")
        }
    }
}

fn deproject_cmd(
    config: &CuriConfig,
    bbox: &[u32],
    depth_path: &Path,
    rgb_path: Option<&Path>,
    sampling: Sampling,
    radius: u32,
) -> Result<()> {
    let [x1, y1, x2, y2] = bbox else {
        bail!("--bbox takes exactly four values");
    };
    let depth = io::read_depth_mm(depth_path)?;
    let rgb = match rgb_path {
        Some(p) => io::read_rgb8(p)?,
        None => Frame {
            width: depth.width,
            height: depth.height,
            pixel_format: PixelFormat::Rgb8,
            data: vec![0; (depth.width * depth.height * 3) as usize],
            ts: None,
        },
    };
    let extent = ImageExtent {
        width: depth.width,
        height: depth.height,
    };
    let b = BoundingBox::new(*x1, *y1, *x2, *y2, extent)?;
    let sampling = match sampling {
        Sampling::Center => DepthSampling::Center,
        Sampling::Median => DepthSampling::Median { radius },
    };
    sampling.check()?;
    let point = deproject_with(&b, &rgb, &depth, &config.camera.intrinsics, sampling)?;
    let base = config.camera.extrinsics.unwrap_or_default().to_base(&point);
    let out = serde_json::json!({
        "bbox": b,
        "center": b.center(),
        "camera": point,
        "base": base,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn setup_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "info" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
