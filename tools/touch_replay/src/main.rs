use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use touch_explorer::{
    load_config, touch::integration::NodeBounds, AccessibilityEventType, ExplorerConfig,
    ExplorerOutput, GestureResult, NodeId, PointerPhase, Point, RawPointerSample, StaticNodeTree,
    TouchExplorer,
};

const TRACE_HEADER: &str = "touch_trace,ms,display,pointer,phase,x,y";
const SCREEN_NODE: NodeId = NodeId(1);

#[derive(Debug, Parser)]
#[command(name = "touch_replay")]
#[command(about = "Replays a raw touch trace through the touch explorer")]
struct Cli {
    trace: PathBuf,
    /// Expected accessibility event labels, one per line.
    #[arg(long)]
    expect: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 1080.0)]
    width: f32,
    #[arg(long, default_value_t = 2280.0)]
    height: f32,
    /// Quiet time after the last sample so pending timers fire.
    #[arg(long = "settle-ms", default_value_t = 5_000)]
    settle_ms: u64,
}

struct TraceBatch {
    ms: u64,
    samples: Vec<RawPointerSample>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExplorerConfig::default(),
    };
    let batches = parse_trace(&cli.trace)?;
    let Some(display_id) = batches
        .first()
        .and_then(|batch| batch.samples.first())
        .map(|sample| sample.display_id)
    else {
        bail!("{} contains no samples", cli.trace.display());
    };

    let tree = StaticNodeTree::new().with_node(
        SCREEN_NODE,
        display_id,
        NodeBounds::new(0.0, 0.0, cli.width, cli.height),
    );
    let mut explorer = TouchExplorer::new(display_id, config);
    let mut rows: Vec<(u64, ExplorerOutput)> = Vec::new();

    let mut last_ms = 0;
    for batch in &batches {
        let result = explorer.process(batch.ms, &batch.samples, &tree);
        for err in &result.rejected {
            log::warn!("{}ms: {err}", batch.ms);
        }
        rows.extend(result.outputs.into_iter().map(|output| (batch.ms, output)));
        last_ms = batch.ms;
    }
    let settle_ms = last_ms.saturating_add(cli.settle_ms);
    let tail = explorer.advance_to(settle_ms, &tree);
    rows.extend(tail.outputs.into_iter().map(|output| (settle_ms, output)));

    println!("event,ms,kind,label,x,y,node");
    for (ms, output) in &rows {
        println!("{}", format_row(*ms, output));
    }

    if let Some(expect_path) = &cli.expect {
        let expected = parse_expected_labels(expect_path)?;
        let actual: Vec<&'static str> = rows
            .iter()
            .filter_map(|(_, output)| output.accessibility_type())
            .map(AccessibilityEventType::label)
            .collect();
        if actual != expected {
            eprintln!("expected labels: {}", expected.join(","));
            eprintln!("actual labels:   {}", actual.join(","));
            bail!("accessibility event sequence mismatch");
        }
    }

    Ok(())
}

fn format_row(ms: u64, output: &ExplorerOutput) -> String {
    match output {
        ExplorerOutput::Accessibility(record) => format!(
            "event,{ms},accessibility,{},,,{}",
            record.event_type.label(),
            record.node.map(|node| node.0.to_string()).unwrap_or_default()
        ),
        ExplorerOutput::Touch(event) | ExplorerOutput::Hover(event) => {
            let kind = if matches!(output, ExplorerOutput::Touch(_)) {
                "touch"
            } else {
                "hover"
            };
            let position = event.primary().map(|pointer| pointer.position).unwrap_or_default();
            format!(
                "event,{ms},{kind},{},{},{},{}",
                event.action.label(),
                position.x,
                position.y,
                event.target.map(|node| node.0.to_string()).unwrap_or_default()
            )
        }
        ExplorerOutput::SessionEnd { session, result } => {
            format!("event,{ms},session_end,{},,,{session}", result_label(result))
        }
    }
}

fn result_label(result: &GestureResult) -> String {
    match result {
        GestureResult::Discrete(event) => format!("gesture_{}", event.gesture.id()),
        GestureResult::PathUnrecognized => "path_unrecognized".to_string(),
        GestureResult::Completed => "completed".to_string(),
        GestureResult::Cancelled => "cancelled".to_string(),
    }
}

/// Groups consecutive lines with the same timestamp into one delivery.
fn parse_trace(path: &Path) -> Result<Vec<TraceBatch>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut batches: Vec<TraceBatch> = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed == TRACE_HEADER {
            continue;
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts[0] != "touch_trace" {
            continue;
        }
        if parts.len() < 7 {
            bail!(
                "{}:{line_no} invalid trace line, expected 7 columns",
                path.display()
            );
        }
        let at = |field: &str| format!("{}:{line_no} invalid {field}", path.display());

        let ms: u64 = parts[1].parse().with_context(|| at("ms"))?;
        let display_id: u32 = parts[2].parse().with_context(|| at("display"))?;
        let pointer_id: u32 = parts[3].parse().with_context(|| at("pointer"))?;
        let phase = parse_phase(parts[4]).with_context(|| at("phase"))?;
        let x: f32 = parts[5].parse().with_context(|| at("x"))?;
        let y: f32 = parts[6].parse().with_context(|| at("y"))?;

        let sample = RawPointerSample::new(display_id, pointer_id, phase, Point::new(x, y), ms);
        match batches.last_mut() {
            Some(batch) if batch.ms == ms => batch.samples.push(sample),
            _ => batches.push(TraceBatch {
                ms,
                samples: vec![sample],
            }),
        }
    }

    Ok(batches)
}

fn parse_phase(raw: &str) -> Result<PointerPhase> {
    match raw.to_ascii_lowercase().as_str() {
        "down" => Ok(PointerPhase::Down),
        "move" => Ok(PointerPhase::Move),
        "up" => Ok(PointerPhase::Up),
        "cancel" => Ok(PointerPhase::Cancel),
        other => bail!("unknown phase '{other}'"),
    }
}

fn parse_expected_labels(path: &Path) -> Result<Vec<&'static str>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut labels = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        let Some(kind) = AccessibilityEventType::from_label(&token.to_ascii_lowercase()) else {
            bail!(
                "{}:{} invalid expected event label: {token}",
                path.display(),
                idx + 1
            );
        };
        labels.push(kind.label());
    }

    Ok(labels)
}
