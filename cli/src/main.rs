use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use blocky_builder::consts::DEFAULT_WORLD_SIZE;
use blocky_builder::engine::{Action, EngineCore};
use blocky_builder::grid::{Grid, GridError};
use blocky_builder::input::Tool;
use blocky_builder::tile::TileKind;
use blocky_builder::world::{LoadOptions, WorldError};
use clap::{Parser, Subcommand};


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("{path} already exists; pass --force to overwrite")]
    Exists { path: PathBuf },
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("({x}, {y}) is outside the {width}x{height} world")]
    OutOfBounds { x: i32, y: i32, width: u32, height: u32 },
    #[error("quickfill needs a second corner; pass --to X Y")]
    MissingCorner,
    #[error("--to only applies to quickfill, not {tool}")]
    UnexpectedCorner { tool: Tool },
}

#[derive(Parser, Debug)]
#[command(name = "blocky-cli", about = "Create, inspect and edit tile world files")]
struct Cli {
    /// World file to operate on.
    #[arg(long, short = 'w', env = "BLOCKY_WORLD", global = true, default_value = "world.json")]
    world: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a fresh world filled with the default terrain.
    New {
        #[arg(long, default_value_t = DEFAULT_WORLD_SIZE)]
        width: u32,
        #[arg(long, default_value_t = DEFAULT_WORLD_SIZE)]
        height: u32,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print size, view and per-kind tile counts.
    Info,
    /// Re-initialize the world at a new size. Existing tiles are discarded.
    Resize { width: u32, height: u32 },
    /// Apply one tool at a tile coordinate and save the result.
    Apply {
        tool: Tool,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        /// Kind painted by draw, fill and quickfill.
        #[arg(long)]
        kind: Option<TileKind>,
        /// Opposite corner for quickfill.
        #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
        to: Option<Vec<i32>>,
    },
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let path = cli.world.as_path();

    match cli.command {
        Command::New { width, height, force } => run_new(path, width, height, force),
        Command::Info => run_info(path),
        Command::Resize { width, height } => run_resize(path, width, height),
        Command::Apply { tool, x, y, kind, to } => {
            let corner = second_corner(tool, to.as_deref())?;
            run_apply(path, tool, (x, y), kind, corner)
        }
    }
}

/// Quickfill requires `--to`; every other tool rejects it.
fn second_corner(tool: Tool, to: Option<&[i32]>) -> Result<Option<(i32, i32)>, CliError> {
    match (tool, to) {
        (Tool::QuickFill, Some(&[x, y])) => Ok(Some((x, y))),
        (Tool::QuickFill, _) => Err(CliError::MissingCorner),
        (_, Some(_)) => Err(CliError::UnexpectedCorner { tool }),
        (_, None) => Ok(None),
    }
}

fn check_bounds(grid: &Grid, (x, y): (i32, i32)) -> Result<(), CliError> {
    if grid.contains(x, y) {
        Ok(())
    } else {
        Err(CliError::OutOfBounds { x, y, width: grid.width(), height: grid.height() })
    }
}

fn read_world(path: &Path) -> Result<EngineCore, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::Io { path: path.to_owned(), source })?;
    let mut core = EngineCore::new();
    core.load_world_json(&raw, LoadOptions { preserve_grid_preference: false })?;
    Ok(core)
}

fn write_world(path: &Path, core: &EngineCore) -> Result<(), CliError> {
    let json = core.world_data().to_json()?;
    fs::write(path, json).map_err(|source| CliError::Io { path: path.to_owned(), source })?;
    tracing::info!(path = %path.display(), "saved world");
    Ok(())
}

fn run_new(path: &Path, width: u32, height: u32, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Exists { path: path.to_owned() });
    }
    let mut core = EngineCore::new();
    core.new_world(width, height)?;
    write_world(path, &core)?;
    println!("created {width}x{height} world at {}", path.display());
    Ok(())
}

fn run_info(path: &Path) -> Result<(), CliError> {
    let core = read_world(path)?;
    let grid = &core.grid;
    let camera = core.camera();

    let mut counts: BTreeMap<TileKind, usize> = BTreeMap::new();
    let mut oriented = 0usize;
    for tile in grid.tiles() {
        *counts.entry(tile.kind).or_default() += 1;
        if tile.is_oriented() {
            oriented += 1;
        }
    }
    let cells = grid.cell_count();
    let absent = cells - grid.tile_count();

    println!("size:     {}x{}", grid.width(), grid.height());
    println!("view:     pan ({}, {}) zoom {}", camera.pan_x, camera.pan_y, camera.zoom);
    println!("grid:     {} ({:?})", if core.overlay.visible { "shown" } else { "hidden" }, core.overlay.color);
    println!("tiles:    {} of {cells} cells ({absent} absent)", grid.tile_count());
    println!("oriented: {oriented}");
    for (kind, count) in counts {
        println!("  {kind:<15} {count}");
    }
    Ok(())
}

fn run_resize(path: &Path, width: u32, height: u32) -> Result<(), CliError> {
    let mut core = read_world(path)?;
    core.resize_world(width, height)?;
    write_world(path, &core)?;
    println!("resized {} to {width}x{height}", path.display());
    Ok(())
}

fn run_apply(
    path: &Path,
    tool: Tool,
    at: (i32, i32),
    kind: Option<TileKind>,
    corner: Option<(i32, i32)>,
) -> Result<(), CliError> {
    let mut core = read_world(path)?;
    let actions = apply_edit(&mut core, tool, at, kind, corner)?;

    let changed = tiles_changed(&actions);
    for action in &actions {
        match action {
            Action::SpawnRequested { x, y } => println!("spawn requested at ({x}, {y})"),
            Action::EntityBuilderRequested => println!("no entity pending; nothing placed"),
            _ => {}
        }
    }

    if changed > 0 {
        write_world(path, &core)?;
    }
    println!("{tool} at ({}, {}): {changed} tiles changed", at.0, at.1);
    Ok(())
}

/// Validate every coordinate against the loaded world, then apply the tool.
/// Nothing is edited when a coordinate is out of bounds.
fn apply_edit(
    core: &mut EngineCore,
    tool: Tool,
    at: (i32, i32),
    kind: Option<TileKind>,
    corner: Option<(i32, i32)>,
) -> Result<Vec<Action>, CliError> {
    check_bounds(&core.grid, at)?;
    if let Some(corner) = corner {
        check_bounds(&core.grid, corner)?;
    }
    if let Some(kind) = kind {
        core.set_current_kind(kind);
    }
    core.select_tool(tool);

    let mut actions = core.apply_tool_at(at.0, at.1);
    if let Some((cx, cy)) = corner {
        actions.extend(core.apply_tool_at(cx, cy));
    }
    Ok(actions)
}

fn tiles_changed(actions: &[Action]) -> usize {
    actions
        .iter()
        .map(|a| match a {
            Action::TilesChanged { count } => *count,
            _ => 0,
        })
        .sum()
}
