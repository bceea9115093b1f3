use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use sfas_asm::{
    AsmFile, Chunk, Importer, RenderOptions, Session, render_diagnostics_with_options,
};
use sfas_gfx::{CgxFile, LoadingStrategy, QUADRANT_COUNT, ScrFile};
use sfas_map::{Event, MapData};
use sfas_sprite::SpriteSheet;

#[derive(Debug, Parser)]
#[command(
    name = "sfas",
    version,
    about = "Asset import tools for 16-bit console game sources",
    long_about = None,
    after_help = "Examples:\n  sfas asm level1.asm\n  sfas map level1.asm --include macros.asm\n  sfas cgx ships.cgx --format 1\n  sfas scr title.scr\n  sfas sprites sprites.asm"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import an assembly source file and list its chunks.
    Asm(SourceArgs),
    /// Decode the level-script events of a source file.
    Map(SourceArgs),
    /// Inspect a planar tile graphics file.
    Cgx(CgxArgs),
    /// Inspect a tile-map screen file.
    Scr(ScrArgs),
    /// Lay out the sprite banks defined by a source file.
    Sprites(SourceArgs),
}

#[derive(Debug, Parser)]
struct SourceArgs {
    /// Input assembly source file.
    #[arg(value_name = "INPUT")]
    input: PathBuf,
    /// Previously written source files whose macros should be in scope.
    #[arg(short = 'I', long = "include", value_name = "FILE")]
    includes: Vec<PathBuf>,
}

#[derive(Debug, Parser)]
struct CgxArgs {
    /// Input tile graphics file.
    #[arg(value_name = "INPUT")]
    input: PathBuf,
    /// Graphics format index: 0 = 2bpp, 1 = 4bpp, 2 = 8bpp.
    #[arg(short = 'f', long = "format", value_name = "INDEX", default_value_t = 1)]
    format: u8,
}

#[derive(Debug, Parser)]
struct ScrArgs {
    /// Input screen file.
    #[arg(value_name = "INPUT")]
    input: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Asm(args)) => asm_command(args),
        Some(Commands::Map(args)) => map_command(args),
        Some(Commands::Cgx(args)) => cgx_command(args),
        Some(Commands::Scr(args)) => scr_command(args),
        Some(Commands::Sprites(args)) => sprites_command(args),
        None => {
            print_banner();
            println!();
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn print_banner() {
    println!("SFAS asset tools, version {}.", env!("CARGO_PKG_VERSION"));
    println!("Imports assembly sources, level scripts, and CGX/SCR graphics.");
}

fn stderr_supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stderr().is_terminal()
}

/// Imports the input with every runtime macro family in scope, printing any
/// import warnings to stderr.
fn import_source_file(input: &Path, include_paths: &[PathBuf]) -> anyhow::Result<AsmFile> {
    let includes = include_paths
        .iter()
        .map(|path| {
            let importer = Importer::with_session(known_names_session());
            Ok(importer.import_path(path)?.file)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut session = known_names_session();
    for file in &includes {
        session.add_include(file);
    }

    let text = std::fs::read_to_string(input)?;
    let importer = Importer::with_session(session);
    let output = importer.import_source(&input.display().to_string(), &text)?;

    if !output.warnings.is_empty() {
        let options = RenderOptions {
            color: stderr_supports_color(),
        };
        eprintln!(
            "{}",
            render_diagnostics_with_options(&text, &output.warnings, options)
        );
    }

    Ok(output.file)
}

fn known_names_session() -> Session<'static> {
    let mut session = Session::new();
    session.register_names(sfas_map::SCRIPT_MACRO_NAMES.iter().copied());
    session.register_names(sfas_sprite::SPRITE_MACRO_NAMES.iter().copied());
    session
}

fn asm_command(args: SourceArgs) -> anyhow::Result<()> {
    let file = import_source_file(&args.input, &args.includes)?;

    for chunk in file.chunks() {
        let origin = chunk.origin();
        println!(
            "{:>5}  {:<24} {}",
            origin.line,
            format!("{:?}", chunk.kind()),
            chunk_summary(chunk)
        );
    }
    println!(
        "{} chunks, {} macros, {} constants",
        file.chunks().len(),
        file.macros().count(),
        file.constants().count()
    );
    Ok(())
}

fn chunk_summary(chunk: &Chunk) -> String {
    match chunk {
        Chunk::Comment(comment) => format!("; {}", comment.text),
        Chunk::Label(label) => format!("{}:", label.symbol),
        Chunk::Macro(def) if def.is_valid => {
            format!("{} ({} body chunks)", def.header_text(), def.body.len())
        }
        Chunk::Macro(def) => format!("{} (invalid header)", def.name),
        Chunk::Invocation(invocation) => {
            let args: Vec<&str> = invocation
                .args
                .iter()
                .map(|arg| arg.text.as_str())
                .collect();
            format!("{} {}", invocation.name, args.join(","))
        }
        Chunk::Line(line) => line.text.trim().to_string(),
    }
}

fn map_command(args: SourceArgs) -> anyhow::Result<()> {
    let file = import_source_file(&args.input, &args.includes)?;
    let data = MapData::decode(&file);

    for (index, event) in data.events().iter().enumerate() {
        println!(
            "{:>4}  delay {:>5}  t {:>7}  {}",
            index,
            data.delay_at(index).unwrap_or(0),
            data.cumulative_delay(index),
            event_summary(event)
        );
    }
    println!("{} events", data.len());
    Ok(())
}

fn event_summary(event: &Event) -> String {
    match event {
        Event::Wait(wait) => format!("wait {}", wait.frames),
        Event::End(_) => "end".to_string(),
        Event::PathObject(object) => format!(
            "object {} on {} at ({}, {}, {}) hp {} ap {}",
            object.shape, object.path, object.x, object.y, object.z, object.hp, object.ap
        ),
        Event::VariableSet(var) => format!("set {} = {}", var.slot, var.value),
    }
}

fn cgx_command(args: CgxArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.input)?;
    let file = CgxFile::new(bytes, LoadingStrategy::Standard, args.format)?;
    println!(
        "{}: {} bytes, {} bpp, {} tiles",
        args.input.display(),
        file.raw().len(),
        file.depth().bits_per_pixel(),
        file.tile_count()
    );
    Ok(())
}

fn scr_command(args: ScrArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.input)?;
    let file = ScrFile::decode(&bytes)?;
    for quadrant in 0..QUADRANT_COUNT {
        let visible = (0..sfas_gfx::CELLS_PER_QUADRANT)
            .filter(|&index| file.is_visible(quadrant, index).unwrap_or(false))
            .count();
        println!("quadrant {quadrant}: {visible} visible cells");
    }
    Ok(())
}

fn sprites_command(args: SourceArgs) -> anyhow::Result<()> {
    let file = import_source_file(&args.input, &args.includes)?;
    let sheet = SpriteSheet::layout(&file);

    for bank in sheet.banks() {
        println!("bank {} ({} sprites)", bank.name, bank.len());
        for sprite in bank.sprites() {
            println!(
                "  {:<16} {:>3},{:>3}  {}x{}{}",
                sprite.name,
                sprite.x,
                sprite.y,
                sprite.w,
                sprite.h,
                if sprite.hi { "  hi" } else { "" }
            );
        }
    }
    Ok(())
}
