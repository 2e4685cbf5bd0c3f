use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use latte_shader::{
    blockify, decode, disassemble, parse_fetch_shader, translate_shader, Dialect, FetchAttribute,
    ShaderOptions, ShaderType,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    Vertex,
    Pixel,
}

impl From<Stage> for ShaderType {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Vertex => ShaderType::Vertex,
            Stage::Pixel => ShaderType::Pixel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// R600-style listing of the raw microcode
    Disasm,
    /// Recovered loop/conditional structure
    Blocks,
    Glsl,
    Hlsl,
}

#[derive(Parser, Debug)]
#[command(
    name = "latte-shader-dump",
    about = "Disassemble or translate a Latte (Wii U GPU) shader binary."
)]
struct Args {
    /// Shader microcode binary
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Pipeline stage the binary runs in
    #[arg(long, value_enum, default_value_t = Stage::Vertex)]
    stage: Stage,

    #[arg(long, value_enum, default_value_t = Mode::Glsl)]
    mode: Mode,

    /// Fetch shader describing the vertex layout (vertex stage only)
    #[arg(long, value_name = "PATH")]
    fetch: Option<PathBuf>,

    /// Read constants from a flat register array instead of uniform blocks
    #[arg(long, action = clap::ArgAction::SetTrue)]
    dx9_consts: bool,

    /// Fail when any instruction has no translation
    #[arg(long, action = clap::ArgAction::SetTrue)]
    strict: bool,

    /// Declare pixel shader inputs without interpolation
    #[arg(long, action = clap::ArgAction::SetTrue)]
    flat_inputs: bool,

    /// Write the output here instead of stdout
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let binary =
        fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let ty = ShaderType::from(args.stage);

    let text = match args.mode {
        Mode::Disasm => disassemble(&binary),
        Mode::Blocks => {
            let mut shader = decode(ty, &binary).context("decode shader")?;
            blockify(&mut shader).context("recover control flow")?;
            shader.dump_blocks()
        }
        Mode::Glsl | Mode::Hlsl => {
            let dialect = if args.mode == Mode::Hlsl {
                Dialect::Hlsl
            } else {
                Dialect::Glsl
            };
            let attributes = load_attributes(&args, ty)?;
            let options = ShaderOptions {
                dialect,
                dx9_consts: args.dx9_consts,
                allow_partial: !args.strict,
                fallback_to_passthrough: false,
                flat_inputs: args.flat_inputs,
            };
            let translated = translate_shader(ty, &binary, &attributes, options)
                .with_context(|| format!("translate {} shader", ty.name()))?;
            if !translated.complete {
                tracing::warn!("output contains unimplemented instructions");
            }
            translated.source
        }
    };

    match &args.output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn load_attributes(args: &Args, ty: ShaderType) -> anyhow::Result<Vec<FetchAttribute>> {
    let Some(path) = &args.fetch else {
        return Ok(Vec::new());
    };
    if ty != ShaderType::Vertex {
        bail!("--fetch only applies to vertex shaders");
    }
    let binary = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    parse_fetch_shader(&binary).with_context(|| format!("parse fetch shader {}", path.display()))
}
