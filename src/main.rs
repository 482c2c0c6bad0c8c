use std::path::PathBuf;

use clap::Parser;
use hardness::{input, model};

/// Builds axisymmetric indentation meshes and writes the solver input deck
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Model description (json)
    input_json: String,

    /// Directory receiving the .geo, .msh and .inp files
    #[arg(short, long, default_value = ".")]
    workdir: PathBuf,

    /// gmsh executable, overrides the input file
    #[arg(long)]
    gmsh: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut input = match input::load_input_file(&args.input_json) {
        Ok(i) => i,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1)
        }
    };
    if let Some(gmsh) = args.gmsh {
        input.gmsh_path = gmsh;
    }

    if let Err(err) = std::fs::create_dir_all(&args.workdir) {
        eprintln!("Unable to create work directory {}: {err}", args.workdir.display());
        std::process::exit(1)
    }

    let model = model::Indentation2D::from_input(input, args.workdir);
    if let Err(err) = model.write_input() {
        eprintln!("{err}");
        std::process::exit(1)
    }
}
