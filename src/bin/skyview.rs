//! Without arguments the built-in defaults and demo scene are used. Assets
//! are read from `./assets/`.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use skyview::{SceneDescription, ViewerConfig};

#[derive(Parser, Debug)]
#[command(name = "skyview", about = "Instanced 3D scene viewer")]
struct Cli {
    /// RON viewer config
    config: Option<PathBuf>,

    /// RON scene description
    scene: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ViewerConfig::load_from_file(&path.to_string_lossy())
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    let description = match &cli.scene {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read scene {}", path.display()))?;
            ron::from_str::<SceneDescription>(&text)
                .with_context(|| format!("cannot parse scene {}", path.display()))?
        }
        None => SceneDescription::default(),
    };

    skyview::run(config, description)
}
