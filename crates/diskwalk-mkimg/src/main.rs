use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use diskwalk_mkimg::{populate_from_host, Ext2Builder, Fat16Builder, ImageBuilder};
use log::info;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Ext2,
    Fat16,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Build a small EXT2 or FAT16 image")]
struct Cli {
    /// Filesystem to create
    #[arg(value_enum)]
    format: Format,

    /// Path of the image to write
    #[arg(short, long)]
    output: PathBuf,

    /// Host directory whose contents are copied into the image
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// EXT2 volume name or FAT16 volume label
    #[arg(short, long)]
    label: Option<String>,

    /// Overwrite an existing image
    #[arg(short, long)]
    force: bool,
}

fn build<B: ImageBuilder>(mut builder: B, source: Option<&Path>) -> Result<Vec<u8>> {
    if let Some(dir) = source {
        populate_from_host(&mut builder, dir)
            .with_context(|| format!("copying {}", dir.display()))?;
    }
    Ok(builder.build()?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.output.exists() && !cli.force {
        bail!("{} exists; pass --force to overwrite", cli.output.display());
    }

    let source = cli.source.as_deref();
    let image = match cli.format {
        Format::Ext2 => {
            let mut builder = Ext2Builder::new();
            if let Some(label) = &cli.label {
                builder = builder.volume_name(label);
            }
            build(builder, source)?
        }
        Format::Fat16 => {
            let mut builder = Fat16Builder::new();
            if let Some(label) = &cli.label {
                builder = builder.volume_label(label);
            }
            build(builder, source)?
        }
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.output)
        .with_context(|| format!("opening {}", cli.output.display()))?;
    file.write_all(&image)?;
    info!(
        "wrote {:?} image {} ({} bytes)",
        cli.format,
        cli.output.display(),
        image.len()
    );
    Ok(())
}
