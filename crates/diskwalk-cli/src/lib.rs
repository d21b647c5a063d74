//! Argument parsing and command dispatch for the `diskwalk` binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use diskwalk_core::{render_tree, Detection, Filesystem, FsError, Volume, WalkOptions};
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod info;
pub mod render;

use render::TextRenderer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Recognise FAT16 by its cluster count instead of the type string
    #[arg(long, global = true)]
    pub strict: bool,

    /// When to color directory names
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print superblock or boot sector details
    Info {
        /// Path to the disk image
        image: PathBuf,
    },
    /// Print the directory tree
    Tree {
        /// Path to the disk image
        image: PathBuf,

        /// Include EXT2's lost+found directory
        #[arg(long)]
        show_lost_found: bool,

        /// Deepest level to print; 0 lists the root only
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Write a file's contents to stdout
    Cat {
        /// Path to the disk image
        image: PathBuf,

        /// File name to search for
        name: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn enabled(self, is_terminal: bool) -> bool {
        match self {
            ColorChoice::Auto => is_terminal,
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

impl Cli {
    pub fn detection(&self) -> Detection {
        if self.strict {
            Detection::ClusterCount
        } else {
            Detection::Signature
        }
    }

    fn image(&self) -> &Path {
        match &self.command {
            Commands::Info { image } | Commands::Tree { image, .. } | Commands::Cat { image, .. } => {
                image
            }
        }
    }
}

/// Run one command, writing its output to `out`.
///
/// `out_is_terminal` resolves `--color auto` for `out`. A `cat` that finds
/// nothing prints "File not found." and succeeds.
pub fn run<W: Write>(cli: &Cli, out: &mut W, out_is_terminal: bool) -> Result<()> {
    let image = cli.image();
    let mut volume = Volume::open_path(image, cli.detection())
        .with_context(|| format!("opening {}", image.display()))?;
    debug!("{} opened as {}", image.display(), volume.kind());

    match &cli.command {
        Commands::Info { .. } => match &volume {
            Volume::Ext2(ext2) => info::write_ext2(out, ext2.superblock())?,
            Volume::Fat16(fat16) => info::write_fat16(out, fat16.boot_sector())?,
        },
        Commands::Tree {
            show_lost_found,
            max_depth,
            ..
        } => {
            let options = WalkOptions {
                hide_lost_found: !show_lost_found,
                max_depth: *max_depth,
            };
            let color = cli.color.enabled(out_is_terminal);
            let mut renderer = TextRenderer::new(&mut *out, color);
            let lines = render_tree(volume.walk(options), &mut renderer)?;
            debug!("{lines} entries printed");
        }
        Commands::Cat { name, .. } => match volume.cat(name, out) {
            Ok(bytes) => debug!("{name}: {bytes} bytes"),
            Err(FsError::NotFound(_)) => writeln!(out, "File not found.")?,
            Err(e) => return Err(e.into()),
        },
    }
    out.flush()?;
    Ok(())
}

/// Whether `err` came from an image that is neither EXT2 nor FAT16.
pub fn is_unknown_format(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<FsError>(),
        Some(FsError::UnsupportedFormat)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_flags() {
        let cli = Cli::parse_from([
            "diskwalk",
            "tree",
            "disk.img",
            "--show-lost-found",
            "--max-depth",
            "2",
        ]);
        match cli.command {
            Commands::Tree {
                image,
                show_lost_found,
                max_depth,
            } => {
                assert_eq!(image, PathBuf::from("disk.img"));
                assert!(show_lost_found);
                assert_eq!(max_depth, Some(2));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.color, ColorChoice::Auto);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "diskwalk", "cat", "fat.img", "README.TXT", "--strict", "--color", "never",
        ]);
        assert!(cli.strict);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.detection(), Detection::ClusterCount);
        assert!(matches!(cli.command, Commands::Cat { ref name, .. } if name == "README.TXT"));
    }

    #[test]
    fn defaults_to_signature_detection() {
        let cli = Cli::parse_from(["diskwalk", "info", "disk.img"]);
        assert!(!cli.strict);
        assert_eq!(cli.detection(), Detection::Signature);
    }

    #[test]
    fn cat_needs_a_name() {
        assert!(Cli::try_parse_from(["diskwalk", "cat", "disk.img"]).is_err());
        assert!(Cli::try_parse_from(["diskwalk", "frobnicate", "disk.img"]).is_err());
    }

    #[test]
    fn auto_color_follows_the_terminal() {
        assert!(ColorChoice::Auto.enabled(true));
        assert!(!ColorChoice::Auto.enabled(false));
        assert!(ColorChoice::Always.enabled(false));
        assert!(!ColorChoice::Never.enabled(true));
    }
}
