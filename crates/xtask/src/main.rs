use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use xshell::{cmd, Shell};

const DEMO_SOURCE: &str = "target/demo/source";
const DEMO_EXT2: &str = "target/demo/ext2.img";
const DEMO_FAT16: &str = "target/demo/fat16.img";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "diskwalk developer tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the host binaries (diskwalk, mkimg)
    BuildHost,
    /// Build demo EXT2 and FAT16 images under target/demo
    Images,
    /// Build the demo images and run every diskwalk command on them
    Demo,
    /// Run the workspace tests
    Test,
    /// Clean build artifacts
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    let project_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .context("xtask is not inside the workspace")?;
    sh.change_dir(project_root);

    match cli.command {
        Commands::BuildHost => {
            cmd!(sh, "cargo build -p diskwalk-cli -p diskwalk-mkimg").run()?;
        }
        Commands::Images => images(&sh)?,
        Commands::Demo => {
            images(&sh)?;
            for image in [DEMO_EXT2, DEMO_FAT16] {
                println!("== {image}");
                cmd!(sh, "cargo run -q -p diskwalk-cli -- info {image}").run()?;
                cmd!(sh, "cargo run -q -p diskwalk-cli -- tree {image}").run()?;
            }
            cmd!(sh, "cargo run -q -p diskwalk-cli -- cat {DEMO_EXT2} hello.txt").run()?;
            cmd!(sh, "cargo run -q -p diskwalk-cli -- cat {DEMO_FAT16} readme.txt").run()?;
        }
        Commands::Test => {
            cmd!(sh, "cargo test --workspace").run()?;
        }
        Commands::Clean => {
            cmd!(sh, "cargo clean").run()?;
        }
    }

    Ok(())
}

/// Populate a small host tree and turn it into one image of each kind.
fn images(sh: &Shell) -> Result<()> {
    if sh.path_exists(DEMO_SOURCE) {
        sh.remove_path(DEMO_SOURCE)?;
    }
    sh.create_dir(format!("{DEMO_SOURCE}/docs"))?;
    sh.write_file(format!("{DEMO_SOURCE}/hello.txt"), "Hello from diskwalk!\n")?;
    sh.write_file(format!("{DEMO_SOURCE}/readme.txt"), "hello world")?;
    sh.write_file(format!("{DEMO_SOURCE}/docs/notes.txt"), "EXT2 and FAT16, read only.\n")?;

    cmd!(
        sh,
        "cargo run -q -p diskwalk-mkimg -- ext2 --output {DEMO_EXT2} --source {DEMO_SOURCE} --label demo --force"
    )
    .run()?;
    cmd!(
        sh,
        "cargo run -q -p diskwalk-mkimg -- fat16 --output {DEMO_FAT16} --source {DEMO_SOURCE} --label DEMO --force"
    )
    .run()?;
    Ok(())
}
