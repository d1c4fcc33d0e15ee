use std::process::ExitCode;

use clap::Parser;
use dvidafs::filesystem::BlockFs;
use dvidafs::fuse_adapter::DvidaFs;
use fuser::MountOption;

/// Mount a two-level block-addressed filesystem image via FUSE.
#[derive(Parser, Debug)]
#[command(name = "dvidafs", version, about)]
struct Cli {
    /// Path to the backing disk image. Created (pre-initialised) if missing.
    image: std::path::PathBuf,

    /// Directory to mount the filesystem onto.
    mountpoint: std::path::PathBuf,

    /// Run attached to the terminal instead of daemonizing.
    #[arg(short, long, default_value_t = true)]
    foreground: bool,

    /// Mount read-only, rejecting mkdir/mknod/write at the adapter layer.
    #[arg(short, long)]
    read_only: bool,

    /// Allow other users to access the mount.
    #[arg(long)]
    allow_other: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let fs = match BlockFs::create_if_missing(&cli.image) {
        Ok(fs) => fs,
        Err(err) => {
            log::error!("failed to open image {}: {err}", cli.image.display());
            return ExitCode::FAILURE;
        }
    };

    let mut options = vec![MountOption::FSName("dvidafs".to_string())];
    if cli.read_only {
        options.push(MountOption::RO);
    }
    if cli.allow_other {
        options.push(MountOption::AllowOther);
    }
    if !cli.foreground {
        log::warn!("daemonizing is not supported on all platforms; running in foreground");
    }

    log::info!(
        "mounting {} at {}",
        cli.image.display(),
        cli.mountpoint.display()
    );
    match fuser::mount2(DvidaFs::new(fs, cli.read_only), &cli.mountpoint, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("mount failed: {err}");
            ExitCode::FAILURE
        }
    }
}
