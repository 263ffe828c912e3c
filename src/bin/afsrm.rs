//! `afsrm image:pattern ...` — DFS-only remove (spec.md §4.6/§6).

#[path = "common.rs"]
mod common;

use clap::Parser;

#[derive(Parser)]
#[command(name = "afsrm", about = "Remove matching objects from a DFS image")]
struct Cli {
    /// One or more `image:pattern` arguments.
    #[arg(required = true)]
    targets: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli: Cli = common::parse_or_exit();

    let mut failures = 0usize;
    for arg in &cli.targets {
        let Some((image, pattern)) = common::split_image_path(arg) else {
            eprintln!("afsrm: {}: expected image:pattern", arg);
            failures += 1;
            continue;
        };
        if remove_one(image, pattern).is_err() {
            failures += 1;
        }
    }
    std::process::exit(failures as i32);
}

fn remove_one(image: &str, pattern: &str) -> Result<(), ()> {
    let handle = common::open_image(image, true).map_err(|e| common::diagnose("afsrm", image, &e))?;
    let mut fs = handle.lock().unwrap();
    let removed = fs.remove(pattern).map_err(|e| common::diagnose("afsrm", image, &e))?;
    log::info!("{}: removed {} object(s) matching {}", image, removed, pattern);
    Ok(())
}
