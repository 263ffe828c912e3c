//! `afsmkdir image:path ...` — create an ADFS directory (spec.md §4.5/§6).

#[path = "common.rs"]
mod common;

use clap::Parser;

#[derive(Parser)]
#[command(name = "afsmkdir", about = "Create a directory in an ADFS image")]
struct Cli {
    /// One or more `image:path` arguments.
    #[arg(required = true)]
    targets: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli: Cli = common::parse_or_exit();

    let mut failures = 0usize;
    for arg in &cli.targets {
        let Some((image, path)) = common::split_image_path(arg) else {
            eprintln!("afsmkdir: {}: expected image:path", arg);
            failures += 1;
            continue;
        };
        if mkdir_one(image, path).is_err() {
            failures += 1;
        }
    }
    std::process::exit(failures as i32);
}

fn mkdir_one(image: &str, path: &str) -> Result<(), ()> {
    let handle = common::open_image(image, true).map_err(|e| common::diagnose("afsmkdir", image, &e))?;
    let mut fs = handle.lock().unwrap();
    fs.mkdir(path).map_err(|e| common::diagnose("afsmkdir", image, &e))
}
