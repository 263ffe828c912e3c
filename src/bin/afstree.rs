//! `afstree image[:start] ...` — pre-order full walk (spec.md §6).

#[path = "common.rs"]
mod common;

use clap::Parser;

#[derive(Parser)]
#[command(name = "afstree", about = "Recursively list an Acorn filing-system image")]
struct Cli {
    /// One or more `image[:start]` arguments (start defaults to `$`).
    #[arg(required = true)]
    images: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli: Cli = common::parse_or_exit();

    let mut failures = 0usize;
    for arg in &cli.images {
        let (image, start) = match arg.split_once(':') {
            Some((image, start)) if !start.is_empty() => (image, start),
            _ => (arg.as_str(), "$"),
        };
        if tree_one(image, start).is_err() {
            failures += 1;
        }
    }
    std::process::exit(failures as i32);
}

fn tree_one(image: &str, start: &str) -> Result<(), ()> {
    let handle = common::open_image(image, false).map_err(|e| common::diagnose("afstree", image, &e))?;
    let mut fs = handle.lock().unwrap();
    common::walk_from(&mut fs, start, &mut |p, obj| {
        println!("{}", common::listing_line(p, obj));
        Ok(())
    })
    .map_err(|e| common::diagnose("afstree", image, &e))
}
