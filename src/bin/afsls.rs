//! `afsls image[:pattern] ...` — one line per matching object (spec.md §6).

#[path = "common.rs"]
mod common;

use clap::Parser;

#[derive(Parser)]
#[command(name = "afsls", about = "List objects in an Acorn filing-system image")]
struct Cli {
    /// One or more `image[:pattern]` arguments (pattern defaults to `*`).
    #[arg(required = true)]
    images: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli: Cli = common::parse_or_exit();

    let mut failures = 0usize;
    for arg in &cli.images {
        let (image, pattern) = common::split_image_pattern(arg);
        if list_one(image, pattern).is_err() {
            failures += 1;
        }
    }
    std::process::exit(failures as i32);
}

fn list_one(image: &str, pattern: &str) -> Result<(), ()> {
    let handle = common::open_image(image, false).map_err(|e| common::diagnose("afsls", image, &e))?;
    let mut fs = handle.lock().unwrap();
    fs.glob(pattern, |p, obj| {
        println!("{}", common::listing_line(p, obj));
        Ok(())
    })
    .map_err(|e| common::diagnose("afsls", image, &e))
}
