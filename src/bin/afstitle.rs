//! `afstitle image title` — set an image's disc title (spec.md §6).

#[path = "common.rs"]
mod common;

use clap::Parser;

#[derive(Parser)]
#[command(name = "afstitle", about = "Set an Acorn filing-system image's title")]
struct Cli {
    image: String,
    title: String,
}

fn main() {
    env_logger::init();
    let cli: Cli = common::parse_or_exit();

    let handle = match common::open_image(&cli.image, true) {
        Ok(h) => h,
        Err(e) => {
            common::diagnose("afstitle", &cli.image, &e);
            std::process::exit(e.exit_code());
        }
    };
    let mut fs = handle.lock().unwrap();
    if let Err(e) = fs.settitle(&cli.title) {
        common::diagnose("afstitle", &cli.image, &e);
        std::process::exit(e.exit_code());
    }
}
