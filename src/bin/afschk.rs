//! `afschk image ...` — consistency check; exit code is the number of
//! images that failed (spec.md §4.7/§6).

#[path = "common.rs"]
mod common;

use clap::Parser;

#[derive(Parser)]
#[command(name = "afschk", about = "Check the consistency of Acorn filing-system images")]
struct Cli {
    #[arg(required = true)]
    images: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli: Cli = common::parse_or_exit();

    let mut failed_images = 0usize;
    let stdout = std::io::stdout();
    for image in &cli.images {
        let mut sink = stdout.lock();
        match check_one(image, &mut sink) {
            Ok(0) => {}
            Ok(_) => failed_images += 1,
            Err(()) => failed_images += 1,
        }
    }
    std::process::exit(failed_images as i32);
}

fn check_one(image: &str, sink: &mut dyn std::io::Write) -> Result<usize, ()> {
    let handle = common::open_image(image, false).map_err(|e| common::diagnose("afschk", image, &e))?;
    let mut fs = handle.lock().unwrap();
    fs.check(sink, image).map_err(|e| common::diagnose("afschk", image, &e))
}
