//! `ide2scsi <ide-file> <scsi-file>` — drops the padding byte IDE
//! interleaving adds after every logical byte, restoring a plain SCSI-style
//! byte stream (spec.md §1, grounded in `original_source/ide2scsi.c`).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use clap::Parser;

#[derive(Parser)]
#[command(name = "ide2scsi", about = "Convert an IDE-interleaved dump to a plain SCSI-style byte stream")]
struct Cli {
    ide_file: String,
    scsi_file: String,
}

fn main() {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(c) => c,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let in_fp = match File::open(&cli.ide_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("ide2scsi: unable to open '{}' for reading: {}", cli.ide_file, e);
            std::process::exit(2);
        }
    };
    let mut out_fp = match File::create(&cli.scsi_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("ide2scsi: unable to open '{}' for writing: {}", cli.scsi_file, e);
            std::process::exit(3);
        }
    };

    let mut reader = BufReader::new(in_fp);
    let mut writer = BufWriter::new(&mut out_fp);
    let mut pair = [0u8; 2];
    loop {
        let n = match reader.read(&mut pair[..1]) {
            Ok(0) => break,
            Ok(_) => 1,
            Err(e) => {
                eprintln!("ide2scsi: read error on '{}': {}", cli.ide_file, e);
                std::process::exit(4);
            }
        };
        debug_assert_eq!(n, 1);
        if let Err(e) = writer.write_all(&pair[..1]) {
            eprintln!("ide2scsi: write error on '{}': {}", cli.scsi_file, e);
            std::process::exit(4);
        }
        // Discard the padding byte; a short final byte (odd-length input)
        // is tolerated rather than treated as an error.
        let _ = reader.read(&mut pair[1..2]);
    }
    if let Err(e) = writer.flush() {
        eprintln!("ide2scsi: write error on '{}': {}", cli.scsi_file, e);
        std::process::exit(4);
    }
}
