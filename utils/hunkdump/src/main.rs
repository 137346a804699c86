use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;

use dos::hunk::{
    class_flags, split_size_word, tag_name, HunkReader, CLASS_CHIP, CLASS_EXPLICIT, CLASS_FAST,
    HUNK_BSS, HUNK_CODE, HUNK_DATA, HUNK_DEBUG, HUNK_END, HUNK_HEADER, HUNK_RELOC32, HUNK_SYMBOL,
    VALUE_MASK,
};
use types::MemFlags;

/// Structure dump for hunk-format binaries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the hunk binary to inspect
    binary: PathBuf,

    /// Payload bytes previewed per code/data record
    #[arg(short, long, default_value_t = 16)]
    preview: usize,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let bytes = fs::read(&args.binary)
        .with_context(|| format!("failed to read {}", args.binary.display()))?;
    println!("{} {}", "hunkdump".bold().blue(), args.binary.display());
    println!("  {} bytes on disk", bytes.len());

    let mut r = HunkReader::new(Cursor::new(bytes));

    let magic = r.word()?;
    if magic != HUNK_HEADER {
        bail!("not a hunk binary: leading word 0x{magic:08x}");
    }
    let table_size = r.word()?;
    let first = r.word()?;
    let last = r.word()?;
    println!();
    println!("{}", "Header".bold());
    println!("  table size {table_size}, active hunks {first}..{last}");
    if table_size == 0 || first > last || last >= table_size {
        bail!("bad hunk table geometry");
    }

    for index in first..=last {
        let (class, words) = split_size_word(r.word()?);
        let requirement = match class_flags(class) {
            Some(_) => class_name(class).to_string(),
            None => {
                let explicit = MemFlags::from_bits_truncate(r.word()?);
                format!("explicit {explicit:?}")
            }
        };
        println!("  hunk {index}: {words} words ({} bytes), memory {requirement}", words * 4);
    }

    println!();
    println!("{}", "Records".bold());
    let mut current = first;
    while current <= last {
        let tag = r.word()? & VALUE_MASK;
        match tag {
            HUNK_CODE | HUNK_DATA => {
                let words = r.word()?;
                let payload = r.bytes(words as usize * 4)?;
                let keep = payload.len().min(args.preview);
                let preview = if keep == 0 {
                    String::from("(uninitialized)")
                } else {
                    hex::encode(&payload[..keep])
                };
                println!("  hunk {current}: {} {words} words  {}", tag_name(tag).green(), preview.dimmed());
            }
            HUNK_BSS => {
                let words = r.word()?;
                println!("  hunk {current}: {} {words} words", tag_name(tag).green());
            }
            HUNK_RELOC32 => {
                loop {
                    let count = r.word()?;
                    if count == 0 {
                        break;
                    }
                    let target = r.word()?;
                    r.skip_words(count)?;
                    println!(
                        "  hunk {current}: {} {count} offsets into hunk {target}",
                        tag_name(HUNK_RELOC32).yellow()
                    );
                }
            }
            HUNK_SYMBOL => loop {
                let name_words = r.word()?;
                if name_words == 0 {
                    break;
                }
                let raw = r.bytes(name_words as usize * 4)?;
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                let name = String::from_utf8_lossy(&raw[..end]).into_owned();
                let value = r.word()?;
                println!("  hunk {current}: {} {name} = +0x{value:x}", "SYMBOL".cyan());
            },
            HUNK_DEBUG => {
                let words = r.word()?;
                r.skip_words(words)?;
                println!("  hunk {current}: {} {words} words skipped", tag_name(HUNK_DEBUG).dimmed());
            }
            HUNK_END => {
                println!("  hunk {current}: {}", tag_name(HUNK_END));
                current += 1;
            }
            other => bail!("unknown record 0x{other:08x} in hunk {current}"),
        }
    }

    println!();
    println!("{}", "OK".bold().green());
    Ok(())
}

fn class_name(class: u32) -> &'static str {
    match class {
        CLASS_CHIP => "chip",
        CLASS_FAST => "fast",
        CLASS_EXPLICIT => "explicit",
        _ => "any",
    }
}
