use std::env;
use std::fs;
use std::process;

use ansi_term::Colour::{Purple, Red, Yellow};

use pnginflate::png::byte::fmt_hex_dump;
use pnginflate::{logging, DecodeError, DecoderConfig, ErrorCategory, PngFile};

fn report(err: &DecodeError) -> ! {
  let colour = match err.category() {
    ErrorCategory::Structural => Red,
    ErrorCategory::Unsupported => Yellow,
    ErrorCategory::Corruption => Purple,
  };
  eprintln!("{}: {}", colour.bold().paint(err.category().to_string()), err);
  process::exit(1);
}

fn main() {
  let args: Vec<String> = env::args().collect();

  if args.len() != 2 && args.len() != 3 {
    println!("Usage: {} <infile.png> [config.json]", &args[0]);
    println!("\tDisplays the structure of a PNG file and decodes its image data");
    process::exit(1);
  }

  let verbose = env::var_os("PNGINFLATE_VERBOSE").is_some();
  if let Err(e) = logging::init(verbose) {
    eprintln!("Could not install logger: {}", e);
  }

  let config = match args.get(2) {
    Some(path) => {
      let json = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Could not read config file {}: {}", path, e));
      DecoderConfig::from_json(&json)
        .unwrap_or_else(|e| panic!("Could not parse config file {}: {}", path, e))
    }
    None => DecoderConfig::default(),
  };

  let data = fs::read(&args[1]).unwrap_or_else(|e| panic!("Could not open {}: {}", args[1], e));

  let png = PngFile::parse(&data, &config).unwrap_or_else(|e| report(&e.into()));
  println!("{}", png.info());
  println!("IDAT payload is {} bytes", png.idat_payload().len());

  println!("Attempting to decode data...");
  let decoded = png.decode(&config).unwrap_or_else(|e| report(&e));
  println!("Decoded data is {} bytes", decoded.len());

  let mut dump = String::new();
  fmt_hex_dump(&mut dump, &decoded, 1 + png.ihdr().width as usize * png.ihdr().channels())
    .expect("writing to a String cannot fail");
  print!("{}", dump);
}
