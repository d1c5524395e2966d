use std::{env, fs, io::Write, process};

use pnginflate::{DecoderConfig, PngFile};

fn main() -> Result<(), std::io::Error> {
  let args: Vec<String> = env::args().collect();

  if args.len() != 3 {
    println!("Usage: {} <infile.png> <json-out>", &args[0]);
    println!("\tDumps a JSON representation of a PNG file's chunk structure to disk");
    process::exit(1);
  }

  let data = fs::read(&args[1])?;
  let png = match PngFile::parse(&data, &DecoderConfig::default()) {
    Ok(png) => png,
    Err(e) => {
      println!("{} is not a readable PNG: {}", args[1], e);
      process::exit(1);
    }
  };

  let json_string = serde_json::to_string(&png.info())?;

  let mut outfile = fs::OpenOptions::new()
    .write(true)
    .create(true)
    .truncate(true)
    .open(&args[2])?;
  outfile.write_all(json_string.as_bytes())?;
  println!("Output written to {}", args[2]);

  Ok(())
}
