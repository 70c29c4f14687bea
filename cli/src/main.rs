//! `fontcloak`: scramble text and build the font that unscrambles it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fontcloak::{
    encode_base64, CharacterMapping, Distortion, EncryptOptions, Encryptor, ExclusionSet,
    Flavor, Font, RemapMode, VariantPairs,
};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Scramble text with a substitution cipher and build a font that renders
/// the scrambled text as the original.
#[derive(Parser)]
#[command(name = "fontcloak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Raise the log level, once for info and twice for debug
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scramble a text and write the decryption font
    Encrypt(EncryptArgs),
    /// Unscramble a text with a saved mapping
    Decrypt(DecryptArgs),
}

#[derive(clap::Args)]
struct EncryptArgs {
    /// The plain text file
    #[arg(short = 'f', long = "file")]
    input: PathBuf,

    /// Where to write the scrambled text
    #[arg(short = 's', long = "save")]
    output: PathBuf,

    /// The font to build the decryption font from
    #[arg(long)]
    font: Option<PathBuf>,

    /// The face to use if the font is a collection
    #[arg(long, default_value_t = 0)]
    face_index: u32,

    /// Where to write the decryption font; the extension picks the format
    /// (.ttf, .otf, .woff, .ttx)
    #[arg(short = 't', long = "font-out", requires = "font")]
    font_out: Option<PathBuf>,

    /// Write the font as base64 text
    #[arg(long, requires = "font_out")]
    base64: bool,

    /// Use this mapping instead of generating one
    #[arg(long)]
    map: Option<PathBuf>,

    /// Where to write the mapping
    #[arg(long)]
    save_map: Option<PathBuf>,

    /// The seed of the generated mapping
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// The regular expression selecting scrambled characters; empty means all
    #[arg(long, default_value = fontcloak::alphabet::DEFAULT_PATTERN)]
    pattern: String,

    /// A file whose characters are never scrambled
    #[arg(long)]
    skip: Option<PathBuf>,

    /// A table of variant characters, one group per line
    #[arg(long)]
    variants: Option<PathBuf>,

    /// Add noise to the outlines of the decryption font
    #[arg(long)]
    noise: bool,

    /// The largest change of a coordinate, in font units
    #[arg(long, default_value_t = 10, requires = "noise")]
    noise_magnitude: u16,

    /// The share of points changed per glyph, in (0, 1]
    #[arg(long, default_value_t = 0.2, requires = "noise")]
    noise_frequency: f64,

    /// Seed the noise for reproducible fonts
    #[arg(long, requires = "noise")]
    noise_seed: Option<u64>,

    /// How the font is remapped
    #[arg(long, value_enum, default_value_t = RemapArg::Outlines)]
    remap: RemapArg,
}

#[derive(clap::Args)]
struct DecryptArgs {
    /// The scrambled text file
    #[arg(short = 'f', long = "file")]
    input: PathBuf,

    /// Where to write the plain text
    #[arg(short = 's', long = "save")]
    output: PathBuf,

    /// The mapping the text was scrambled with
    #[arg(long)]
    map: Option<PathBuf>,
}

#[derive(Copy, Clone, ValueEnum)]
enum RemapArg {
    /// Move outlines between glyphs
    Outlines,
    /// Rewrite the character map
    Cmap,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Encrypt(args) => encrypt(args),
        Commands::Decrypt(args) => decrypt(args),
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over the flags.
fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();
}

fn encrypt(args: EncryptArgs) -> Result<()> {
    let text = read_text(&args.input)?;

    let exclusions = match &args.skip {
        Some(path) => ExclusionSet::from_text(&read_text(path)?),
        None => ExclusionSet::default(),
    };
    let variants = match &args.variants {
        Some(path) => Some(VariantPairs::parse(&read_text(path)?)),
        None => None,
    };
    let distortion = args.noise.then(|| Distortion {
        magnitude: args.noise_magnitude,
        frequency: args.noise_frequency,
        targets: None,
    });
    let remap = match args.remap {
        RemapArg::Outlines => RemapMode::Outlines,
        RemapArg::Cmap => RemapMode::CharMap,
    };

    let options = EncryptOptions {
        pattern: args.pattern.clone(),
        exclusions,
        seed: args.seed,
        variants,
        distortion,
        remap,
    };
    let encryptor = Encryptor::new(options).context("invalid encryption options")?;

    let mapping = match &args.map {
        Some(path) => Some(read_mapping(path)?),
        None => None,
    };

    let mapping = match &args.font {
        Some(font_path) => {
            let font = Font::open(font_path, args.face_index)
                .with_context(|| format!("failed to load font {}", font_path.display()))?;

            let mut rng = match args.noise_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let encrypted = encryptor.encrypt(&text, &font, mapping.as_ref(), &mut rng)?;
            if !encrypted.unsupported.is_empty() {
                warn!("{} characters are not in the font and stay readable", encrypted.unsupported.len());
            }
            write_text(&args.output, &encrypted.text)?;

            if let Some(font_out) = &args.font_out {
                write_font(&encrypted.font, font_out, args.base64)?;
            }

            encrypted.mapping
        }
        None => {
            let (cipher_text, mapping) = encryptor.encrypt_text(&text, mapping.as_ref())?;
            write_text(&args.output, &cipher_text)?;
            mapping
        }
    };

    info!("scrambled {} characters", mapping.len());

    if let Some(path) = &args.save_map {
        write_text(path, &mapping.to_json()?)?;
    }

    Ok(())
}

fn decrypt(args: DecryptArgs) -> Result<()> {
    let text = read_text(&args.input)?;
    let mapping = match &args.map {
        Some(path) => Some(read_mapping(path)?),
        None => None,
    };

    let encryptor = Encryptor::new(EncryptOptions::default())?;
    let plain = encryptor.decrypt_text(&text, mapping.as_ref()).context("cannot decrypt")?;
    write_text(&args.output, &plain)
}

/// Save the font in the format its path asks for. With `base64`, a trailing
/// `.b64` or `.txt` extension is ignored when picking the format.
fn write_font(font: &Font, path: &Path, base64: bool) -> Result<()> {
    let format_path = match path.extension().and_then(|ext| ext.to_str()) {
        Some("b64" | "txt") if base64 => path.with_extension(""),
        _ => path.to_path_buf(),
    };

    let flavor = Flavor::from_path(&format_path)?;
    let data = font
        .save(flavor)
        .with_context(|| format!("failed to write font {}", path.display()))?;

    if base64 {
        write_text(path, &encode_base64(&data))
    } else {
        fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn read_mapping(path: &Path) -> Result<CharacterMapping> {
    let json = read_text(path)?;
    CharacterMapping::from_json(&json)
        .with_context(|| format!("failed to read mapping {}", path.display()))
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
