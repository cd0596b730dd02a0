use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tilekern::case::{identity_coefficients, KernelCase};
use tilekern::kernels::{ConvSkipParams, SkipKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a tiled kernel on synthesized inputs and check it against the reference", long_about = None)]
struct Args {
    /// Run output-channel tiles / rows on the rayon pool
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel (0 = rayon default)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a case description from a JSON file
    Case {
        path: PathBuf,
    },
    /// 1x1 convolution with skip fusion
    ConvSkip {
        #[arg(long, default_value_t = 32)]
        width: usize,
        /// Channels per activation source
        #[arg(long, default_value_t = 16)]
        input_channels: usize,
        #[arg(long, default_value_t = 8)]
        output_channels: usize,
        #[arg(long, default_value_t = 0)]
        mac_scale: u32,
        #[arg(long, default_value_t = 0)]
        skip_scale: u32,
        /// Use an unsigned skip tensor instead of a signed one
        #[arg(long)]
        unsigned_skip: bool,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// 3x3 filter over an image, identity kernel unless coefficients are given
    Filter2d {
        #[arg(long, default_value_t = 64)]
        width: usize,
        #[arg(long, default_value_t = 8)]
        height: usize,
        /// Nine comma-separated Q12 coefficients, row-major
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        coefficients: Option<Vec<i16>>,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn build_case(command: Command) -> Result<KernelCase> {
    Ok(match command {
        Command::Case { path } => KernelCase::load(path)?,
        Command::ConvSkip { width, input_channels, output_channels, mac_scale, skip_scale, unsigned_skip, seed } => {
            KernelCase::ConvSkip {
                params: ConvSkipParams::new(width, input_channels, output_channels).with_scales(mac_scale, skip_scale),
                skip_kind: if unsigned_skip { SkipKind::Unsigned } else { SkipKind::Signed },
                seed,
            }
        }
        Command::Filter2d { width, height, coefficients, seed } => {
            let coefficients = match coefficients {
                Some(c) => match <[i16; 9]>::try_from(c.as_slice()) {
                    Ok(k) => k,
                    Err(_) => bail!("expected 9 coefficients, got {}", c.len()),
                },
                None => identity_coefficients(),
            };
            KernelCase::Filter2d { width, height, coefficients, seed }
        }
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let case = build_case(args.command)?;

    let report = if args.parallel && args.threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(args.threads).build()?;
        pool.install(|| case.run(true))?
    } else {
        case.run(args.parallel)?
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.passed() {
        bail!("{} output differs from the reference in {} elements", report.kernel, report.mismatches);
    }
    Ok(())
}
