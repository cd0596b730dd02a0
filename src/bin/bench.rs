use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tilekern::case::KernelCase;
use tilekern::kernels::ConvSkipParams;

#[derive(Parser, Debug)]
#[command(name = "tilekern-bench", version, about = "Time repeated kernel invocations")]
struct Args {
    /// JSON case file; defaults to a 256-wide, 64->64 channel conv_skip case
    #[arg(long)]
    case: Option<PathBuf>,

    /// Number of kernel invocations
    #[arg(long, default_value_t = 200)]
    iters: usize,

    /// Threads
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let case = match args.case.as_deref() {
        Some(path) => KernelCase::load(path)?,
        None => KernelCase::ConvSkip {
            params: ConvSkipParams::new(256, 64, 64).with_scales(8, 0),
            skip_kind: Default::default(),
            seed: 1,
        },
    };
    let inputs = case.synthesize()?;
    let mut output = vec![0u8; case.output_len()?];
    let parallel = args.threads > 1;
    let pool = rayon::ThreadPoolBuilder::new().num_threads(args.threads.max(1)).build()?;

    let pb = if args.quiet { ProgressBar::hidden() } else { ProgressBar::new(args.iters as u64) };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?,
    );
    pb.set_message(case.name());

    let t0 = Instant::now();
    pool.install(|| -> Result<()> {
        for _ in 0..args.iters {
            case.execute(&inputs, &mut output, parallel)?;
            pb.inc(1);
        }
        Ok(())
    })?;
    let dt = t0.elapsed();
    pb.finish_and_clear();

    let per_call = dt.as_secs_f64() / args.iters.max(1) as f64;
    let elems_per_s = if per_call > 0.0 { output.len() as f64 / per_call } else { 0.0 };
    println!(
        "kernel={} iters={} threads={} elapsed={:.3}s per_call={:.1}us out_elems/s={:.1}",
        case.name(),
        args.iters,
        args.threads.max(1),
        dt.as_secs_f64(),
        per_call * 1e6,
        elems_per_s
    );
    Ok(())
}
