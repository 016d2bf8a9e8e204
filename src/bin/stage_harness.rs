use std::fs::{self, File};

use anyhow::{anyhow, bail, Context, Result};
use kestrel_stage::cli::HarnessArgs;
use kestrel_stage::script_harness::{load_fixture, run_fixture_in, HarnessOutput};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    if let Err(err) = run_cli() {
        eprintln!("[stage-harness] error: {err:?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = HarnessArgs::parse_from_env()?;
    if args.help {
        print_help();
        return Ok(());
    }
    let fixture_path = args.fixture.as_ref().ok_or_else(|| anyhow!("--fixture <path> is required"))?;
    let (mut fixture, base) = load_fixture(fixture_path)?;
    if let Some(frames) = args.frames {
        fixture.frames = frames;
    }
    fixture.merge_overrides(&args.config_overrides());
    let output = run_fixture_in(&fixture, &base)?;

    if let Some(path) = &args.write_output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating output directory '{}'", parent.display()))?;
            }
        }
        let file = File::create(path).with_context(|| format!("writing harness output to '{}'", path.display()))?;
        serde_json::to_writer_pretty(file, &output).with_context(|| "serializing harness output")?;
        println!("[stage-harness] wrote {}", path.display());
    }

    if let Some(path) = &args.golden {
        let file = File::open(path).with_context(|| format!("opening golden file '{}'", path.display()))?;
        let expected: HarnessOutput = serde_json::from_reader(file).with_context(|| "parsing golden JSON")?;
        if expected != output {
            bail!(
                "golden mismatch for {} (use --write-output to refresh):\nexpected: {}\nactual:   {}",
                fixture_path.display(),
                serde_json::to_string(&expected).unwrap_or_default(),
                serde_json::to_string(&output).unwrap_or_default(),
            );
        }
        println!("[stage-harness] matched golden {}", path.display());
    } else if args.write_output.is_none() {
        serde_json::to_writer_pretty(std::io::stdout(), &output)?;
        println!();
    }

    Ok(())
}

fn print_help() {
    println!("Usage: stage_harness --fixture <path> [--frames <n>] [--seed <n>] [--shot-max <n>] [--item-max <n>]");
    println!("                     [--golden <path>] [--write-output <path>]");
    println!("  --fixture        Path to a harness fixture JSON file");
    println!("  --frames         Frames to simulate (overrides the fixture)");
    println!("  --seed           RNG seed for deterministic runs");
    println!("  --shot-max       Shot capacity override");
    println!("  --item-max       Item capacity override");
    println!("  --golden         Optional golden output file to compare against");
    println!("  --write-output   Optional path to write the actual output JSON");
}
