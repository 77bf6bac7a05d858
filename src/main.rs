use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use spotcheck::capture::{screenshot, screenshot_diff, CaptureOptions, FileCssBuilder, State};
use spotcheck::diff::visual_diff;
use spotcheck::pool::new_pool;

/// Spotcheck - Visual regression testing with headless browser capture
#[derive(Parser, Debug)]
#[command(
    name = "spotcheck",
    about = "Capture screenshot baselines of HTML elements and diff them against prior runs",
    after_help = "ENVIRONMENT VARIABLES:\n\
        SPOTCHECK_UPDATE          Update baselines instead of failing on change\n\
        SPOTCHECK_PRESERVE        Keep browsers alive (and visible) between runs\n\
        SPOTCHECK_MAX_BROWSERS    Maximum concurrent browser processes\n\
        SPOTCHECK_OUTPUT_DIR      Directory for baselines and diff artifacts"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture baselines for every element in an HTML fragment
    Capture {
        /// Path to the HTML fragment to capture
        #[arg(short = 'f', long)]
        html: PathBuf,

        /// Baseline name (defaults to the fragment's file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Output directory (default: SPOTCHECK_OUTPUT_DIR or __screenshots__)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite the current platform's baseline even if one exists
        #[arg(short, long, env = "SPOTCHECK_UPDATE")]
        update: bool,

        /// Comma-separated states to capture (default: all)
        #[arg(short, long, value_delimiter = ',')]
        states: Vec<String>,

        /// CSS files to inline, in order
        #[arg(short, long)]
        css: Vec<PathBuf>,

        /// Compare pixels on every run instead of gating on content hash
        #[arg(long)]
        always_diff: bool,
    },

    /// Diff two PNG files and write a composite image
    Diff {
        /// Baseline image
        before: PathBuf,

        /// Candidate image
        after: PathBuf,

        /// Where to write the composite (default: diff.png)
        #[arg(short, long, default_value = "diff.png")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the run was clean (no unreviewed visual changes)
fn run(args: Args) -> Result<bool, Box<dyn Error>> {
    match args.command {
        Commands::Capture {
            html,
            name,
            output,
            update,
            states,
            css,
            always_diff,
        } => {
            let markup = fs::read_to_string(&html)?;
            let name = match name {
                Some(name) => name,
                None => html
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .ok_or("cannot derive a name from the HTML path")?,
            };

            let mut options = CaptureOptions::default().force_update(update);
            if let Some(output) = output {
                options = options.output_path(output);
            }
            if !states.is_empty() {
                let parsed: Result<Vec<State>, String> = states
                    .iter()
                    .map(|s| State::from_name(s).ok_or_else(|| format!("unknown state: {}", s)))
                    .collect();
                options = options.states(parsed?);
            }
            if !css.is_empty() {
                options = options.css_paths(css.iter().map(|p| p.to_string_lossy().into_owned()));
            }

            let pool = new_pool();

            if always_diff {
                let results = screenshot_diff(&pool, &name, markup.into(), &FileCssBuilder, &options)?;
                let mut clean = true;
                for result in &results {
                    let verdict = if result.before.is_none() {
                        "baseline written"
                    } else if result.identical {
                        "identical"
                    } else {
                        clean = false;
                        "DIFFERS"
                    };
                    println!("{} [{}] state {}: {}", name, result.idx, result.state, verdict);
                }
                pool.drain();
                Ok(clean)
            } else {
                let outcomes = screenshot(&pool, &name, markup.into(), &FileCssBuilder, &options)?;
                let mut clean = true;
                for outcome in &outcomes {
                    println!(
                        "{} [{}]: changed={} updated={}",
                        name, outcome.platform, outcome.changed, outcome.updated
                    );
                    if outcome.changed && !outcome.updated {
                        clean = false;
                    }
                    for diff in &outcome.diffs {
                        println!("  diff artifact: {}", diff.display());
                    }
                }
                pool.drain();
                Ok(clean)
            }
        }

        Commands::Diff {
            before,
            after,
            output,
        } => {
            let before_png = fs::read(&before)?;
            let after_png = fs::read(&after)?;
            let result = visual_diff(&before_png, &after_png)?;

            fs::write(&output, &result.composite)?;
            if result.identical {
                println!("identical");
            } else if !result.dimensions_match {
                println!("dimensions differ; composite written to {}", output.display());
            } else {
                println!(
                    "{} pixels differ; composite written to {}",
                    result.mismatched,
                    output.display()
                );
            }
            Ok(result.identical)
        }
    }
}
