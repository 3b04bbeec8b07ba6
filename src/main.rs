#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;
use std::time::Instant;

use structopt::StructOpt;
use tracing::{error, info};

use vehicle_core::cli::Opt;
use vehicle_core::vnnlib::VnnLibScript;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

fn main() {
    let opt = Opt::from_args();

    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    if opt.debug {
        info!(?opt, "parsed CLI arguments");
    }

    let sources = match opt.try_read_files() {
        Ok(sources) => sources,
        Err(e) => {
            error!("failed to read an input file: {e}");
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let mut num_properties = 0usize;
    let mut failed = false;

    for (path, src) in sources {
        match vehicle_core::compile_source(&src) {
            Ok(scripts) => {
                num_properties += scripts.len();
                for script in &scripts {
                    if let Some(dir) = &opt.output_dir {
                        if let Err(e) = write_script(dir, script) {
                            error!("{}: failed to write output for `{}`: {e}", path.display(), script.property);
                            failed = true;
                        }
                    } else {
                        print_script(&path, script);
                    }
                }
            }
            Err(e) => {
                error!("{}: {e}", path.display());
                failed = true;
            }
        }
    }

    info!(elapsed = ?start.elapsed(), num_properties, "compilation finished");

    if failed {
        std::process::exit(1);
    }
}

fn print_script(path: &Path, script: &VnnLibScript) {
    println!(
        "{}: property `{}` over network(s) {:?} — {} input(s), {} output(s)",
        path.display(),
        script.property,
        script.meta_network.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        script.num_inputs,
        script.num_outputs,
    );
}

fn write_script(dir: &Path, script: &VnnLibScript) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.vnnlib.debug", script.property));
    fs::write(path, format!("{:#?}", script.body))
}
