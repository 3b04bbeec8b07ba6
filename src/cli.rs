//! Command-line surface over `compile_source` (spec §6 "CLI / env" —
//! "treat as a thin driver"): read the input files, run the pipeline, and
//! either report the lowered VNNLib scripts or the first error encountered.
//! All the actual work lives in the library; this module only does I/O and
//! argument parsing.

use std::fs::read_to_string;
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(raw(setting = "structopt::clap::AppSettings::ColoredHelp"))]
#[structopt(name = "vehicle", about = "Compiler core for the Vehicle specification language", author = "Vehicle contributors", version = "0.1.0")]
pub struct Opt {
    /// Print the parsed arguments and each lowered script's shape before exiting.
    #[structopt(short = "d", long = "debug")]
    pub debug: bool,

    /// Directory lowered VNNLib output is written to; printed to stdout if omitted.
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    pub output_dir: Option<PathBuf>,

    /// Specification files to compile. Bare names are resolved against the
    /// working directory; absolute paths are read directly.
    #[structopt(name = "FILE", parse(from_os_str))]
    pub files: Vec<PathBuf>,
}

impl Opt {
    pub fn try_read_files(&self) -> Result<Vec<(PathBuf, String)>, std::io::Error> {
        self.files.iter().map(|path| try_read_cwd(path).map(|src| (path.clone(), src))).collect()
    }
}

fn try_read_cwd(suggestion: &PathBuf) -> Result<String, std::io::Error> {
    if suggestion.is_absolute() {
        return read_to_string(suggestion);
    }
    match std::env::current_dir() {
        Err(_) => read_to_string(suggestion),
        Ok(mut path) => {
            path.push(suggestion);
            read_to_string(path)
        }
    }
}
