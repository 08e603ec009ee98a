use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dicom_scan::{ScanError, ScanLoader, compute_dataset_stats};
use log::info;

#[derive(Parser)]
#[command(version, about = "Inspect and clean collections of DICOM CT scans")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every patient directory of a collection and print dataset statistics
    Stats {
        collection: PathBuf,
        /// Load patients on all cores
        #[arg(long)]
        parallel: bool,
    },
    /// Delete slice files that are neither CT images nor RT structure sets
    Purge { directory: PathBuf },
    /// List the ROI names of every patient directory
    Rois { collection: PathBuf },
}

fn main() -> Result<(), ScanError> {
    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let loader = ScanLoader::default();

    match cli.command {
        Command::Stats {
            collection,
            parallel,
        } => {
            let stats = if parallel {
                compute_dataset_stats(loader.par_load_all_patient_scans(&collection))
            } else {
                compute_dataset_stats(loader.load_all_patient_scans(&collection))
            };
            match stats {
                Some(stats) => {
                    println!("scans: {}", stats.count);
                    println!("mean original dimension: {:?}", stats.dimension_original);
                    println!("mean actual dimension: {:?}", stats.dimension_actual);
                    println!("mean spacings: {:?}", stats.spacings);
                    println!("manufacturers: {:?}", stats.manufacturers);
                    println!("scanners: {:?}", stats.scanners);
                }
                None => println!("No scans found in {}", collection.display()),
            }
        }
        Command::Purge { directory } => {
            let deleted = loader.purge(&directory)?;
            info!("Deleted {deleted} files below {}", directory.display());
        }
        Command::Rois { collection } => {
            for names in loader.load_all_roi_names(&collection) {
                println!("{}", names.join(", "));
            }
        }
    }
    Ok(())
}
