use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::{error, info, warn};

use mrp::io;
use mrp::io::cli::Cli;
use mrp::io::svg_export::bin_to_svg;
use polypack::io as core_io;
use polypack::{pack, pack_preserve_order, CancelSwitch, PackConfig, PackSolution};

fn main() -> ExitCode {
    let args = Cli::parse();
    io::init_logger(args.log_level).expect("logger initialisation failed");

    match run(&args) {
        Ok(solution) if solution.is_complete() => ExitCode::SUCCESS,
        Ok(solution) => {
            warn!(
                "{} pieces could not be placed in any bin",
                solution.unplaced.len()
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<PackSolution> {
    let config = load_config(args);
    info!(
        "config: {}",
        serde_json::to_string(&config).expect("config serialises")
    );

    let instance = core_io::read_instance(&args.input_file)?;
    info!(
        "loaded {} pieces, bin {}x{}",
        instance.pieces.len(),
        instance.bin.width(),
        instance.bin.height()
    );

    let cancel = CancelSwitch::new();
    let solution = if args.preserve_order {
        pack_preserve_order(instance.pieces, instance.bin, &config, &cancel)
    } else {
        pack(instance.pieces, instance.bin, &config, &cancel)
    }?;

    info!(
        "{} bins used, {:.3} area units occupied",
        solution.n_bins(),
        solution.total_occupied_area()
    );

    fs::create_dir_all(&args.output_folder).with_context(|| {
        format!(
            "could not create output folder {}",
            args.output_folder.display()
        )
    })?;
    core_io::write_bin_files(&solution.bins, &args.output_folder)?;

    if args.svg {
        for (k, bin) in solution.bins.iter().enumerate() {
            let path = args.output_folder.join(format!("Bin-{}.svg", k + 1));
            io::write_svg(&bin_to_svg(bin), &path)?;
        }
    }

    Ok(solution)
}

fn load_config(args: &Cli) -> PackConfig {
    let mut config = match &args.config_file {
        Some(path) => match File::open(path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file)).unwrap_or_else(|err| {
                warn!("config file could not be parsed: {err}");
                warn!("falling back on default config");
                PackConfig::default()
            }),
            Err(err) => {
                warn!("could not open config file {}: {err}", path.display());
                warn!("falling back on default config");
                PackConfig::default()
            }
        },
        None => PackConfig::default(),
    };

    if args.fine_rotations {
        config.stage23_rotations = PackConfig::fine_rotations();
    }
    if args.parallel {
        config.parallel_search = true;
    }
    if args.nfp_collision {
        config.nfp_collision = true;
    }
    if args.islands {
        config.island_placement = true;
    }
    config
}
