//! CLI for platepick: plate-reader QC and liquid-handler pick lists.

mod commands;

use clap::{Parser, Subcommand};
use env_logger::Env;

#[derive(Parser)]
#[command(name = "platepick")]
#[command(about = "platepick: plate-reader QC, cherrypicking and pick-list batching")]
#[command(version)]
struct Cli {
    /// TOML configuration file; command-line flags override its values
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a plate-reader file and print the fluorescence grid as CSV
    Parse {
        /// Plate-reader file
        file: String,

        /// Input format: txt (plate-reader text export) or csv. Inferred from the extension by default
        #[arg(long)]
        filetype: Option<String>,
    },

    /// Fit the standards and print the concentration grid as CSV.
    /// Warns when the fit is below the r threshold.
    Convert {
        /// Plate-reader file
        file: String,

        #[arg(long)]
        filetype: Option<String>,

        /// 1-based column holding the standards
        #[arg(long)]
        standards_col: Option<usize>,

        /// Comma-separated standards concentrations, one per row
        #[arg(long)]
        standards: Option<String>,

        /// Minimum Pearson r of the standards fit
        #[arg(long)]
        r_minimum: Option<f64>,
    },

    /// Run QC on one plate and write its cherrypick output tree
    Cherrypick {
        /// Plate-reader file
        file: String,

        /// Plate name, used in well names and output file names
        plate: String,

        /// Sample (mouse) identifier
        sample_id: String,

        #[arg(long)]
        filetype: Option<String>,

        /// Output root; failing plates go under flagged/flag_<n>/
        #[arg(long, default_value = ".")]
        output_folder: String,

        #[arg(long)]
        standards_col: Option<usize>,

        /// 1-based column holding the blanks
        #[arg(long)]
        blanks_col: Option<usize>,

        #[arg(long)]
        standards: Option<String>,

        #[arg(long)]
        r_minimum: Option<f64>,
    },

    /// Pack cherrypicked plate files into fixed-size pick lists.
    /// Resumes numbering and the incomplete batch from earlier runs.
    Aggregate {
        /// Cherrypicked tidy CSV files, in batching order
        #[arg(required = true)]
        files: Vec<String>,

        /// Directory holding the pick lists and the batch ledger
        #[arg(long, default_value = ".")]
        output_folder: String,

        /// Wells per pick list
        #[arg(long)]
        plate_size: Option<usize>,

        /// Target concentration after dilution (ng/ul)
        #[arg(long)]
        desired_concentration: Option<f64>,

        /// Volume every sample is diluted to
        #[arg(long)]
        final_volume: Option<f64>,

        /// Round volumes to the nearest multiple of this
        #[arg(long)]
        round_volume_to: Option<f64>,

        /// Discard existing pick lists and the ledger, restart at batch 1
        #[arg(long)]
        force: bool,
    },

    /// Cherrypick every plate, then batch the passing ones into <OUT>/picklists
    Run {
        /// Output root
        out: String,

        /// Plates as FILE:PLATE:SAMPLE_ID
        #[arg(required = true)]
        plates: Vec<String>,

        #[arg(long)]
        filetype: Option<String>,

        #[arg(long)]
        force: bool,
    },

    /// Print the flag log of an output folder
    Flags {
        #[arg(long, default_value = ".")]
        output_folder: String,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Parse { file, filetype } => commands::parse::run(&file, filetype.as_deref()),
        Commands::Convert {
            file,
            filetype,
            standards_col,
            standards,
            r_minimum,
        } => commands::convert::run(
            &file,
            filetype.as_deref(),
            commands::load_config(
                config_path,
                &commands::Overrides {
                    standards_col,
                    standards,
                    r_minimum,
                    ..Default::default()
                },
            ),
        ),
        Commands::Cherrypick {
            file,
            plate,
            sample_id,
            filetype,
            output_folder,
            standards_col,
            blanks_col,
            standards,
            r_minimum,
        } => commands::cherrypick::run(commands::cherrypick::CherrypickCommandConfig {
            file: &file,
            plate: &plate,
            sample_id: &sample_id,
            filetype: filetype.as_deref(),
            output_folder: &output_folder,
            config: commands::load_config(
                config_path,
                &commands::Overrides {
                    standards_col,
                    blanks_col,
                    standards,
                    r_minimum,
                    ..Default::default()
                },
            ),
        }),
        Commands::Aggregate {
            files,
            output_folder,
            plate_size,
            desired_concentration,
            final_volume,
            round_volume_to,
            force,
        } => commands::aggregate::run(
            &files,
            &output_folder,
            force,
            commands::load_config(
                config_path,
                &commands::Overrides {
                    plate_size,
                    desired_concentration,
                    final_volume,
                    round_volume_to,
                    ..Default::default()
                },
            ),
        ),
        Commands::Run {
            out,
            plates,
            filetype,
            force,
        } => commands::run::run(
            &out,
            &plates,
            filetype.as_deref(),
            force,
            commands::load_config(config_path, &commands::Overrides::default()),
        ),
        Commands::Flags { output_folder } => commands::flags::run(&output_folder),
    }
}
