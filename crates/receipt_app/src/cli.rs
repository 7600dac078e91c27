use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "receipt_intake")]
#[command(about = "Upload receipt images for extraction and save the results", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// RON config file
    #[arg(long, global = true, default_value = "receipt_intake.ron")]
    pub config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload receipts, wait for extraction and print the results
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Save every completed receipt once processing ends
        #[arg(long)]
        save: bool,
    },

    /// Print saved receipts grouped by month
    List,

    /// Interactive session; an unsaved batch carries over to the next one
    Session { files: Vec<PathBuf> },
}
