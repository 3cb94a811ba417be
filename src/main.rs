use clap::{Parser, Subcommand};

mod cli;

use cli::bench::BenchArgs;
use cli::mask::MaskArgs;
use cli::partition::PartitionArgs;

#[derive(Parser)]
#[command(
    name = "tpcmask",
    version,
    about = "Apply libsmctrl TPC/SM masks to CUDA kernel launches",
    long_about = "Apply libsmctrl TPC/SM masks to CUDA kernel launches.\n\n\
        Finds kernel launches (\"<<<\") and inserts a libsmctrl_set_next_mask(mask) \
        call in front of each launch of a listed kernel. Partition numbers are not \
        checked against the hardware."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert partition masks ahead of kernel launches in a source file
    Partition(PartitionArgs),
    /// Print the libsmctrl mask for a partition spec
    Mask(MaskArgs),
    /// Time a program across partition specs and write a CSV
    Bench(BenchArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Partition(args) => cli::partition::cmd_partition(args),
        Command::Mask(args) => cli::mask::cmd_mask(args),
        Command::Bench(args) => cli::bench::cmd_bench(args),
    }
}
