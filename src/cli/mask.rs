use clap::Args;

use tpcmask::directive::parse_partition_spec;
use tpcmask::mask::Mask;

#[derive(Args)]
pub struct MaskArgs {
    /// Partition spec: 1-4 (range), 1,4 (list) or 4 (single)
    pub spec: String,
    /// Also print the raw 64-bit disable mask
    #[arg(long)]
    pub value: bool,
}

pub fn cmd_mask(args: MaskArgs) {
    let partitions = match parse_partition_spec(&args.spec, 0) {
        Ok(p) => p,
        Err(e) => {
            e.render("<spec>", &args.spec);
            std::process::exit(1);
        }
    };
    let mask = Mask::for_partitions(&partitions);

    eprintln!("partitions {} enabled", partitions);
    println!("{}", mask);
    if args.value {
        println!("{:#018x}", mask.value());
    }
}
