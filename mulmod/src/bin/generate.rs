use std::path::PathBuf;

use argh::FromArgs;
use num_bigint::BigUint;
use tracing_subscriber::EnvFilter;

use accum_mult_mod::{
    fpga::{frames, Registry},
    io::store,
    model::Model,
    testing::random_operands,
    timing::always_timed,
    Design, Parameters,
};

#[derive(FromArgs)]
/// Generate the accumulate-and-reduce modular multiplier
struct Args {
    /// operand bit length
    #[argh(option)]
    bits: Option<usize>,

    /// modulus, hexadecimal
    #[argh(option, from_str_fn(parse_hex))]
    modulus: Option<BigUint>,

    /// first operand word width
    #[argh(option)]
    a_w: Option<usize>,

    /// second operand word width
    #[argh(option)]
    b_w: Option<usize>,

    /// accumulation window width
    #[argh(option)]
    grid: Option<usize>,

    /// reduction table address width
    #[argh(option)]
    ram_a_w: Option<usize>,

    /// table write bus width
    #[argh(option)]
    ram_d_w: Option<usize>,

    /// share of tables placed in ultra RAM, in percent
    #[argh(option)]
    uram_percent: Option<usize>,

    /// leave out $readmemh table initialisation
    #[argh(switch)]
    no_init: bool,

    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Generate(Generate),
    Check(Check),
    Load(Load),
    Reply(Reply),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "generate")]
/// Write the include file and table memory files
struct Generate {
    /// output directory
    #[argh(option, default = "PathBuf::from(\".\")")]
    out: PathBuf,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "check")]
/// Compare the reference model with x * y mod M on random operands
struct Check {
    /// number of operand pairs
    #[argh(option, default = "1000")]
    samples: usize,

    /// RNG seed
    #[argh(option, default = "0")]
    seed: u64,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "load")]
/// Program every table through the simulated write pipeline
struct Load {}

#[derive(FromArgs)]
#[argh(subcommand, name = "reply")]
/// Decode hex-encoded reply frames
struct Reply {
    /// frames, hex encoded
    #[argh(positional)]
    hex: String,
}

fn parse_hex(value: &str) -> Result<BigUint, String> {
    let digits = value.trim_start_matches("0x");
    BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(|| format!("not a hex number: {}", value))
}

impl Args {
    fn parameters(&self) -> Parameters {
        let default = Parameters::default();
        Parameters {
            bits: self.bits.unwrap_or(default.bits),
            modulus: self.modulus.clone().unwrap_or(default.modulus),
            a_w: self.a_w.unwrap_or(default.a_w),
            b_w: self.b_w.unwrap_or(default.b_w),
            grid: self.grid.unwrap_or(default.grid),
            ram_a_w: self.ram_a_w.unwrap_or(default.ram_a_w),
            ram_d_w: self.ram_d_w.unwrap_or(default.ram_d_w),
            uram_percent: self.uram_percent.unwrap_or(default.uram_percent),
            use_init: !self.no_init,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Args = argh::from_env();

    let params = args.parameters();
    let build = move || always_timed("building design", || Design::build(params)).unwrap();

    match args.subcommand {
        Subcommand::Generate(generate) => {
            let design = build();
            let artifacts = always_timed("rendering", || design.artifacts());
            for path in store(&artifacts, &generate.out).unwrap() {
                println!("{}", path.display());
            }
        }

        Subcommand::Check(check) => {
            let design = build();
            let pairs = random_operands(design.params.bits, check.samples, check.seed);
            let failures = always_timed("reference model", || Model::new(&design).check(&pairs))
                .unwrap();
            if failures != 0 {
                println!("\n==> FAILURE <== {} of {} pairs", failures, pairs.len());
                std::process::exit(1);
            } else {
                println!("\n==> SUCCESS <== {} pairs", pairs.len());
            }
        }

        Subcommand::Load(_) => {
            let design = build();
            let contents = design.contents();
            let pipeline = design.program(&contents).unwrap();
            if pipeline.tables() != &contents[..] {
                println!("\n==> FAILURE <==");
                std::process::exit(1);
            } else {
                println!("\n==> SUCCESS <== {} cycles", pipeline.cycles());
            }
        }

        Subcommand::Reply(reply) => {
            let bytes = hex::decode(reply.hex.trim()).unwrap();
            let registry = Registry::standard().unwrap();
            for frame in frames(&bytes) {
                println!("{}", registry.decode(&frame.unwrap()).unwrap());
            }
        }
    }
}
