use dalvyze::prelude::DzResult;
use dalvyze::{cli, dz_deodex};

fn main() -> DzResult<()> {
    let args = cli::deodex().get_matches();
    dz_deodex::run(&args)
}
