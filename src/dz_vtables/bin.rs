use dalvyze::prelude::DzResult;
use dalvyze::{cli, dz_vtables};

fn main() -> DzResult<()> {
    let args = cli::vtables().get_matches();
    dz_vtables::run(&args)
}
