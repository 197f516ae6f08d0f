use crate::input::Input;
use crate::prelude::*;
use clap::ArgMatches;
use dz_analysis::vtables::dump_vtables;
use std::fs::File;
use std::io::{self, BufWriter, Write};

pub fn run(args: &ArgMatches) -> DzResult<()> {
    init_logger(args);

    let input = Input::open(args)?;
    let session = AnalysisSession::new();
    let class_path = session.install(input.class_path()?)?;

    let mut writer: Box<dyn Write> = match args.get_one::<String>("output") {
        Some(fname) => Box::new(BufWriter::new(File::create(fname)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    dump_vtables(&input.dex, class_path, &mut writer)?;
    writer.flush()?;
    Ok(())
}
