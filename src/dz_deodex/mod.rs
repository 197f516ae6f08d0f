use crate::input::Input;
use crate::prelude::*;
use clap::ArgMatches;
use dz_dex::methods::EncodedMethod;
use nu_ansi_term::Color;
use regex::Regex;

pub fn run(args: &ArgMatches) -> DzResult<()> {
    init_logger(args);

    let class_filter = args
        .get_one::<String>("filter-class")
        .map(|s| Regex::new(s))
        .transpose()?;
    let method_filter = args
        .get_one::<String>("filter-method")
        .map(|s| Regex::new(s))
        .transpose()?;
    let verify = !args.get_flag("no-verify");

    let mut input = Input::open(args)?;
    let session = AnalysisSession::new();
    let class_path = session.install(input.class_path()?)?;
    let deodex = input.deodex_util(class_path)?;

    let mut methods: Vec<EncodedMethod> = Vec::new();
    for class in input.dex.iter_class_defs() {
        let class_name = class.class_descriptor(&input.dex)?;
        if let Some(filter) = &class_filter {
            if !filter.is_match(class_name) {
                continue;
            }
        }
        let Some(data) = class.class_data() else {
            continue;
        };
        for method in data.iter_methods().filter(|method| method.code().is_some()) {
            if let Some(filter) = &method_filter {
                if !filter.is_match(method.descriptor(&input.dex)?.name()) {
                    continue;
                }
            }
            methods.push(method.clone());
        }
    }

    let mut nb_success = 0;
    let mut nb_fails = 0;
    let mut nb_deodexed = 0;
    let mut last_res = Ok(());

    for method in &methods {
        let method_string = method.descriptor(&input.dex)?.full_string(&input.dex)?;
        log::debug!("analyzing {method_string}");

        let res = MethodAnalyzer::new(class_path, &input.dex, method, deodex.as_ref()).and_then(
            |mut analyzer| {
                analyzer.analyze(&mut input.dex)?;
                if verify {
                    analyzer.verify(&input.dex)?;
                }
                Ok(analyzer)
            },
        );
        match res {
            Ok(analyzer) => {
                let count = analyzer.deodexed_count();
                if count > 0 {
                    analyzer.write_back(&mut input.dex)?;
                    nb_deodexed += count;
                }
                println!(
                    "{} {method_string} ({count} deodexed)",
                    Color::Green.paint("ok")
                );
                nb_success += 1;
            }
            Err(err) => {
                println!("{} {method_string}", Color::Red.paint("failed"));
                log::error!("{err}");
                nb_fails += 1;
                last_res = Err(err.into());
            }
        }
    }

    if let Some(output) = args.get_one::<String>("output") {
        dz_dex::save(&input.dex, output)?;
        log::info!("deodexed container written to {output}");
    }

    log::info!("");
    log::info!(
        "analyzed methods: {} / {}, deodexed instructions: {}",
        nb_success,
        nb_success + nb_fails,
        nb_deodexed
    );

    last_res
}
