use crate::cli::MergeArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use letmap::{
    core::io::mhd::MetaImage,
    engine::{error::EngineError, output::OutputNames, progress::ProgressReporter},
    workflows::{self, merge::PartialOutput},
};
use tracing::info;

pub fn run(args: MergeArgs) -> Result<()> {
    info!(inputs = args.inputs.len(), "Reading worker outputs...");
    let partials = args
        .inputs
        .iter()
        .map(|input| {
            let names = OutputNames::from_let_path(input);
            PartialOutput::read::<MetaImage>(&names, args.variance).map_err(EngineError::from)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Merging {} worker output(s)...", partials.len());
    let output = workflows::merge::run(partials, &reporter)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let names = OutputNames::from_let_path(&args.output);
    let written = output
        .write_all::<MetaImage>(&names)
        .map_err(EngineError::from)?;
    for path in written {
        println!("✓ Written: {}", path.display());
    }

    Ok(())
}
