// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use crate::cli::args::NormalizeArgs;
use crate::cli::logging::set_verbose;
use crate::normalize::{NormalizeConfig, normalize_with_config};
use crate::utils::pluralize;
use crate::{Clip, Result, error, success, verbose};

/// Segment and normalize a raw capture.
pub fn run_normalize(args: &NormalizeArgs) {
    if let Err(e) = normalize(args) {
        error!("{e}");
        process::exit(1);
    }
}

fn normalize(args: &NormalizeArgs) -> Result<()> {
    if args.output.is_none() {
        // stdout carries the JSON
        set_verbose(false);
    }
    let raw = Clip::load(&args.clip)?;
    verbose!("{}: {}", args.clip, pluralize(raw.len(), "frame"));

    let config = NormalizeConfig::new().with_target_frames(args.frames);
    let clip = normalize_with_config(&raw, &config)?;

    match &args.output {
        Some(path) => {
            clip.save(path)?;
            success!("Saved {} to {path}", pluralize(clip.len(), "frame"));
        }
        None => println!("{}", clip.to_json_string()?),
    }
    Ok(())
}
