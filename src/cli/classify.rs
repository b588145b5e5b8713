// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use crate::cli::args::ClassifyArgs;
use crate::utils::pluralize;
use crate::{
    ClassifierConfig, Clip, Device, LabelVocabulary, Result, SignClassifier, VERSION, error, section, success, verbose,
};

/// Run sign classification on one clip.
pub fn run_classify(args: &ClassifyArgs) {
    if let Err(e) = classify(args) {
        error!("{e}");
        process::exit(1);
    }
}

fn classify(args: &ClassifyArgs) -> Result<()> {
    let labels = match &args.labels {
        Some(path) => LabelVocabulary::from_file(path)?,
        None => LabelVocabulary::emergency_words(),
    };

    let mut config = ClassifierConfig::new();
    if let Some(device) = &args.device {
        let device: Device = device.parse().map_err(crate::SignError::ConfigError)?;
        config = config.with_device(device);
    }
    if let Some(threshold) = args.threshold {
        config = config.with_rejection_threshold(threshold);
    }

    println!("Sign Inference {VERSION} 🚀 Rust ST-GCN");
    let classifier = SignClassifier::load(&args.weights, labels, config)?;
    verbose!(
        "ST-GCN summary: {}, {} on {}",
        pluralize(classifier.labels().len(), "class"),
        pluralize(classifier.config().num_frames, "frame"),
        classifier.device()
    );

    let clip = Clip::load(&args.clip)?;
    verbose!("{}: {}", args.clip, pluralize(clip.len(), "frame"));

    let prediction = if args.raw {
        classifier.predict_raw(&clip)?
    } else {
        classifier.predict(&clip)?
    };

    section!("Top classes");
    verbose!("{}", prediction.verbose(classifier.labels().as_slice()));
    verbose!(
        "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess per clip at shape (1, 4, {}, 54)",
        prediction.speed.preprocess.unwrap_or(0.0),
        prediction.speed.inference.unwrap_or(0.0),
        prediction.speed.postprocess.unwrap_or(0.0),
        classifier.config().num_frames
    );

    if prediction.rejected {
        success!("{} (top-1 {:.2} below threshold)", prediction.label, prediction.confidence());
    } else {
        success!("{} {:.2}", prediction.label, prediction.confidence());
    }
    Ok(())
}
