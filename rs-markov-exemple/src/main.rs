use std::env;

use log::{info, warn};
use rs_markov_core::{ChainConfig, ChainModel, ModelStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Usage: rs-markov-exemple [config.toml] [corpus.txt]
    let mut args = env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "data/markov.toml".to_owned());
    let corpus_path = args.next().unwrap_or_else(|| "data/corpus.txt".to_owned());

    // Missing or invalid config falls back to defaults
    let config = ChainConfig::load_or_default(&config_path);
    let generation = &config.generation;

    let mut model = ChainModel::with_heuristic(config.order, generation.ending.clone())?;
    let store = ModelStore::new(&config.model_path);

    // Start from the previous run if there is one, otherwise keep the fresh model
    if !store.load(&mut model) {
        info!("starting from an empty model");
    }

    // Bulk training, as a "train on this channel's history" job would do
    if let Err(e) = model.train_from_file(&corpus_path) {
        warn!("could not read corpus {}: {}", corpus_path, e);
    }

    // Incremental training, as a chat message handler would do
    model.train("The bot reads every message. The bot learns how people talk!");

    println!("Model: {}", model.stats());

    for i in 0..5 {
        let text = model.generate(None, generation.target_length, generation.coherent);
        println!("Generated {}: {}", i + 1, text);
    }

    // Creative mode, starting from a fixed context when it exists
    let start_key = model.keys().next().map(str::to_owned);
    println!(
        "Creative: {}",
        model.generate(start_key.as_deref(), generation.target_length, false)
    );

    if !store.save(&model) {
        return Err(format!("could not save model to {}", store.path().display()).into());
    }

    match store.get_stats() {
        Some(stats) => println!(
            "Saved: {} contexts, {} unique words, {} starters, {} enders, version {}",
            stats.chain_size, stats.unique_words, stats.starters, stats.enders, stats.version
        ),
        None => println!("Saved file could not be read back"),
    }

    Ok(())
}
