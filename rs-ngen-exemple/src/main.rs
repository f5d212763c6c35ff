use rs_ngen_core::io;
use rs_ngen_core::model::dynamic_trie::DynamicTrieModel;
use rs_ngen_core::model::generator::{
    BackOffGenerator, BeamSearchTextGenerator, DynamicBackOffGenerator, GreedyTextGenerator,
};
use rs_ngen_core::model::ngram_model::NGramModel;
use rs_ngen_core::model::ngram_trie::NGramTrieModel;
use rs_ngen_core::model::processor::{LetterProcessor, TextProcessor, WordProcessor};
use rs_ngen_core::persistence;

const LETTERS_TEXT: &str = "Dear friend, the winter is long and the letters are short. \
The owl waits by the window. The letters arrive at night and the window stays open.";

const EXTRA_TEXT: &str = "Dear reader, the plan is ready. The committee meets at noon. \
The report about the plan is due at night.";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // The corpus can be swapped for a real text file; the embedded sample
    // keeps the demo self-contained.
    let text = io::read_text("./data/letters.txt").unwrap_or_else(|_| LETTERS_TEXT.to_owned());

    // Letter-level pipeline: flat models over a single id stream.
    let mut letter_processor = LetterProcessor::new("_");
    let encoded_letters = letter_processor.encode(&text)?;

    let mut flat_model = NGramModel::new(encoded_letters.clone(), 3);
    flat_model.build()?;

    let greedy = GreedyTextGenerator::new(&flat_model, &mut letter_processor).run(40, "De")?;
    println!("Greedy result: {greedy}");

    let beam = BeamSearchTextGenerator::new(&flat_model, &mut letter_processor, 3)
        .run("De", 40)?;
    println!("Beam result: {beam}");

    // Back-off over a family of flat models, highest order first.
    let mut family = Vec::new();
    for n_gram_size in [2, 3, 4] {
        let mut model = NGramModel::new(encoded_letters.clone(), n_gram_size);
        model.build()?;
        family.push(model);
    }
    let back_off = BackOffGenerator::new(family, &mut letter_processor).run(40, "De")?;
    println!("Back-off result: {back_off}");

    // Word-level pipeline: sentence-bounded trie models.
    let mut word_processor = WordProcessor::new("<EOS>");
    let sentences = word_processor.encode_sentences(&text)?;

    let mut trie_model = NGramTrieModel::new(sentences.clone(), 3);
    trie_model.build()?;
    let trie_greedy =
        GreedyTextGenerator::new(&trie_model, &mut word_processor).run(8, "The owl")?;
    println!("Trie greedy result: {trie_greedy}");

    // Dynamic model: every order from 2 up to 4, merged into one tree.
    let mut dynamic_model = DynamicTrieModel::new(sentences, 4);
    dynamic_model.build()?;

    // An out-of-range order is reported, never silently clamped.
    match dynamic_model.set_current_ngram_size(42) {
        Ok(_) => println!("Should not happen"),
        Err(_) => println!("Order 42 is invalid, the maximum is 4"),
    }
    dynamic_model.set_current_ngram_size(3)?;

    // Round trip through the JSON document, then generate from the
    // reloaded tree without rebuilding it.
    persistence::save(&dynamic_model, "./demo_model.json")?;
    let loaded_model = persistence::load("./demo_model.json")?;

    let dynamic = DynamicBackOffGenerator::new(&loaded_model, &mut word_processor)
        .run(10, "The letters")?;
    println!("Dynamic result before update: {dynamic}");

    // Grow the corpus in place and generate again.
    let extra_sentences = word_processor.encode_sentences(EXTRA_TEXT)?;
    dynamic_model.update(&extra_sentences)?;

    let updated = DynamicBackOffGenerator::new(&dynamic_model, &mut word_processor)
        .run(10, "The plan")?;
    println!("Dynamic result after update: {updated}");

    // The binary cache bundles the vocabulary, so the reloaded pair can
    // decode on its own.
    let cache_path = io::build_output_path("./demo_model.json", "bin")?;
    persistence::save_cache(&word_processor, &dynamic_model, &cache_path)?;
    let (mut cached_processor, cached_model) = persistence::load_cache(&cache_path)?;

    let cached = DynamicBackOffGenerator::new(&cached_model, &mut cached_processor)
        .run(10, "The report")?;
    println!("Dynamic result from cache: {cached}");

    Ok(())
}
