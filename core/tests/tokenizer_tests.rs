use recommender_core::tokenizer::{tokenize, tokenize_with, TokenizerOptions};

#[test]
fn it_normalizes_and_lowercases() {
    let words = tokenize("Wooden DESK, café ﬁle");
    assert!(words.contains(&"wooden".to_string()));
    assert!(words.contains(&"desk".to_string()));
    assert!(words.contains(&"café".to_string()));
    // NFKC folds the ligature
    assert!(words.contains(&"file".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words.len(), 5);
}

#[test]
fn it_keeps_digits_and_splits_on_symbols() {
    assert_eq!(tokenize("USB-C 3.1 hub"), vec!["usb", "c", "3", "1", "hub"]);
}

#[test]
fn stemming_is_opt_in() {
    assert_eq!(tokenize("laptops"), vec!["laptops"]);
    assert_eq!(tokenize_with("laptops", TokenizerOptions { stem: true }), vec!["laptop"]);
}
