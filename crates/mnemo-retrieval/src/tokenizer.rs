// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query and document tokenization for the sparse retriever.
//!
//! The default path lowercases and splits on non-alphanumeric boundaries.
//! With word segmentation enabled, CJK text goes through jieba first;
//! without it, a contiguous CJK run stays one token, which makes a word
//! segmenter effectively required for useful CJK recall.

use jieba_rs::Jieba;

/// Pluggable tokenizer shared by indexing and query paths.
pub struct Tokenizer {
    jieba: Option<Jieba>,
}

impl Tokenizer {
    /// Build a tokenizer. `segment_cjk` loads the jieba dictionary once.
    pub fn new(segment_cjk: bool) -> Self {
        Self {
            jieba: segment_cjk.then(Jieba::new),
        }
    }

    /// Split text into lowercase terms.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if let Some(jieba) = &self.jieba
            && text.chars().any(is_cjk)
        {
            return jieba
                .cut_for_search(text, true)
                .into_iter()
                .filter(|tok| tok.chars().any(char::is_alphanumeric))
                .map(|tok| tok.to_lowercase())
                .collect();
        }
        split_alphanumeric(text)
    }
}

fn split_alphanumeric(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_lowercases() {
        let tok = Tokenizer::new(false);
        assert_eq!(
            tok.tokenize("The User's dog, Max!"),
            vec!["the", "user", "s", "dog", "max"]
        );
    }

    #[test]
    fn keeps_digits() {
        let tok = Tokenizer::new(false);
        assert_eq!(tok.tokenize("error 404 page"), vec!["error", "404", "page"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let tok = Tokenizer::new(false);
        assert!(tok.tokenize("").is_empty());
        assert!(tok.tokenize("  ,.!  ").is_empty());
    }

    #[test]
    fn cjk_without_segmentation_stays_one_token() {
        let tok = Tokenizer::new(false);
        let tokens = tok.tokenize("我喜欢爵士乐");
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn cjk_with_segmentation_splits_words() {
        let tok = Tokenizer::new(true);
        let tokens = tok.tokenize("我喜欢爵士乐");
        assert!(tokens.len() > 1, "jieba should segment: {tokens:?}");
        assert!(tokens.iter().any(|t| t == "爵士乐" || t == "爵士"));
    }

    #[test]
    fn mixed_text_with_segmentation_keeps_latin_terms() {
        let tok = Tokenizer::new(true);
        let tokens = tok.tokenize("hello 世界 world");
        assert!(tokens.contains(&"hello".to_string()));
        assert!(tokens.contains(&"world".to_string()));
        assert!(tokens.contains(&"世界".to_string()));
    }
}
