//! Watermark signatures: the criteria that identify a watermark artifact.

use crate::normalize::normalize_for_match;
use std::ops::Range;

/// Phrase stamped on exported decks and PDFs.
const GAMMA_PHRASE: &str = "Made with Gamma";

/// Host of the hyperlink attached to the watermark badge.
const GAMMA_HOST: &str = "gamma.app";

/// Pixel size of the watermark badge image embedded in exported PDFs.
const GAMMA_IMAGE_SIZE: (u32, u32) = (575, 137);

/// Match criteria for watermark artifacts.
///
/// Phrases and names are stored normalized, so every `matches_*` check is a
/// case-insensitive substring test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSignature {
    phrases: Vec<String>,
    link_hosts: Vec<String>,
    image_names: Vec<String>,
    image_dimensions: Vec<(u32, u32)>,
}

impl Default for WatermarkSignature {
    fn default() -> Self {
        Self::gamma()
    }
}

impl WatermarkSignature {
    /// A signature that matches nothing.
    pub fn empty() -> Self {
        Self {
            phrases: Vec::new(),
            link_hosts: Vec::new(),
            image_names: Vec::new(),
            image_dimensions: Vec::new(),
        }
    }

    /// Signature for the "Made with Gamma" badge.
    pub fn gamma() -> Self {
        Self::empty()
            .with_phrase(GAMMA_PHRASE)
            .with_link_host(GAMMA_HOST)
            .with_image_dimensions(GAMMA_IMAGE_SIZE.0, GAMMA_IMAGE_SIZE.1)
    }

    /// Add a text phrase.
    pub fn with_phrase(mut self, phrase: &str) -> Self {
        let phrase = normalize_for_match(phrase);
        if !phrase.is_empty() {
            self.phrases.push(phrase);
        }
        self
    }

    /// Add a hyperlink host (any substring of the target URL).
    pub fn with_link_host(mut self, host: &str) -> Self {
        let host = host.trim().to_lowercase();
        if !host.is_empty() {
            self.link_hosts.push(host);
        }
        self
    }

    /// Add an image name marker, matched against shape and resource names.
    pub fn with_image_name(mut self, name: &str) -> Self {
        let name = normalize_for_match(name);
        if !name.is_empty() {
            self.image_names.push(name);
        }
        self
    }

    /// Add the exact pixel size of a known watermark image.
    pub fn with_image_dimensions(mut self, width: u32, height: u32) -> Self {
        self.image_dimensions.push((width, height));
        self
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
            && self.link_hosts.is_empty()
            && self.image_names.is_empty()
            && self.image_dimensions.is_empty()
    }

    /// Whether the text contains any watermark phrase.
    pub fn matches_text(&self, text: &str) -> bool {
        if self.phrases.is_empty() {
            return false;
        }
        let normalized = normalize_for_match(text);
        self.phrases.iter().any(|p| normalized.contains(p.as_str()))
    }

    /// Whether a hyperlink target points at a watermark host.
    pub fn matches_link(&self, target: &str) -> bool {
        let target = target.to_lowercase();
        self.link_hosts.iter().any(|h| target.contains(h.as_str()))
    }

    /// Whether a shape or resource name carries a watermark image marker.
    pub fn matches_image_name(&self, name: &str) -> bool {
        if self.image_names.is_empty() {
            return false;
        }
        let normalized = normalize_for_match(name);
        self.image_names.iter().any(|n| normalized.contains(n.as_str()))
    }

    /// Whether an image has the exact size of a known watermark image.
    pub fn matches_image_dimensions(&self, width: u32, height: u32) -> bool {
        self.image_dimensions.contains(&(width, height))
    }

    /// Find the runs to remove so that no phrase survives in the joined text.
    ///
    /// `texts` are consecutive pieces of one line of text (the runs of a
    /// paragraph, the text-show operators of a text object). Each returned
    /// range is the smallest window of pieces whose concatenation contains a
    /// phrase; windows never overlap and are returned in order.
    pub fn matching_windows<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Range<usize>> {
        let mut windows = Vec::new();
        if self.phrases.is_empty() {
            return windows;
        }

        let joined = |range: Range<usize>| -> String {
            texts[range].iter().map(|t| t.as_ref()).collect()
        };

        let mut start = 0;
        while start < texts.len() {
            let end = (start..texts.len()).find(|&end| self.matches_text(&joined(start..end + 1)));

            match end {
                Some(end) => {
                    // Shrink from the left while the window still matches
                    let mut first = start;
                    while first < end && self.matches_text(&joined(first + 1..end + 1)) {
                        first += 1;
                    }
                    windows.push(first..end + 1);
                    start = end + 1;
                }
                None => start += 1,
            }
        }

        windows
    }
}
