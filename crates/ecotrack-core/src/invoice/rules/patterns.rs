//! Common regex patterns for normalizing model output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Strict ISO calendar date
    pub static ref ISO_DATE: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}$"
    ).unwrap();

    // OpenAI-style secret key
    pub static ref API_KEY: Regex = Regex::new(
        r"^sk-[A-Za-z0-9_\-]{16,}$"
    ).unwrap();

    // Whole-key template values left in config files
    pub static ref PLACEHOLDER_KEY: Regex = Regex::new(
        r"(?i)^(?:sk-)?(?:\.\.\.|your[-_ ].*|<.*>|.*placeholder.*|changeme|x{3,})$"
    ).unwrap();

    // First number in a free-text quantity, separators included
    pub static ref QUANTITY: Regex = Regex::new(
        r"-?\d[\d.,\s]*"
    ).unwrap();
}
