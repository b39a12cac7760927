use crate::core::types::{CreationEvent, FilterConfig, TokenMetadata};

/// Stateless admission checks, evaluated cheapest first:
/// initial buy, then (after the metadata fetch) description and required links.
pub struct FilterEngine;

impl FilterEngine {
    pub fn passes_initial_buy(event: &CreationEvent, config: &FilterConfig) -> bool {
        match config.max_initial_buy {
            Some(max) => event.initial_buy_sol <= max,
            None => true,
        }
    }

    /// Any configured tag term must appear in the description. Missing metadata fails
    /// whenever terms are configured.
    pub fn passes_description(metadata: Option<&TokenMetadata>, config: &FilterConfig) -> bool {
        let terms = config.tag_terms();
        if terms.is_empty() {
            return true;
        }

        let description = metadata
            .and_then(|m| m.description.as_deref())
            .unwrap_or_default()
            .to_lowercase();
        if description.is_empty() {
            return false;
        }

        terms.iter().any(|term| description.contains(term.as_str()))
    }

    pub fn passes_required_links(metadata: Option<&TokenMetadata>, config: &FilterConfig) -> bool {
        let required = config.required_links;
        let present = |field: Option<&String>| field.map_or(false, |v| !v.trim().is_empty());

        if required.twitter && !present(metadata.and_then(|m| m.twitter.as_ref())) {
            return false;
        }
        if required.telegram && !present(metadata.and_then(|m| m.telegram.as_ref())) {
            return false;
        }
        if required.website && !present(metadata.and_then(|m| m.website.as_ref())) {
            return false;
        }
        true
    }

    pub fn passes_metadata(metadata: Option<&TokenMetadata>, config: &FilterConfig) -> bool {
        Self::passes_description(metadata, config) && Self::passes_required_links(metadata, config)
    }
}
