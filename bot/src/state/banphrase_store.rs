use std::sync::Arc;

use regex::{NoExpand, Regex, RegexBuilder};

use persistence::banphrases::{BanphraseDefinition, BanphraseKind};
use persistence::channel::ChannelDefinition;

/// Result of a banphrase check over a candidate reply.
///
/// `passed == false` with a string means "send this instead"; with no string
/// it means "send nothing at all".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanphraseCheckResult {
    pub string: Option<String>,
    pub passed: bool,
}

impl BanphraseCheckResult {
    pub fn passed(message: String) -> Self {
        BanphraseCheckResult {
            string: Some(message),
            passed: true,
        }
    }

    pub fn cut(replacement: Option<String>) -> Self {
        BanphraseCheckResult {
            string: replacement,
            passed: false,
        }
    }
}

/// A banphrase definition with its pattern compiled. Literal patterns are
/// escaped into the same regex machinery so case folding behaves uniformly.
pub struct BanphraseRule {
    pub def: BanphraseDefinition,
    matcher: Regex,
}

impl BanphraseRule {
    fn compile(def: BanphraseDefinition) -> Option<Self> {
        let source = if def.regex {
            def.pattern.clone()
        } else {
            regex::escape(&def.pattern)
        };
        let matcher = match RegexBuilder::new(&source)
            .case_insensitive(!def.case_sensitive)
            .build()
        {
            Ok(matcher) => matcher,
            Err(err) => {
                error!("Banphrase {} failed to compile, skipping: {}", def.id, err);
                return None;
            }
        };
        Some(BanphraseRule { def, matcher })
    }

    pub fn triggers(&self, message: &str) -> bool {
        self.matcher.is_match(message)
    }

    /// Substitute every occurrence; only meaningful for replacement rules
    fn replace_all(&self, message: &str) -> Option<String> {
        let replacement = self.def.replacement.as_deref()?;
        Some(
            self.matcher
                .replace_all(message, NoExpand(replacement))
                .into_owned(),
        )
    }

    fn in_scope(&self, channel: Option<&ChannelDefinition>) -> bool {
        match channel {
            Some(channel) => {
                self.def.channel_id == Some(channel.id)
                    || (self.def.channel_id.is_none()
                        && self.def.platform_id == Some(channel.platform_id))
                    || (self.def.channel_id.is_none() && self.def.platform_id.is_none())
            }
            // private messages only see globally scoped rules
            None => self.def.channel_id.is_none() && self.def.platform_id.is_none(),
        }
    }
}

/// Snapshot of the banphrase table, pre-sorted by descending priority and
/// split into the regular cascade and the api-response templates.
pub struct BanphraseStore {
    rules: Vec<Arc<BanphraseRule>>,
    api_responses: Vec<Arc<BanphraseRule>>,
}

impl BanphraseStore {
    pub fn load(definitions: Vec<BanphraseDefinition>) -> Self {
        let mut rules = Vec::new();
        let mut api_responses = Vec::new();

        for def in definitions {
            if !def.active || def.kind == BanphraseKind::Inactive {
                continue;
            }
            let is_api_response = def.kind == BanphraseKind::ApiResponse;
            if let Some(rule) = BanphraseRule::compile(def) {
                if is_api_response {
                    api_responses.push(Arc::new(rule));
                } else {
                    rules.push(Arc::new(rule));
                }
            }
        }

        rules.sort_by_key(|rule| std::cmp::Reverse(rule.def.priority));
        api_responses.sort_by_key(|rule| std::cmp::Reverse(rule.def.priority));

        BanphraseStore {
            rules,
            api_responses,
        }
    }

    /// Run the local cascade: replacements compose in priority order, any
    /// other triggered rule short-circuits the fold.
    pub fn fold(&self, message: &str, channel: Option<&ChannelDefinition>) -> BanphraseCheckResult {
        let mut message = message.to_string();

        for rule in self.rules.iter().filter(|rule| rule.in_scope(channel)) {
            if !rule.triggers(&message) {
                continue;
            }
            match rule.def.kind {
                BanphraseKind::Replacement => {
                    if let Some(rewritten) = rule.replace_all(&message) {
                        message = rewritten;
                    }
                }
                BanphraseKind::CustomResponse => {
                    return BanphraseCheckResult::cut(rule.def.response.clone());
                }
                // Denial (and anything without a response) drops the message
                _ => return BanphraseCheckResult::cut(None),
            }
        }

        BanphraseCheckResult::passed(message)
    }

    /// Reply template for a message the external API flagged: the first
    /// in-scope api-response rule that triggers decides the reply.
    pub fn api_response_for(
        &self,
        message: &str,
        channel: Option<&ChannelDefinition>,
    ) -> Option<Option<String>> {
        self.api_responses
            .iter()
            .filter(|rule| rule.in_scope(channel))
            .find(|rule| rule.triggers(message))
            .map(|rule| rule.def.response.clone())
    }

    pub fn len(&self) -> usize {
        self.rules.len() + self.api_responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.api_responses.is_empty()
    }
}
