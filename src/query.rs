//! Ordered protocol parameters and the per-case derivation.
//!
//! The derived mapping is computed once per case and shared read-only by the
//! oracle call and by code emission, so what is signed and what the generated
//! test claims to sign cannot drift apart.
use crate::cases::{Amount, TestCase};

pub const ID_KEY: &str = "id";
pub const TAG_KEY: &str = "tag";
pub const NONCE_KEY: &str = "nonce";
pub const FIAT_KEY: &str = "fiatCurrency";
pub const SIGNATURE_KEY: &str = "signature";
pub const MIN_WITHDRAWABLE_KEY: &str = "minWithdrawable";
pub const MAX_WITHDRAWABLE_KEY: &str = "maxWithdrawable";
pub const DEFAULT_DESCRIPTION_KEY: &str = "defaultDescription";

/// Long to short key table for shortened URLs. `id` is already short.
pub const SHORT_KEYS: &[(&str, &str)] = &[
    (NONCE_KEY, "n"),
    (SIGNATURE_KEY, "s"),
    (TAG_KEY, "t"),
    (MIN_WITHDRAWABLE_KEY, "pn"),
    (MAX_WITHDRAWABLE_KEY, "px"),
    (DEFAULT_DESCRIPTION_KEY, "pd"),
    (FIAT_KEY, "f"),
];

/// Long to short tag values for shortened URLs.
pub const SHORT_TAGS: &[(&str, &str)] = &[("withdrawRequest", "w")];

pub fn short_key(key: &str) -> Option<&'static str> {
    SHORT_KEYS
        .iter()
        .find(|(long, _)| *long == key)
        .map(|(_, short)| *short)
}

pub fn short_tag(tag: &str) -> Option<&'static str> {
    SHORT_TAGS
        .iter()
        .find(|(long, _)| *long == tag)
        .map(|(_, short)| *short)
}

/// Keys a custom parameter may not use, in long and short form.
pub fn is_reserved_key(key: &str) -> bool {
    key == ID_KEY
        || SHORT_KEYS
            .iter()
            .any(|(long, short)| *long == key || *short == key)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Amount(Amount),
}

impl ParamValue {
    pub fn to_query_string(&self) -> String {
        match self {
            ParamValue::Text(text) => text.clone(),
            ParamValue::Amount(amount) => amount.query_value(),
        }
    }
}

/// Insertion-ordered parameter mapping.
///
/// Setting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    entries: Vec<(String, ParamValue)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: ParamValue) {
        match self.entries.iter_mut().find(|(existing, _)| existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Derive the effective parameter mapping for one case.
///
/// Order: base params, fiat currency, nonce, then custom params (custom keys
/// win on collision).
pub fn derive_params(case: &TestCase) -> Query {
    let mut query = Query::new();
    query.set(
        MIN_WITHDRAWABLE_KEY,
        ParamValue::Amount(case.params.min_withdrawable),
    );
    query.set(
        MAX_WITHDRAWABLE_KEY,
        ParamValue::Amount(case.params.max_withdrawable),
    );
    query.set(
        DEFAULT_DESCRIPTION_KEY,
        ParamValue::Text(case.params.default_description.clone()),
    );
    if let Some(currency) = case.fiat_currency() {
        query.set(FIAT_KEY, ParamValue::Text(currency.to_string()));
    }
    if let Some(nonce) = case.nonce() {
        query.set(NONCE_KEY, ParamValue::Text(nonce.to_string()));
    }
    if let Some(custom) = &case.custom_params {
        for (key, value) in custom {
            query.set(key, ParamValue::Text(value.clone()));
        }
    }
    query
}
