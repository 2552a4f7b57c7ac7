//! Reference signer used to compute expected URLs for generated tests.
//!
//! The generator treats whatever the oracle returns as ground truth and embeds
//! it verbatim. `LnurlSigner` is the production oracle; tests substitute their
//! own implementations through `ReferenceOracle`.
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::cases::{ApiKey, KeyEncoding, ParamShape};
use crate::query::{self, Query, FIAT_KEY, ID_KEY, NONCE_KEY, SIGNATURE_KEY, TAG_KEY};

type HmacSha256 = Hmac<Sha256>;

/// Human-readable part of bech32-encoded LNURLs.
pub const LNURL_HRP: &str = "lnurl";

/// Characters `encodeURIComponent` leaves intact besides ASCII alphanumerics.
const URI_COMPONENT_SAFE: &[u8] = b"-_.!~*'()";

/// How a signer lays out and signs its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScheme {
    /// Keys sorted ascending in both payload and URL. The signature covers
    /// the full-form query; shortening happens afterwards.
    Sorted,
    /// Keys kept in layout order. Shortening happens first and the signature
    /// covers exactly the query that ends up in the URL.
    Ordered,
}

impl From<ParamShape> for QueryScheme {
    fn from(shape: ParamShape) -> Self {
        match shape {
            ParamShape::Plain => QueryScheme::Sorted,
            ParamShape::Scaled => QueryScheme::Ordered,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SignOptions<'a> {
    /// Base URL the signed query is appended to.
    pub base_url: &'a str,
    /// Bech32-encode the final URL. The generator always passes `false`.
    pub encode_output: bool,
    /// Use the short key/tag layout.
    pub shorten: bool,
    pub scheme: QueryScheme,
}

pub trait ReferenceOracle {
    /// Compute the signed URL for `params` under `api_key`.
    fn sign(
        &self,
        api_key: &ApiKey,
        tag: &str,
        params: &Query,
        options: &SignOptions<'_>,
    ) -> Result<String>;
}

/// HMAC-SHA256 LNURL signer.
///
/// Layout: `id`, `tag`, then `nonce` and `fiatCurrency` when present, then the
/// remaining params in order. `QueryScheme` decides whether that layout is
/// kept or sorted, and whether the signature is taken before or after
/// shortening. The signature pair always comes last in ordered layouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LnurlSigner;

impl ReferenceOracle for LnurlSigner {
    fn sign(
        &self,
        api_key: &ApiKey,
        tag: &str,
        params: &Query,
        options: &SignOptions<'_>,
    ) -> Result<String> {
        if options.base_url.is_empty() {
            return Err(anyhow!("base url is required"));
        }
        let key = decode_key(api_key)?;
        let mut pairs = layout(api_key, tag, params);

        match options.scheme {
            QueryScheme::Sorted => {
                sort_by_key(&mut pairs);
                let signature = create_signature(&key, &stringify(&pairs))?;
                upsert(&mut pairs, SIGNATURE_KEY, &signature);
                if options.shorten {
                    pairs = shorten_pairs(pairs);
                }
                sort_by_key(&mut pairs);
            }
            QueryScheme::Ordered => {
                let mut signature_key = SIGNATURE_KEY;
                if options.shorten {
                    pairs = shorten_pairs(pairs);
                    signature_key = query::short_key(SIGNATURE_KEY).unwrap_or(SIGNATURE_KEY);
                }
                let signature = create_signature(&key, &stringify(&pairs))?;
                upsert(&mut pairs, signature_key, &signature);
            }
        }

        let url = format!("{}?{}", options.base_url, stringify(&pairs));
        if options.encode_output {
            return encode_lnurl(&url);
        }
        Ok(url)
    }
}

fn layout(api_key: &ApiKey, tag: &str, params: &Query) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    upsert(&mut pairs, ID_KEY, &api_key.id);
    upsert(&mut pairs, TAG_KEY, tag);
    for lead in [NONCE_KEY, FIAT_KEY] {
        if let Some(value) = params.get(lead) {
            upsert(&mut pairs, lead, &value.to_query_string());
        }
    }
    for (name, value) in params.iter() {
        upsert(&mut pairs, name, &value.to_query_string());
    }
    pairs
}

fn upsert(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    match pairs.iter_mut().find(|(existing, _)| existing == key) {
        Some(entry) => entry.1 = value.to_string(),
        None => pairs.push((key.to_string(), value.to_string())),
    }
}

/// Byte-wise ascending key order.
fn sort_by_key(pairs: &mut [(String, String)]) {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
}

/// Signing key bytes for the configured encoding.
pub fn decode_key(api_key: &ApiKey) -> Result<Vec<u8>> {
    match api_key.encoding {
        KeyEncoding::Hex => hex::decode(&api_key.key)
            .with_context(|| format!("decode hex key for api key {}", api_key.id)),
        KeyEncoding::Base64 => base64::engine::general_purpose::STANDARD
            .decode(&api_key.key)
            .with_context(|| format!("decode base64 key for api key {}", api_key.id)),
        KeyEncoding::Unspecified => Ok(api_key.key.as_bytes().to_vec()),
    }
}

fn create_signature(key: &[u8], payload: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|err| anyhow!("init hmac-sha256: {err}"))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn shorten_pairs(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    pairs
        .into_iter()
        .map(|(key, value)| {
            let value = if key == TAG_KEY {
                query::short_tag(&value)
                    .map(str::to_string)
                    .unwrap_or(value)
            } else {
                value
            };
            let key = query::short_key(&key).map(str::to_string).unwrap_or(key);
            (key, value)
        })
        .collect()
}

/// `k=v` pairs joined with `&`, each side percent-encoded.
fn stringify(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", encode_uri_component(key), encode_uri_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything outside the `encodeURIComponent` safe set.
pub fn encode_uri_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || URI_COMPONENT_SAFE.contains(&byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Bech32-encode a URL under the `lnurl` HRP.
pub fn encode_lnurl(url: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(LNURL_HRP).map_err(|err| anyhow!("parse lnurl hrp: {err}"))?;
    bech32::encode::<bech32::Bech32>(hrp, url.as_bytes())
        .map_err(|err| anyhow!("bech32 encode url: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::Amount;
    use crate::query::{
        ParamValue, DEFAULT_DESCRIPTION_KEY, MAX_WITHDRAWABLE_KEY, MIN_WITHDRAWABLE_KEY,
    };

    const BASE_URL: &str = "https://localhost:3000/lnurl";

    fn hex_key() -> ApiKey {
        ApiKey {
            id: "5d4aeb462a".to_string(),
            key: "ef9901bebc801518e7d862c2edaedd3acd86ec132fb3bd5ac0013c9a5ba478db".to_string(),
            encoding: KeyEncoding::Hex,
        }
    }

    fn base64_key(encoding: KeyEncoding) -> ApiKey {
        ApiKey {
            id: "9Pfv1wY=".to_string(),
            key: "zc5UwZHCrug1GuOTIodVQKFii40gXEDbydClsqs/tIM=".to_string(),
            encoding,
        }
    }

    /// Params in derivation order: bounds, description, then `extra`.
    fn withdraw(min: f64, max: f64, description: &str, extra: &[(&str, &str)]) -> Query {
        let mut query = Query::new();
        query.set(MIN_WITHDRAWABLE_KEY, ParamValue::Amount(Amount(min)));
        query.set(MAX_WITHDRAWABLE_KEY, ParamValue::Amount(Amount(max)));
        query.set(
            DEFAULT_DESCRIPTION_KEY,
            ParamValue::Text(description.to_string()),
        );
        for (key, value) in extra {
            query.set(key, ParamValue::Text((*value).to_string()));
        }
        query
    }

    fn sign(api_key: &ApiKey, params: &Query, scheme: QueryScheme, shorten: bool) -> String {
        let options = SignOptions {
            base_url: BASE_URL,
            encode_output: false,
            shorten,
            scheme,
        };
        LnurlSigner
            .sign(api_key, "withdrawRequest", params, &options)
            .expect("sign")
    }

    #[test]
    fn sorted_scheme_orders_url_alphabetically() {
        let params = withdraw(40000.0, 60000.0, "", &[("nonce", "test_withdraw")]);
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Sorted, false),
            "https://localhost:3000/lnurl?defaultDescription=&id=5d4aeb462a&maxWithdrawable=60000&minWithdrawable=40000&nonce=test_withdraw&signature=73eed1984c403ff10d3ae211fe0dbc880ce16923abe3da08aedea5cd80fb7f8f&tag=withdrawRequest"
        );
    }

    #[test]
    fn sorted_scheme_signs_before_shortening() {
        let params = withdraw(50000.0, 60000.0, "", &[("nonce", "test_w_s")]);
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Sorted, true),
            "https://localhost:3000/lnurl?id=5d4aeb462a&n=test_w_s&pd=&pn=50000&px=60000&s=de03a6590821287d5cba14f99e74fa8fb047118ea2cf1a8f0e812a6c42a99277&t=w"
        );
    }

    #[test]
    fn sorted_scheme_places_custom_params_by_key() {
        let params = withdraw(
            50000.0,
            50000.0,
            "",
            &[
                ("nonce", "test_withdraw_custom_params"),
                ("custom1", "custom param"),
                ("custom2", "another custom param"),
            ],
        );
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Sorted, false),
            "https://localhost:3000/lnurl?custom1=custom%20param&custom2=another%20custom%20param&defaultDescription=&id=5d4aeb462a&maxWithdrawable=50000&minWithdrawable=50000&nonce=test_withdraw_custom_params&signature=d91d2e693075c9e5f2e97bf212593655145508c96c5813c10e3f8f3c86141e1d&tag=withdrawRequest"
        );
    }

    #[test]
    fn ordered_scheme_keeps_layout_and_signs_it() {
        let params = withdraw(50000.0, 60000.0, "", &[("nonce", "test_withdraw_msat")]);
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Ordered, false),
            "https://localhost:3000/lnurl?id=5d4aeb462a&tag=withdrawRequest&nonce=test_withdraw_msat&minWithdrawable=50000&maxWithdrawable=60000&defaultDescription=&signature=bc84dea0d79193208cbcb3a8cf848620016306d4bd01254ef2c6d6bd75e83ab7"
        );
    }

    #[test]
    fn ordered_scheme_leads_with_nonce_then_fiat() {
        let params = withdraw(
            50.0,
            50.0,
            "description: test_withdraw_fiat",
            &[("fiatCurrency", "CZK"), ("nonce", "test_withdraw_fiat")],
        );
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Ordered, false),
            "https://localhost:3000/lnurl?id=5d4aeb462a&tag=withdrawRequest&nonce=test_withdraw_fiat&fiatCurrency=CZK&minWithdrawable=50&maxWithdrawable=50&defaultDescription=description%3A%20test_withdraw_fiat&signature=99bdbe1f273732640b1c02f83f3bf54e7bba8bd95000c6782375006d0ea08d3a"
        );
    }

    #[test]
    fn ordered_scheme_signs_the_shortened_query() {
        let params = withdraw(50000.0, 60000.0, "", &[("nonce", "test_w_msat_s")]);
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Ordered, true),
            "https://localhost:3000/lnurl?id=5d4aeb462a&t=w&n=test_w_msat_s&pn=50000&px=60000&pd=&s=6b07f932343090197a962a2dc6f9ba480ba30fd91554dc40259db0304d77a001"
        );

        let params = withdraw(
            50.0,
            50.0,
            "",
            &[("fiatCurrency", "CZK"), ("nonce", "test_w_fiat_s")],
        );
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Ordered, true),
            "https://localhost:3000/lnurl?id=5d4aeb462a&t=w&n=test_w_fiat_s&f=CZK&pn=50&px=50&pd=&s=a96605f2e13c3211f0752b8c9870def55e0e854d57254ab0f8fae4975e85e1d3"
        );
    }

    #[test]
    fn ordered_scheme_keeps_declared_custom_order() {
        let params = withdraw(1.0, 2.0, "", &[("nonce", "n1"), ("zeta", "z"), ("alpha", "a")]);
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Ordered, false),
            "https://localhost:3000/lnurl?id=5d4aeb462a&tag=withdrawRequest&nonce=n1&minWithdrawable=1&maxWithdrawable=2&defaultDescription=&zeta=z&alpha=a&signature=4e6d6161a169280ef5501c0a5873260c925c1baacdbc57577c9644a880ca1105"
        );
    }

    #[test]
    fn key_encodings_change_the_signature() {
        let params = withdraw(50000.0, 60000.0, "", &[("nonce", "test_base64_encoded_key")]);
        assert!(
            sign(&base64_key(KeyEncoding::Base64), &params, QueryScheme::Sorted, false).contains(
                "&signature=b4cfc6a922055b6be83d226a2ea85f12f01de39102b9865bab877e08b06f0927&"
            )
        );
        assert_eq!(
            sign(&base64_key(KeyEncoding::Base64), &params, QueryScheme::Ordered, false),
            "https://localhost:3000/lnurl?id=9Pfv1wY%3D&tag=withdrawRequest&nonce=test_base64_encoded_key&minWithdrawable=50000&maxWithdrawable=60000&defaultDescription=&signature=d4c92e08259b5fe9dd41f94433f0416d703f36e108d5eeb00dc075b2d255f5a5"
        );

        let params = withdraw(
            50000.0,
            60000.0,
            "",
            &[("nonce", "test_base64_unspecified_encoding")],
        );
        assert!(sign(
            &base64_key(KeyEncoding::Unspecified),
            &params,
            QueryScheme::Sorted,
            false
        )
        .contains("&signature=42de7ce7a83fd51ae6eaafc3c72265dc169e3636706946f680c059bb07d8f66b&"));
        assert!(sign(
            &base64_key(KeyEncoding::Unspecified),
            &params,
            QueryScheme::Ordered,
            false
        )
        .ends_with("&signature=7ef98c9c2b874d4f4b58746bb105bc8eef9993f25332362f8fe87384b0b6cc26"));
    }

    #[test]
    fn missing_nonce_is_simply_omitted() {
        let params = withdraw(1.0, 2.0, "", &[]);
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Sorted, false),
            "https://localhost:3000/lnurl?defaultDescription=&id=5d4aeb462a&maxWithdrawable=2&minWithdrawable=1&signature=aa5a040e7a4f64d93a9617906d77e4785fbb8c815d948e59f2b97967f0b0e7ce&tag=withdrawRequest"
        );
        assert_eq!(
            sign(&hex_key(), &params, QueryScheme::Ordered, false),
            "https://localhost:3000/lnurl?id=5d4aeb462a&tag=withdrawRequest&minWithdrawable=1&maxWithdrawable=2&defaultDescription=&signature=841f50a917fc3053093c297152339877f60270797d9d18c6790ba8ddc09b17e4"
        );
    }

    #[test]
    fn scheme_follows_parameter_shape() {
        assert_eq!(QueryScheme::from(ParamShape::Plain), QueryScheme::Sorted);
        assert_eq!(QueryScheme::from(ParamShape::Scaled), QueryScheme::Ordered);
    }

    #[test]
    fn malformed_keys_are_errors() {
        let options = SignOptions {
            base_url: BASE_URL,
            encode_output: false,
            shorten: false,
            scheme: QueryScheme::Ordered,
        };
        let mut key = hex_key();
        key.key = "not-hex".to_string();
        let params = withdraw(1.0, 2.0, "", &[]);
        let err = LnurlSigner
            .sign(&key, "withdrawRequest", &params, &options)
            .expect_err("bad hex");
        assert!(format!("{err:#}").contains("decode hex key"));

        let mut key = base64_key(KeyEncoding::Base64);
        key.key = "%%%".to_string();
        assert!(LnurlSigner
            .sign(&key, "withdrawRequest", &params, &options)
            .is_err());
    }

    #[test]
    fn empty_base_url_is_an_error() {
        let params = withdraw(1.0, 2.0, "", &[]);
        let options = SignOptions {
            base_url: "",
            encode_output: false,
            shorten: false,
            scheme: QueryScheme::Sorted,
        };
        assert!(LnurlSigner
            .sign(&hex_key(), "withdrawRequest", &params, &options)
            .is_err());
    }

    #[test]
    fn uri_component_encoding_matches_reserved_and_unreserved_sets() {
        assert_eq!(
            encode_uri_component("abcABC0123 ESCAPED # UNESCAPED -_.!~*'() RESERVED ;,/?:@&=+$"),
            "abcABC0123%20ESCAPED%20%23%20UNESCAPED%20-_.!~*'()%20RESERVED%20%3B%2C%2F%3F%3A%40%26%3D%2B%24"
        );
        assert_eq!(encode_uri_component("é"), "%C3%A9");
    }

    #[test]
    fn encodes_lnurl_bech32() {
        let encoded = encode_lnurl(
            "https://service.com/api?q=3fc3645b439ce8e7f2553a69e5267081d96dcd340693afabe04be7b0ccd178df",
        )
        .expect("encode");
        assert_eq!(
            encoded,
            "lnurl1dp68gurn8ghj7um9wfmxjcm99e3k7mf0v9cxj0m385ekvcenxc6r2c35xvukxefcv5mkvv34x5ekzd3ev56nyd3hxqurzepexejxxepnxscrvwfnv9nxzcn9xq6xyefhvgcxxcmyxymnserxfq5fns"
        );
    }
}
