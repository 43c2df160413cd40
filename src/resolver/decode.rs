use anyhow::{Result, bail};

/// Marker the catalog API puts in front of hex-pair encoded source URLs.
pub const OBFUSCATION_PREFIX: &str = "--";

const ALLANIME_BASE_URL: &str = "https://allanime.day";

/// Decodes a raw `sourceUrl` field. Fields carrying the `--` prefix are
/// hex-pair encoded; everything else is already plaintext and passes
/// through unchanged.
pub fn decode_source_url(raw: &str) -> Result<String> {
    match raw.strip_prefix(OBFUSCATION_PREFIX) {
        Some(encoded) => substitute(encoded),
        None => Ok(raw.to_string()),
    }
}

/// Decodes a string of two-hex-digit pairs. Known pairs go through the
/// substitution table; anything else is read as a literal hex byte value.
/// Provider paths mentioning `clock` are rewritten into the absolute
/// `clock.json` endpoint.
pub fn substitute(encoded: &str) -> Result<String> {
    if encoded.len() % 2 != 0 {
        bail!("encoded source has odd length {}", encoded.len());
    }

    let mut decoded = String::with_capacity(encoded.len() / 2);
    for chunk in encoded.as_bytes().chunks(2) {
        let Ok(pair) = std::str::from_utf8(chunk) else {
            bail!("encoded source is not ASCII hex");
        };
        let ch = match substitute_pair(pair) {
            Some(ch) => ch,
            None => match u8::from_str_radix(pair, 16) {
                Ok(byte) => char::from(byte),
                Err(_) => bail!("invalid hex pair '{pair}' in encoded source"),
            },
        };
        decoded.push(ch);
    }

    if decoded.contains("clock") {
        decoded = format!("{ALLANIME_BASE_URL}{}", decoded.replace("clock", "clock.json"));
    }
    Ok(decoded)
}

// Table entries always win over the generic hex fallback.
fn substitute_pair(pair: &str) -> Option<char> {
    match pair {
        "01" => Some('9'),
        "08" => Some('0'),
        "05" => Some('='),
        "0a" => Some('2'),
        "0b" => Some('3'),
        "0c" => Some('4'),
        "07" => Some('?'),
        "00" => Some('8'),
        "5c" => Some('d'),
        "0f" => Some('7'),
        "5e" => Some('f'),
        "17" => Some('/'),
        "54" => Some('l'),
        "09" => Some('1'),
        "48" => Some('p'),
        "4f" => Some('w'),
        "0e" => Some('6'),
        "5b" => Some('c'),
        "5d" => Some('e'),
        "0d" => Some('5'),
        "53" => Some('k'),
        "1e" => Some('&'),
        "5a" => Some('b'),
        "59" => Some('a'),
        "4a" => Some('r'),
        "4c" => Some('t'),
        "4e" => Some('v'),
        "57" => Some('o'),
        "51" => Some('i'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_table_pairs() {
        // 1080p spelled entirely from table entries.
        assert_eq!(substitute("0908000848").unwrap(), "1080p");
        assert_eq!(substitute("4a5951").unwrap(), "rai");
    }

    #[test]
    fn falls_back_to_literal_hex_for_unknown_pairs() {
        // 0x68 = 'h' is not a table entry.
        assert_eq!(substitute("68").unwrap(), "h");
        assert_eq!(substitute("2e").unwrap(), ".");
    }

    #[test]
    fn rewrites_clock_paths_to_absolute_manifest_urls() {
        let decoded = substitute("636c6f636b").unwrap();
        assert!(decoded.starts_with("https://allanime.day"));
        assert!(decoded.contains("clock.json"));
    }

    #[test]
    fn decodes_a_full_provider_path() {
        // "/apivtwo/" with every character drawn from the table.
        let decoded = substitute("175948514e4c4f5717").unwrap();
        assert_eq!(decoded, "/apivtwo/");
    }

    #[test]
    fn passes_plaintext_urls_through() {
        let url = "https://mirror.example/ep1_720p.mp4";
        assert_eq!(decode_source_url(url).unwrap(), url);
    }

    #[test]
    fn strips_the_prefix_before_decoding() {
        assert_eq!(decode_source_url("--0908000848").unwrap(), "1080p");
    }

    #[test]
    fn rejects_odd_length_input() {
        assert!(substitute("090").is_err());
    }

    #[test]
    fn rejects_non_hex_chunks() {
        assert!(substitute("zz09").is_err());
    }

    #[test]
    fn decoding_plaintext_is_idempotent() {
        let url = "https://mirror.example/a.m3u8";
        let once = decode_source_url(url).unwrap();
        assert_eq!(decode_source_url(&once).unwrap(), once);
    }
}
