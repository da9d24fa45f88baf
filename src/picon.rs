//! Picon naming rules
//!
//! Receivers store channel logos under `/picon/` using a filesystem-safe token
//! derived from the channel name (the same rule Enigma2's picon renderer uses),
//! or, on older picon sets, a token derived from the service reference.

use log::debug;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::models::PlaybackType;

/// Service references of recordings played back from disk start with this
const RECORDING_PREFIX: &str = "1:0:0";

/// Characters that never appear in a picon file name
const EXCLUDED_CHARS: &str = r#"[/\\'"`? ():<>|.\n]"#;

/// Turn a channel name into its picon token.
///
/// ```
/// assert_eq!(openwebif::picon::picon_name("RTÉ One"), "rteone");
/// assert_eq!(openwebif::picon::picon_name("Sky Sports+"), "skysportsplus");
/// ```
pub fn picon_name(channel_name: &str) -> String {
    // NFKD splits accents off their base letter, so dropping non-ASCII keeps "E" from "É"
    let ascii: String = channel_name.nfkd().filter(char::is_ascii).collect();

    let stripped = match Regex::new(EXCLUDED_CHARS) {
        Ok(re) => re.replace_all(&ascii, "").into_owned(),
        Err(_) => ascii,
    };

    stripped
        .replace('&', "and")
        .replace('+', "plus")
        .replace('*', "star")
        .to_lowercase()
}

/// Classify a service reference as live or recording playback
pub fn playback_type(service_ref: &str) -> PlaybackType {
    if service_ref.starts_with(RECORDING_PREFIX) {
        PlaybackType::Recording
    } else {
        PlaybackType::Live
    }
}

/// Channel name embedded in a recording's service reference.
///
/// Recording references end in a file path such as
/// `/media/hdd/movie/20190302 2000 - BBC ONE HD - Match of the Day.ts`;
/// the channel is the second `-` separated segment. Falls back to the whole
/// reference when there is none.
pub fn channel_name_from_service_ref(service_ref: &str) -> String {
    match service_ref.split('-').nth(1) {
        Some(segment) => segment.trim().to_string(),
        None => {
            debug!("Cannot determine channel name from recording: {}", service_ref);
            service_ref.to_string()
        }
    }
}

/// Picon token for the service-reference naming scheme.
///
/// `1:0:19:2887:40F:1:C00000:0:0:0:` becomes `1_0_19_2887_40F_1_C00000_0_0_0`.
pub fn service_ref_token(service_ref: &str) -> String {
    service_ref.trim_matches(':').replace(':', "_")
}

/// Name to retry with when `channel_name` ends in "HD": the suffix is dropped
/// along with all whitespace.
pub fn strip_hd_suffix(channel_name: &str) -> Option<String> {
    let split = channel_name.len().checked_sub(2)?;
    let suffix = channel_name.get(split..)?;

    if suffix.eq_ignore_ascii_case("hd") {
        Some(
            channel_name[..split]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect(),
        )
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picon_name_strips_accents() {
        assert_eq!(picon_name("RTÉ One"), "rteone");
        assert_eq!(picon_name("Télé-Québec"), "tele-quebec");
    }

    #[test]
    fn test_picon_name_substitutions() {
        assert_eq!(picon_name("Film & Arts"), "filmandarts");
        assert_eq!(picon_name("Canal+ Sport"), "canalplussport");
        assert_eq!(picon_name("Star*Life"), "starstarlife");
    }

    #[test]
    fn test_picon_name_drops_excluded_characters() {
        let inputs = [
            "BBC One (London)",
            "Channel 4.1",
            "What?/Why\\Not",
            "\"Quoted\" 'name' `tick`",
            "a:b<c>d|e\nf",
            "Das Erste HD",
            "ZDFinfo 日本",
        ];

        for input in inputs {
            let name = picon_name(input);
            assert!(name.is_ascii(), "{:?} -> {:?}", input, name);
            assert_eq!(name, name.to_lowercase());
            for excluded in ['/', '\\', '\'', '"', '`', '?', ' ', '(', ')', ':', '<', '>', '|', '.', '\n'] {
                assert!(!name.contains(excluded), "{:?} kept {:?}", name, excluded);
            }
            for replaced in ['&', '+', '*'] {
                assert!(!name.contains(replaced));
            }
        }
    }

    #[test]
    fn test_playback_type() {
        assert_eq!(
            playback_type("1:0:0:0:0:0:0:0:0:0:/media/hdd/movie/x.ts"),
            PlaybackType::Recording
        );
        assert_eq!(playback_type("1:0:0"), PlaybackType::Recording);
        assert_eq!(
            playback_type("1:0:19:2887:40F:1:C00000:0:0:0:"),
            PlaybackType::Live
        );
        assert_eq!(playback_type("1:0:1:0"), PlaybackType::Live);
        assert_eq!(playback_type(""), PlaybackType::Live);
    }

    #[test]
    fn test_channel_name_from_service_ref() {
        let sref = "1:0:0:0:0:0:0:0:0:0:/media/hdd/movie/20190302 2000 - BBC ONE HD - Match of the Day.ts";
        assert_eq!(channel_name_from_service_ref(sref), "BBC ONE HD");

        let no_dash = "1:0:0:0:0:0:0:0:0:0:/media/hdd/movie/recording.ts";
        assert_eq!(channel_name_from_service_ref(no_dash), no_dash);
    }

    #[test]
    fn test_service_ref_token() {
        assert_eq!(
            service_ref_token("1:0:19:2887:40F:1:C00000:0:0:0:"),
            "1_0_19_2887_40F_1_C00000_0_0_0"
        );
        assert_eq!(service_ref_token(":1:0:1:"), "1_0_1");
    }

    #[test]
    fn test_strip_hd_suffix() {
        assert_eq!(strip_hd_suffix("BBC ONE HD"), Some("BBCONE".to_string()));
        assert_eq!(strip_hd_suffix("sky sports hd"), Some("skysports".to_string()));
        assert_eq!(strip_hd_suffix("BBC One"), None);
        assert_eq!(strip_hd_suffix("H"), None);
        assert_eq!(strip_hd_suffix("Ñ"), None);
    }
}
