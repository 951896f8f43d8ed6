use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Input configuration used to elicit an empathy rating for a segment.
///
/// Determines which segment attributes the prompt builder requires:
/// `Transcript` and `Combined` need the transcript text, `AudioFeatures` and
/// `Combined` need the feature vector, `RawAudio` needs the audio clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Transcript,
    AudioFeatures,
    Combined,
    RawAudio,
}

impl Modality {
    /// All modalities in canonical order (used for deterministic reporting).
    pub const ALL: [Modality; 4] = [
        Modality::Transcript,
        Modality::AudioFeatures,
        Modality::Combined,
        Modality::RawAudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Transcript => "transcript",
            Modality::AudioFeatures => "audio_features",
            Modality::Combined => "combined",
            Modality::RawAudio => "raw_audio",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transcript" | "text" | "t" => Ok(Modality::Transcript),
            "audio_features" | "features" | "f" => Ok(Modality::AudioFeatures),
            "combined" | "c" => Ok(Modality::Combined),
            "raw_audio" | "audio" | "a" => Ok(Modality::RawAudio),
            other => Err(format!(
                "unknown modality '{}' (expected one of: transcript, audio_features, combined, raw_audio)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_aliases() {
        assert_eq!("transcript".parse::<Modality>().unwrap(), Modality::Transcript);
        assert_eq!("Features".parse::<Modality>().unwrap(), Modality::AudioFeatures);
        assert_eq!(" combined ".parse::<Modality>().unwrap(), Modality::Combined);
        assert_eq!("audio".parse::<Modality>().unwrap(), Modality::RawAudio);
        assert!("video".parse::<Modality>().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&Modality::AudioFeatures).unwrap();
        assert_eq!(json, "\"audio_features\"");
        let back: Modality = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Modality::AudioFeatures);
    }
}
