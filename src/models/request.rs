use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SongRequestBody {
    #[serde(default)]
    #[validate(length(min = 1, max = 500, message = "Input must be 1 to 500 characters"))]
    pub input: String,
    /// Skip fetching audio when false
    #[serde(default = "default_download")]
    pub download: bool,
}

fn default_download() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_defaults_to_true() {
        let body: SongRequestBody = serde_json::from_str(r#"{"input": "play Joha"}"#).unwrap();
        assert!(body.download);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn input_length_is_bounded() {
        let empty: SongRequestBody = serde_json::from_str("{}").unwrap();
        assert!(empty.validate().is_err());

        let long = SongRequestBody {
            input: "a".repeat(501),
            download: false,
        };
        assert!(long.validate().is_err());
    }
}
