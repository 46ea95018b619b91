use crate::config::AppConfig;

/// The two ways a video can be delivered, both derived from its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLocator {
    /// Segmented, bitrate-adaptive HLS manifest.
    pub adaptive: String,
    /// Single-file fallback.
    pub direct: String,
}

#[derive(Debug, Clone)]
pub struct Locators {
    base: String,
    share_base: String,
}

impl Locators {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            base: config.api_base_url.trim_end_matches('/').to_string(),
            share_base: config.share_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn stream(&self, video_id: &str) -> StreamLocator {
        StreamLocator {
            adaptive: format!("{}/webapi/media/stream/{}/master.m3u8", self.base, video_id),
            direct: format!("{}/webapi/media/video/{}", self.base, video_id),
        }
    }

    pub fn thumbnail(&self, video_id: &str) -> String {
        format!("{}/webapi/media/thumb/{}", self.base, video_id)
    }

    /// Canonical link handed to presence reporters.
    pub fn share_link(&self, video_id: &str) -> String {
        format!("{}/{}", self.share_base, video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locators_are_derived_from_the_id() {
        let config = AppConfig {
            api_base_url: "https://proxy.example/".into(),
            ..AppConfig::default()
        };
        let locators = Locators::new(&config);
        let stream = locators.stream("abc");
        assert_eq!(
            stream.adaptive,
            "https://proxy.example/webapi/media/stream/abc/master.m3u8"
        );
        assert_eq!(stream.direct, "https://proxy.example/webapi/media/video/abc");
        assert_eq!(
            locators.thumbnail("abc"),
            "https://proxy.example/webapi/media/thumb/abc"
        );
        assert_eq!(locators.share_link("abc"), "https://v2.protogen.fr/video/abc");
    }
}
