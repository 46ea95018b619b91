//! Minimal HLS loading: master playlist, one variant, its segments fed
//! sequentially into a `StreamWriter`.

use crate::audio::stream_source::StreamWriter;
use crate::error::{AppError, AppResult};
use futures_util::StreamExt;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub bandwidth: u64,
    pub playlist_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub duration: f64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariantPlaylist {
    /// `#EXT-X-MAP` initialization section, if any.
    pub init_url: Option<String>,
    pub segments: Vec<Segment>,
}

impl VariantPlaylist {
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Container extension of the first segment, used as a probe hint.
    pub fn extension_hint(&self) -> Option<String> {
        let first = self.init_url.as_ref().or(self.segments.first().map(|s| &s.url))?;
        let path = Url::parse(first).ok()?.path().to_string();
        let ext = path.rsplit_once('.')?.1.to_lowercase();
        Some(match ext.as_str() {
            "m4s" | "mp4" | "m4a" => "mp4".to_string(),
            other => other.to_string(),
        })
    }
}

fn resolve(base: &Url, reference: &str) -> AppResult<String> {
    base.join(reference)
        .map(|u| u.to_string())
        .map_err(|e| AppError::Stream(format!("Bad playlist URI '{}': {}", reference, e)))
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    attrs.split(',').find_map(|attr| {
        let (key, value) = attr.split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"'))
    })
}

/// Variants of a master playlist, lowest bandwidth first. Empty when the
/// document is already a media playlist.
pub fn parse_master_playlist(content: &str, base: &Url) -> AppResult<Vec<Variant>> {
    if !content.trim_start().starts_with("#EXTM3U") {
        return Err(AppError::Stream("Not an M3U8 playlist".into()));
    }

    let mut variants = Vec::new();
    let mut lines = content.lines().map(str::trim);
    while let Some(line) = lines.next() {
        if let Some(info) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let bandwidth = attribute(info, "BANDWIDTH")
                .and_then(|b| b.parse().ok())
                .unwrap_or(0);
            if let Some(uri) = lines.by_ref().find(|l| !l.is_empty() && !l.starts_with('#')) {
                variants.push(Variant {
                    bandwidth,
                    playlist_url: resolve(base, uri)?,
                });
            }
        }
    }

    variants.sort_by_key(|v| v.bandwidth);
    Ok(variants)
}

pub fn parse_variant_playlist(content: &str, base: &Url) -> AppResult<VariantPlaylist> {
    let mut playlist = VariantPlaylist::default();
    let mut pending_duration: Option<f64> = None;

    for line in content.lines().map(str::trim) {
        if let Some(map) = line.strip_prefix("#EXT-X-MAP:") {
            if let Some(uri) = attribute(map, "URI") {
                playlist.init_url = Some(resolve(base, uri)?);
            }
        } else if let Some(info) = line.strip_prefix("#EXTINF:") {
            pending_duration = info.split(',').next().and_then(|d| d.trim().parse().ok());
        } else if !line.is_empty() && !line.starts_with('#') {
            if let Some(duration) = pending_duration.take() {
                playlist.segments.push(Segment {
                    duration,
                    url: resolve(base, line)?,
                });
            }
        }
    }

    if playlist.segments.is_empty() {
        return Err(AppError::Stream("Playlist has no segments".into()));
    }
    Ok(playlist)
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> AppResult<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Stream(format!("{} returned HTTP {}", url, status)));
    }
    Ok(response.text().await?)
}

/// Resolve a manifest locator down to a playable segment list.
pub async fn load(client: &reqwest::Client, manifest_url: &str) -> AppResult<VariantPlaylist> {
    let base = Url::parse(manifest_url)
        .map_err(|e| AppError::Stream(format!("Bad manifest URL: {}", e)))?;
    let master = fetch_text(client, manifest_url).await?;
    let variants = parse_master_playlist(&master, &base)?;

    // Audio is the same in every rendition; the smallest downloads fastest.
    let Some(variant) = variants.first() else {
        return parse_variant_playlist(&master, &base);
    };
    log::info!(
        "[hls] Using variant {} ({} bps) of {}",
        variant.playlist_url,
        variant.bandwidth,
        variants.len()
    );

    let variant_base = Url::parse(&variant.playlist_url)
        .map_err(|e| AppError::Stream(format!("Bad variant URL: {}", e)))?;
    let content = fetch_text(client, &variant.playlist_url).await?;
    parse_variant_playlist(&content, &variant_base)
}

async fn copy_url(client: &reqwest::Client, url: &str, writer: &StreamWriter) -> AppResult<u64> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Stream(format!("Segment HTTP {}", status)));
    }
    let mut stream = response.bytes_stream();
    let mut total = 0u64;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total += bytes.len() as u64;
        writer.write_bytes(&bytes)?;
    }
    Ok(total)
}

/// Download the init section and every segment in order into `writer`.
pub fn start_segment_download(
    writer: StreamWriter,
    playlist: VariantPlaylist,
    client: reqwest::Client,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let urls = playlist
            .init_url
            .iter()
            .chain(playlist.segments.iter().map(|s| &s.url));
        let mut total = 0u64;
        for url in urls {
            match copy_url(&client, url, &writer).await {
                Ok(n) => total += n,
                Err(_) if writer.is_closed() => {
                    log::debug!("[hls] Reader closed, stopping segment download");
                    return;
                }
                Err(e) => {
                    log::warn!("[hls] Segment download failed: {}", e);
                    writer.set_error(e.to_string());
                    return;
                }
            }
        }
        log::info!("[hls] Segment download complete: {} bytes", total);
        writer.finish();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://cdn.example/webapi/media/stream/abc/master.m3u8").unwrap()
    }

    #[test]
    fn master_variants_sorted_and_resolved() {
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"\n\
            720p/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
            360p/index.m3u8\n";
        let variants = parse_master_playlist(master, &base()).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].bandwidth, 800000);
        assert_eq!(
            variants[0].playlist_url,
            "https://cdn.example/webapi/media/stream/abc/360p/index.m3u8"
        );
    }

    #[test]
    fn media_playlist_has_no_variants() {
        let media = "#EXTM3U\n#EXTINF:4.0,\nseg0.ts\n";
        assert!(parse_master_playlist(media, &base()).unwrap().is_empty());
        assert!(parse_master_playlist("<html>", &base()).is_err());
    }

    #[test]
    fn variant_segments_and_init_map() {
        let content = "#EXTM3U\n\
            #EXT-X-TARGETDURATION:6\n\
            #EXT-X-MAP:URI=\"init.mp4\"\n\
            #EXTINF:6.0,\n\
            seg0.m4s\n\
            #EXTINF:4.5,\n\
            /abs/seg1.m4s\n\
            #EXT-X-ENDLIST\n";
        let playlist = parse_variant_playlist(content, &base()).unwrap();
        assert_eq!(
            playlist.init_url.as_deref(),
            Some("https://cdn.example/webapi/media/stream/abc/init.mp4")
        );
        assert_eq!(playlist.segments[1].url, "https://cdn.example/abs/seg1.m4s");
        assert_eq!(playlist.total_duration(), 10.5);
        assert_eq!(playlist.extension_hint().as_deref(), Some("mp4"));
    }

    #[test]
    fn empty_variant_is_an_error() {
        assert!(parse_variant_playlist("#EXTM3U\n#EXT-X-ENDLIST\n", &base()).is_err());
    }
}
