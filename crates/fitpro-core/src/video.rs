//! Normalization of workout video links.
//!
//! Workouts reference YouTube videos in whatever form the content authors
//! pasted: watch pages, short links, shorts, existing embed links or a bare
//! video id. Players need the embed form, so everything is mapped to
//! `https://www.youtube.com/embed/<id>`. Feeding an embed URL back in returns
//! it unchanged.

use reqwest::Url;

const EMBED_BASE: &str = "https://www.youtube.com/embed/";

/// YouTube video ids are exactly this long
const VIDEO_ID_LEN: usize = 11;

fn is_video_id(s: &str) -> bool {
    s.len() == VIDEO_ID_LEN
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);
    matches!(
        host,
        "youtube.com" | "youtube-nocookie.com" | "music.youtube.com"
    )
}

/// Extract the video id from any supported link form
pub fn video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }

    let url = Url::parse(input)
        .or_else(|_| Url::parse(&format!("https://{}", input)))
        .ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    let candidate = if host == "youtu.be" || host == "www.youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if is_youtube_host(&host) {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| is_video_id(id))
}

/// Canonical embeddable URL for a video link, or `None` if the link is not
/// a recognizable YouTube video
pub fn embed_url(input: &str) -> Option<String> {
    video_id(input).map(|id| format!("{}{}", EMBED_BASE, id))
}
