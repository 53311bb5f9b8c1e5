//! YouTube link enrichment.
//!
//! A line consisting of a YouTube link is answered with the title and channel
//! of the video, looked up with the YouTube Data API v3.

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    api::{UrlMatch, UrlProcessor},
    config,
};

/// Canonical, embedded and old `/v/` links.
const LONG_URL_PATTERN: &str =
    r"https?://(?:www\.|m\.)?youtube\.com/(?:watch\?(?:\S*&)?v=|v/|embed/)([\w-]{11})(?:[?&#]\S*)?";

/// Short `youtu.be` links.
const SHORT_URL_PATTERN: &str = r"https?://youtu\.be/([\w-]{11})(?:[?&#]\S*)?";

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
}

/// Title and channel of a video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub title: String,
    pub channel: String,
}

/// HTTP client for the YouTube Data API.
#[derive(Clone)]
pub struct YouTubeRequester {
    url: String,
    api_key: String,
    client: Client,
}

impl YouTubeRequester {
    pub fn new(client: Client, config: &config::YouTube) -> Self {
        YouTubeRequester {
            url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    /// Request `/videos?part=snippet&id={video_id}` to get the snippet of a video.
    ///
    /// Returns `None` when no video has this id.
    pub async fn get_video(&self, video_id: &str) -> Result<Option<VideoInfo>, reqwest::Error> {
        let url = format!("{}/videos", &self.url);
        info!("request youtube video {}", video_id);
        debug!("request {}?part=snippet&id={}", &url, video_id);

        let response: VideoListResponse = self
            .client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("id", video_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("response from {}?id={} -> {:?}", &url, video_id, &response);

        Ok(response.items.into_iter().next().map(|video| VideoInfo {
            title: video.snippet.title,
            channel: video.snippet.channel_title,
        }))
    }
}

/// Answers YouTube links with the title of the video.
pub struct YouTubeUrlProcessor {
    requester: YouTubeRequester,
}

impl YouTubeUrlProcessor {
    pub fn new(client: Client, config: &config::YouTube) -> Self {
        YouTubeUrlProcessor {
            requester: YouTubeRequester::new(client, config),
        }
    }
}

impl UrlProcessor for YouTubeUrlProcessor {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn url_patterns(&self) -> Vec<String> {
        vec![LONG_URL_PATTERN.to_owned(), SHORT_URL_PATTERN.to_owned()]
    }

    fn process(&self, url_match: &UrlMatch) -> anyhow::Result<()> {
        let Some(video_id) = url_match.id().map(str::to_owned) else {
            return Ok(());
        };
        let requester = self.requester.clone();
        let responder = url_match.responder();
        let origin = url_match.origin().clone();

        url_match.spawn(async move {
            // Enrichment is best effort, a failed lookup stays silent
            match requester.get_video(&video_id).await {
                Ok(Some(video)) => {
                    responder.respond(format!("YouTube: {} ({})", video.title, video.channel));
                }
                Ok(None) => debug!("no youtube video with id {}", video_id),
                Err(e) => warn!(
                    "failed to request youtube video {} posted by {} in {}: {:?}",
                    video_id, origin.actor, origin.channel, e
                ),
            }
            Ok(())
        });

        Ok(())
    }
}
