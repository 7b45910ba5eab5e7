//! External learning resources for a lecture's key concepts.
//!
//! Videos come from the YouTube Data API; documentation and practice links
//! come from fixed keyword maps. Each source contributes at most one
//! documentation and one practice link per topic.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::ResourcesConfig;
use crate::lecture::artifacts::{Resource, ResourceKind};
use crate::sanitize::clip_chars;
use crate::services::ServiceError;

const VIDEO_RELEVANCE: f64 = 1.0;
const DOCUMENTATION_RELEVANCE: f64 = 0.9;
const PRACTICE_RELEVANCE: f64 = 0.8;
const MAX_TITLE_CHARS: usize = 200;

const YOUTUBE_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const YOUTUBE_EDUCATION_CATEGORY: &str = "27";

/// (keyword, title, url). Order matters: the first matching keyword wins.
const DOCUMENTATION: &[(&str, &str, &str)] = &[
    ("python", "Python Official Docs", "https://docs.python.org/3/"),
    ("javascript", "MDN JavaScript Guide", "https://developer.mozilla.org/en-US/docs/Web/JavaScript"),
    ("react", "React Official Docs", "https://react.dev/"),
    ("java", "Java SE Docs", "https://docs.oracle.com/en/java/"),
    ("c++", "C++ Reference", "https://en.cppreference.com/"),
    ("django", "Django Docs", "https://docs.djangoproject.com/"),
    ("fastapi", "FastAPI Docs", "https://fastapi.tiangolo.com/"),
    ("numpy", "NumPy Docs", "https://numpy.org/doc/stable/"),
    ("pandas", "Pandas Docs", "https://pandas.pydata.org/docs/"),
    ("scikit-learn", "scikit-learn Docs", "https://scikit-learn.org/stable/"),
    ("tensorflow", "TensorFlow API Docs", "https://www.tensorflow.org/api_docs"),
    ("pytorch", "PyTorch Docs", "https://pytorch.org/docs/stable/"),
    ("sql", "SQL Tutorial (W3Schools)", "https://www.w3schools.com/sql/"),
    ("html", "MDN HTML Guide", "https://developer.mozilla.org/en-US/docs/Web/HTML"),
    ("css", "MDN CSS Guide", "https://developer.mozilla.org/en-US/docs/Web/CSS"),
    ("machine learning", "scikit-learn User Guide", "https://scikit-learn.org/stable/user_guide.html"),
    ("data structures", "GeeksforGeeks: DSA", "https://www.geeksforgeeks.org/data-structures/"),
    ("algorithms", "GeeksforGeeks: Algorithms", "https://www.geeksforgeeks.org/fundamentals-of-algorithms/"),
    ("calculus", "Paul's Online Math Notes", "https://tutorial.math.lamar.edu/"),
    ("linear algebra", "Khan Academy: Linear Algebra", "https://www.khanacademy.org/math/linear-algebra"),
    ("probability", "Khan Academy: Statistics", "https://www.khanacademy.org/math/statistics-probability"),
    ("os", "Operating Systems: Three Easy Pieces", "https://pages.cs.wisc.edu/~remzi/OSTEP/"),
    ("networking", "Computer Networking (Kurose & Ross)", "https://gaia.cs.umass.edu/kurose_ross/"),
    ("database", "PostgreSQL Docs", "https://www.postgresql.org/docs/"),
    ("git", "Git Official Docs", "https://git-scm.com/doc"),
    ("docker", "Docker Docs", "https://docs.docker.com/"),
];

const PRACTICE: &[(&str, &str, &str)] = &[
    ("data structures", "DSA Practice (LeetCode)", "https://leetcode.com/explore/learn/"),
    ("algorithms", "Algorithm Problems (LeetCode)", "https://leetcode.com/problemset/"),
    ("sorting", "Sorting Problems (LeetCode)", "https://leetcode.com/tag/sorting/"),
    ("dynamic programming", "DP Problems (LeetCode)", "https://leetcode.com/tag/dynamic-programming/"),
    ("graph", "Graph Problems (LeetCode)", "https://leetcode.com/tag/graph/"),
    ("tree", "Tree Problems (LeetCode)", "https://leetcode.com/tag/tree/"),
    ("binary search", "Binary Search (LeetCode)", "https://leetcode.com/tag/binary-search/"),
    ("linked list", "Linked List (LeetCode)", "https://leetcode.com/tag/linked-list/"),
    ("recursion", "Recursion Problems (LeetCode)", "https://leetcode.com/tag/recursion/"),
    ("array", "Array Problems (LeetCode)", "https://leetcode.com/tag/array/"),
    ("string", "String Problems (LeetCode)", "https://leetcode.com/tag/string/"),
    ("math", "Math Problems (LeetCode)", "https://leetcode.com/tag/math/"),
    ("python", "Python Practice (HackerRank)", "https://www.hackerrank.com/domains/python"),
    ("sql", "SQL Practice (HackerRank)", "https://www.hackerrank.com/domains/sql"),
];

pub trait ResourceLookup: Send + Sync {
    /// Resources for `topics`, deduplicated by URL, most relevant first,
    /// at most `max_total`.
    fn resources_for(&self, topics: &[String], max_total: usize)
        -> Result<Vec<Resource>, ServiceError>;
}

pub trait VideoSearch: Send + Sync {
    fn search(&self, topic: &str, max_results: usize) -> Result<Vec<Resource>, ServiceError>;
}

/// First keyword-map entry matching `topic` in either direction.
fn map_lookup(
    map: &[(&str, &str, &str)],
    topic: &str,
    kind: ResourceKind,
    relevance_score: f64,
) -> Option<Resource> {
    let topic_lower = topic.to_lowercase();
    map.iter()
        .find(|(keyword, _, _)| topic_lower.contains(keyword) || keyword.contains(&topic_lower))
        .map(|(_, title, url)| Resource {
            kind,
            title: title.to_string(),
            url: url.to_string(),
            thumbnail_url: None,
            topic: Some(topic.to_string()),
            relevance_score,
        })
}

pub fn find_documentation(topic: &str) -> Option<Resource> {
    map_lookup(
        DOCUMENTATION,
        topic,
        ResourceKind::Documentation,
        DOCUMENTATION_RELEVANCE,
    )
}

pub fn find_practice(topic: &str) -> Option<Resource> {
    map_lookup(PRACTICE, topic, ResourceKind::Practice, PRACTICE_RELEVANCE)
}

pub struct ResourceLinker {
    videos: Option<Arc<dyn VideoSearch>>,
    topic_limit: usize,
    videos_per_topic: usize,
}

impl ResourceLinker {
    pub fn new(
        videos: Option<Arc<dyn VideoSearch>>,
        topic_limit: usize,
        videos_per_topic: usize,
    ) -> Self {
        Self {
            videos,
            topic_limit,
            videos_per_topic,
        }
    }

    /// Builds the linker; video search is skipped without a usable API key.
    pub fn from_config(config: &ResourcesConfig) -> Result<Self, ServiceError> {
        let videos: Option<Arc<dyn VideoSearch>> = match config.youtube_api_key.resolve()? {
            Some(key) => Some(Arc::new(YouTubeSearch::new(key)?)),
            None => {
                log::info!("No YouTube API key configured; video resources disabled");
                None
            }
        };
        Ok(Self::new(
            videos,
            config.topic_limit,
            config.videos_per_topic,
        ))
    }

    fn videos_for(&self, topic: &str) -> Vec<Resource> {
        let Some(search) = &self.videos else {
            return Vec::new();
        };
        match search.search(topic, self.videos_per_topic) {
            Ok(found) => {
                tracing::debug!(topic, count = found.len(), "Video search");
                found
            }
            Err(e) => {
                tracing::warn!(topic, error = %e, "Video search failed; skipping topic");
                Vec::new()
            }
        }
    }
}

impl ResourceLookup for ResourceLinker {
    fn resources_for(
        &self,
        topics: &[String],
        max_total: usize,
    ) -> Result<Vec<Resource>, ServiceError> {
        let mut resources: Vec<Resource> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for topic in topics.iter().take(self.topic_limit) {
            let candidates = self
                .videos_for(topic)
                .into_iter()
                .chain(find_documentation(topic))
                .chain(find_practice(topic));

            for resource in candidates {
                if seen_urls.insert(resource.url.clone()) {
                    resources.push(resource);
                }
            }

            if resources.len() >= max_total {
                break;
            }
        }

        // Stable, so equally relevant resources keep topic order.
        resources.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        resources.truncate(max_total);
        Ok(resources)
    }
}

/// YouTube Data API v3 search, restricted to English educational videos.
pub struct YouTubeSearch {
    client: Client,
    api_key: SecretString,
    endpoint: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: SearchId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Deserialize, Default)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    medium: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

impl YouTubeSearch {
    pub fn new(api_key: SecretString) -> Result<Self, ServiceError> {
        Self::with_endpoint(api_key, YOUTUBE_SEARCH_URL)
    }

    pub fn with_endpoint(api_key: SecretString, endpoint: &str) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServiceError::ResourceLookup(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            endpoint: endpoint.to_string(),
        })
    }
}

fn videos_from_response(response: SearchResponse, topic: &str, max_results: usize) -> Vec<Resource> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            Some(Resource {
                kind: ResourceKind::Youtube,
                title: clip_chars(&item.snippet.title, MAX_TITLE_CHARS).to_string(),
                url: format!("https://www.youtube.com/watch?v={}", video_id),
                thumbnail_url: item.snippet.thumbnails.medium.and_then(|t| t.url),
                topic: Some(topic.to_string()),
                relevance_score: VIDEO_RELEVANCE,
            })
        })
        .take(max_results)
        .collect()
}

impl VideoSearch for YouTubeSearch {
    fn search(&self, topic: &str, max_results: usize) -> Result<Vec<Resource>, ServiceError> {
        let query = format!("{} tutorial explained", topic);
        // A few extra results, since channels and playlists are dropped.
        let requested = (max_results + 2).to_string();
        let url = reqwest::Url::parse_with_params(
            &self.endpoint,
            &[
                ("part", "snippet"),
                ("q", query.as_str()),
                ("maxResults", requested.as_str()),
                ("type", "video"),
                ("videoCategoryId", YOUTUBE_EDUCATION_CATEGORY),
                ("order", "relevance"),
                ("relevanceLanguage", "en"),
                ("key", self.api_key.expose_secret()),
            ],
        )
        .map_err(|e| ServiceError::ResourceLookup(e.to_string()))?;

        let response: SearchResponse = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            // The URL carries the API key.
            .map_err(|e| ServiceError::ResourceLookup(e.without_url().to_string()))?;

        Ok(videos_from_response(response, topic, max_results))
    }
}
