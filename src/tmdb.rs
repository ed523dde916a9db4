//! Read-only client for the TMDB v3 API.
//!
//! Every call is a single GET with the API key in the query string. Responses
//! are reshaped into [`Movie`] records; nothing is cached or retried.

use crate::model::{CastMember, Movie};
use actix_web::client::Client;
use chrono::{Duration, NaiveDate};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
pub const PLACEHOLDER: &str = "/static/placeholder.svg";
const MAX_BODY: usize = 4 << 20;

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("invalid endpoint {0}: {1}")]
    Url(String, url::ParseError),
    #[error("request to {0} failed: {1}")]
    Send(String, String),
    #[error("{0} answered with status {1}")]
    Status(String, u16),
    #[error("could not decode {0}: {1}")]
    Decode(String, String),
}

pub fn poster_url(path: Option<&str>) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("{}/w500{}", IMAGE_BASE, p),
        _ => PLACEHOLDER.to_owned(),
    }
}

pub fn backdrop_url(path: Option<&str>) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("{}/w1280{}", IMAGE_BASE, p),
        _ => PLACEHOLDER.to_owned(),
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawMovie {
    id: u64,
    title: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    overview: String,
    release_date: Option<String>,
    vote_average: f32,
    runtime: Option<u32>,
    genres: Vec<Genre>,
    credits: Option<RawCredits>,
    videos: Option<Page<Video>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawCredits {
    cast: Vec<RawCast>,
    crew: Vec<RawCrew>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawCast {
    name: String,
    character: String,
    profile_path: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawCrew {
    job: String,
    name: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Video {
    pub key: String,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize, Debug)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize, Debug)]
struct GenreList {
    #[serde(default)]
    genres: Vec<Genre>,
}

const CAST_LIMIT: usize = 12;

impl RawMovie {
    fn reshape(self) -> Movie {
        let (cast, director) = match self.credits {
            Some(credits) => (
                credits
                    .cast
                    .into_iter()
                    .take(CAST_LIMIT)
                    .map(|c| CastMember {
                        name: c.name,
                        character: c.character,
                        profile_path: c.profile_path.map(|p| format!("{}/w185{}", IMAGE_BASE, p)),
                    })
                    .collect(),
                credits
                    .crew
                    .into_iter()
                    .find(|c| c.job == "Director")
                    .map(|c| c.name),
            ),
            None => (Vec::new(), None),
        };
        let trailer_key = self
            .videos
            .and_then(|v| trailer(&v.results).map(|t| t.key.clone()));
        Movie {
            id: self.id,
            title: self.title,
            poster_path: poster_url(self.poster_path.as_deref()),
            backdrop_path: backdrop_url(self.backdrop_path.as_deref()),
            overview: self.overview,
            release_date: self.release_date.unwrap_or_default(),
            vote_average: self.vote_average,
            runtime: self.runtime.unwrap_or(0),
            genres: self.genres.into_iter().map(|g| g.name).collect(),
            cast,
            director,
            trailer_key,
        }
    }
}

/// The first YouTube trailer, if the title has one.
pub fn trailer(videos: &[Video]) -> Option<&Video> {
    videos
        .iter()
        .find(|v| v.site == "YouTube" && v.kind == "Trailer")
}

/// Resolves genre names case-insensitively to TMDB ids, dropping unknown ones.
fn genre_ids(known: &[Genre], wanted: &[String]) -> Vec<u64> {
    wanted
        .iter()
        .filter_map(|name| {
            known
                .iter()
                .find(|g| g.name.eq_ignore_ascii_case(name.trim()))
                .map(|g| g.id)
        })
        .collect()
}

fn endpoint(
    base_url: &str,
    api_key: &str,
    path: &str,
    params: &[(&str, &str)],
) -> Result<Url, TmdbError> {
    let full = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&full).map_err(|e| TmdbError::Url(path.to_owned(), e))?;
    url.query_pairs_mut()
        .extend_pairs(params.iter())
        .append_pair("api_key", api_key)
        .append_pair("language", "en-US");
    Ok(url)
}

pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        TmdbClient {
            client: Client::default(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TmdbError> {
        let url = endpoint(&self.base_url, &self.api_key, path, params)?;
        debug!("GET {}{}", self.base_url, path);
        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| TmdbError::Send(path.to_owned(), e.to_string()))?;
        if !response.status().is_success() {
            return Err(TmdbError::Status(path.to_owned(), response.status().as_u16()));
        }
        response
            .json::<T>()
            .limit(MAX_BODY)
            .await
            .map_err(|e| TmdbError::Decode(path.to_owned(), e.to_string()))
    }

    async fn list(&self, path: &str, params: &[(&str, &str)]) -> Result<Vec<Movie>, TmdbError> {
        let page: Page<RawMovie> = self.fetch(path, params).await?;
        Ok(page.results.into_iter().map(RawMovie::reshape).collect())
    }

    pub async fn popular(&self) -> Result<Vec<Movie>, TmdbError> {
        self.list("/movie/popular", &[]).await
    }

    pub async fn top_rated(&self) -> Result<Vec<Movie>, TmdbError> {
        self.list("/movie/top_rated", &[]).await
    }

    pub async fn now_playing(&self) -> Result<Vec<Movie>, TmdbError> {
        self.list("/movie/now_playing", &[]).await
    }

    /// Titles released in the 30 days up to `today`, newest first.
    pub async fn new_releases(&self, today: NaiveDate) -> Result<Vec<Movie>, TmdbError> {
        let start = (today - Duration::days(30)).format("%Y-%m-%d").to_string();
        let end = today.format("%Y-%m-%d").to_string();
        self.list(
            "/discover/movie",
            &[
                ("primary_release_date.gte", start.as_str()),
                ("primary_release_date.lte", end.as_str()),
                ("sort_by", "primary_release_date.desc"),
            ],
        )
        .await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Movie>, TmdbError> {
        self.list(
            "/search/movie",
            &[("query", query), ("include_adult", "false")],
        )
        .await
    }

    pub async fn genres(&self) -> Result<Vec<Genre>, TmdbError> {
        let list: GenreList = self.fetch("/genre/movie/list", &[]).await?;
        Ok(list.genres)
    }

    pub async fn discover_by_genres(&self, names: &[String]) -> Result<Vec<Movie>, TmdbError> {
        let known = self.genres().await?;
        let ids = genre_ids(&known, names)
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        if ids.is_empty() {
            warn!("No known genres among {:?}", names);
            return Ok(Vec::new());
        }
        self.list(
            "/discover/movie",
            &[("with_genres", ids.as_str()), ("sort_by", "popularity.desc")],
        )
        .await
    }

    /// Details including credits and videos.
    pub async fn movie(&self, id: u64) -> Result<Movie, TmdbError> {
        let raw: RawMovie = self
            .fetch(
                &format!("/movie/{}", id),
                &[("append_to_response", "credits,videos")],
            )
            .await?;
        Ok(raw.reshape())
    }

    pub async fn videos(&self, id: u64) -> Result<Vec<Video>, TmdbError> {
        let page: Page<Video> = self.fetch(&format!("/movie/{}/videos", id), &[]).await?;
        Ok(page.results)
    }

    /// Today's top trending title with full details, for the home page hero.
    pub async fn top_trending(&self) -> Result<Option<Movie>, TmdbError> {
        let page: Page<RawMovie> = self.fetch("/trending/movie/day", &[]).await?;
        match page.results.into_iter().next() {
            Some(top) => Ok(Some(self.movie(top.id).await?)),
            None => Ok(None),
        }
    }
}

/// Logs a failed listing and degrades it to an empty one.
pub fn or_empty<T>(result: Result<Vec<T>, TmdbError>) -> Vec<T> {
    result.unwrap_or_else(|err| {
        warn!("{}", err);
        Vec::new()
    })
}
