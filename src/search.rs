use crate::model::Movie;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Debounce applied by the search page script before it submits.
pub const DEBOUNCE_MS: u64 = 300;

pub const GENRES: &[&str] = &[
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Fantasy",
    "Horror",
    "Romance",
    "Science Fiction",
    "Thriller",
];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Relevance,
    RatingDesc,
    RatingAsc,
    DateDesc,
    DateAsc,
    TitleAsc,
    TitleDesc,
}

impl Default for SortBy {
    fn default() -> Self {
        SortBy::Relevance
    }
}

/// Query string of `/search`. Genres arrive as one comma separated value.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SearchParams {
    pub q: String,
    pub genres: String,
    pub sort: SortBy,
}

impl SearchParams {
    pub fn genre_list(&self) -> Vec<String> {
        self.genres
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Sorts in place. Relevance keeps the API order; ISO dates compare as text.
pub fn sort_movies(movies: &mut [Movie], sort: SortBy) {
    let by_rating =
        |a: &Movie, b: &Movie| a.vote_average.partial_cmp(&b.vote_average).unwrap_or(Ordering::Equal);
    match sort {
        SortBy::Relevance => {}
        SortBy::RatingDesc => movies.sort_by(|a, b| by_rating(b, a)),
        SortBy::RatingAsc => movies.sort_by(by_rating),
        SortBy::DateDesc => movies.sort_by(|a, b| b.release_date.cmp(&a.release_date)),
        SortBy::DateAsc => movies.sort_by(|a, b| a.release_date.cmp(&b.release_date)),
        SortBy::TitleAsc => movies.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase())),
        SortBy::TitleDesc => movies.sort_by(|a, b| b.title.to_lowercase().cmp(&a.title.to_lowercase())),
    }
}
