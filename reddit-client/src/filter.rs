//! Facet filtering over a fetched listing page.
//!
//! Each facet is a boolean property of a post. The browser selects facets with
//! `"t"` (must be true) or `"f"` (must be false) query values; anything else
//! leaves the facet alone. Selectors are decoded once into [`FacetSelector`].

use crate::listing::{ListingPage, ListingPost};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Served from the assets directory in place of unusable thumbnails.
pub const PLACEHOLDER_THUMBNAIL: &str = "/assets/logo.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Facet {
    Images,
    Videos,
    Selfs,
    Spoilers,
    Saved,
    Clicked,
    Hidden,
    Visited,
    Original,
    Nsfw,
}

impl Facet {
    pub const ALL: [Facet; 10] = [
        Facet::Images,
        Facet::Videos,
        Facet::Selfs,
        Facet::Spoilers,
        Facet::Saved,
        Facet::Clicked,
        Facet::Hidden,
        Facet::Visited,
        Facet::Original,
        Facet::Nsfw,
    ];

    pub fn query_key(&self) -> &'static str {
        match self {
            Facet::Images => "images",
            Facet::Videos => "videos",
            Facet::Selfs => "selfs",
            Facet::Spoilers => "spoilers",
            Facet::Saved => "saved",
            Facet::Clicked => "clicked",
            Facet::Hidden => "hidden",
            Facet::Visited => "visited",
            Facet::Original => "original",
            Facet::Nsfw => "nsfw",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Facet::Images => "Images",
            Facet::Videos => "Videos",
            Facet::Selfs => "Self posts",
            Facet::Spoilers => "Spoilers",
            Facet::Saved => "Saved",
            Facet::Clicked => "Clicked",
            Facet::Hidden => "Hidden",
            Facet::Visited => "Visited",
            Facet::Original => "OC",
            Facet::Nsfw => "NSFW",
        }
    }

    pub fn from_query_key(key: &str) -> Option<Facet> {
        Self::ALL.into_iter().find(|facet| facet.query_key() == key)
    }

    pub fn value(&self, post: &ListingPost) -> bool {
        let data = &post.data;
        match self {
            Facet::Images => data.is_image(),
            Facet::Videos => data.is_video,
            Facet::Selfs => data.is_self,
            Facet::Spoilers => data.spoiler,
            Facet::Saved => data.saved,
            Facet::Clicked => data.clicked,
            Facet::Hidden => data.hidden,
            Facet::Visited => data.visited,
            Facet::Original => data.is_original_content,
            Facet::Nsfw => data.over_18,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacetSelector {
    Require,
    Exclude,
    #[default]
    Ignore,
}

impl FacetSelector {
    pub fn from_query_value(value: &str) -> Self {
        match value {
            "t" => FacetSelector::Require,
            "f" => FacetSelector::Exclude,
            _ => FacetSelector::Ignore,
        }
    }

    pub fn as_query_value(&self) -> &'static str {
        match self {
            FacetSelector::Require => "t",
            FacetSelector::Exclude => "f",
            FacetSelector::Ignore => "",
        }
    }

    pub fn accepts(&self, value: bool) -> bool {
        match self {
            FacetSelector::Require => value,
            FacetSelector::Exclude => !value,
            FacetSelector::Ignore => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    selectors: BTreeMap<Facet, FacetSelector>,
}

impl ListingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, facet: Facet, selector: FacetSelector) -> Self {
        if selector == FacetSelector::Ignore {
            self.selectors.remove(&facet);
        } else {
            self.selectors.insert(facet, selector);
        }
        self
    }

    /// Picks the facet keys out of a query string; other keys are skipped.
    /// A repeated key keeps its first value.
    pub fn from_query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let mut filter = Self::new();
        for (key, value) in pairs {
            let Some(facet) = Facet::from_query_key(key.as_ref()) else {
                continue;
            };
            if seen.insert(facet) {
                filter = filter.with(facet, FacetSelector::from_query_value(value.as_ref()));
            }
        }
        filter
    }

    pub fn selector(&self, facet: Facet) -> FacetSelector {
        self.selectors.get(&facet).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn accepts(&self, post: &ListingPost) -> bool {
        self.selectors
            .iter()
            .all(|(facet, selector)| selector.accepts(facet.value(post)))
    }

    /// Repairs thumbnails, then keeps the posts every selector accepts.
    ///
    /// `last_id` always comes from the last post of the unfiltered page, so
    /// paging continues past posts the filter dropped.
    pub fn apply(&self, page: ListingPage) -> ListingPage {
        let ListingPage { posts, .. } = page;
        let last_id = posts
            .last()
            .map(ListingPost::fullname)
            .unwrap_or_default();
        let total = posts.len();

        let posts: Vec<ListingPost> = posts
            .into_iter()
            .map(repair_thumbnail)
            .filter(|post| self.accepts(post))
            .collect();

        debug!("Filter kept {} of {} posts", posts.len(), total);
        ListingPage { posts, last_id }
    }
}

pub fn repair_thumbnail(mut post: ListingPost) -> ListingPost {
    let usable = post
        .data
        .thumbnail
        .as_deref()
        .is_some_and(|thumbnail| thumbnail.starts_with("http"));

    if !usable {
        post.data.thumbnail = Some(PLACEHOLDER_THUMBNAIL.to_string());
    }
    post
}
