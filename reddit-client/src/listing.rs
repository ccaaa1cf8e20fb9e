use crate::api::{RedditListing, RedditListingChild, RedditPostData};
use filters_core::CoreError;

pub type ListingPost = RedditListingChild<RedditPostData>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingSort {
    #[default]
    Default,
    Hot,
    New,
    Rising,
    Top,
    Controversial,
}

impl ListingSort {
    pub const ALL: [ListingSort; 6] = [
        ListingSort::Default,
        ListingSort::Hot,
        ListingSort::New,
        ListingSort::Rising,
        ListingSort::Top,
        ListingSort::Controversial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingSort::Default => "",
            ListingSort::Hot => "hot",
            ListingSort::New => "new",
            ListingSort::Rising => "rising",
            ListingSort::Top => "top",
            ListingSort::Controversial => "controversial",
        }
    }

    /// Only `top` and `controversial` listings accept a time window.
    pub fn has_time_window(&self) -> bool {
        matches!(self, ListingSort::Top | ListingSort::Controversial)
    }
}

/// Unknown values fall back to the default sort.
impl From<&str> for ListingSort {
    fn from(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|sort| sort.as_str() == value)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingTime {
    #[default]
    Default,
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl ListingTime {
    pub const ALL: [ListingTime; 7] = [
        ListingTime::Default,
        ListingTime::Hour,
        ListingTime::Day,
        ListingTime::Week,
        ListingTime::Month,
        ListingTime::Year,
        ListingTime::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingTime::Default => "",
            ListingTime::Hour => "hour",
            ListingTime::Day => "day",
            ListingTime::Week => "week",
            ListingTime::Month => "month",
            ListingTime::Year => "year",
            ListingTime::All => "all",
        }
    }
}

impl From<&str> for ListingTime {
    fn from(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|time| time.as_str() == value)
            .unwrap_or_default()
    }
}

/// What to fetch. Empty/zero/false fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingOptions {
    /// Empty means the front page.
    pub subreddit: String,
    pub sort: ListingSort,
    pub time: ListingTime,
    pub after: String,
    pub before: String,
    pub count: u32,
    pub limit: u32,
    pub show: bool,
    pub detail: bool,
}

impl ListingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subreddit<S: Into<String>>(mut self, subreddit: S) -> Self {
        self.subreddit = subreddit.into();
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: ListingSort) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn time(mut self, time: ListingTime) -> Self {
        self.time = time;
        self
    }

    #[must_use]
    pub fn after<S: Into<String>>(mut self, after: S) -> Self {
        self.after = after.into();
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let valid = self
            .subreddit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'));

        if valid {
            Ok(())
        } else {
            Err(CoreError::InvalidInput {
                message: format!("invalid subreddit name: {}", self.subreddit),
            })
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if !self.after.is_empty() {
            params.push(("after", self.after.clone()));
        }
        if !self.before.is_empty() {
            params.push(("before", self.before.clone()));
        }
        if self.count > 0 {
            params.push(("count", self.count.to_string()));
        }
        if self.limit > 0 {
            params.push(("limit", self.limit.to_string()));
        }
        if self.show {
            params.push(("show", "all".to_string()));
        }
        if self.detail {
            params.push(("sr_detail", "true".to_string()));
        }
        if self.sort.has_time_window() && self.time != ListingTime::Default {
            params.push(("t", self.time.as_str().to_string()));
        }

        params
    }
}

/// One page of posts plus the cursor for the next page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub posts: Vec<ListingPost>,
    /// Fullname of the last post on the page, empty for an empty page.
    pub last_id: String,
}

impl ListingPage {
    pub fn new(posts: Vec<ListingPost>) -> Self {
        let last_id = posts
            .last()
            .map(ListingPost::fullname)
            .unwrap_or_default();
        Self { posts, last_id }
    }
}

impl From<RedditListing<RedditPostData>> for ListingPage {
    fn from(listing: RedditListing<RedditPostData>) -> Self {
        Self::new(listing.data.children)
    }
}
