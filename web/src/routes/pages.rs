use std::collections::HashMap;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use reddit_client::{Facet, FacetSelector, ListingSort, ListingTime};

use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

pub struct FacetField {
    pub name: &'static str,
    pub label: &'static str,
    pub options: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub logged_in: bool,
    pub reddit: String,
    pub sorts: Vec<SelectOption>,
    pub times: Vec<SelectOption>,
    pub facets: Vec<FacetField>,
}

#[derive(Template)]
#[template(path = "info.html")]
pub struct InfoTemplate {
    pub logged_in: bool,
}

impl HomeTemplate {
    /// Pre-fills the filter form from the page's query string.
    pub fn new(logged_in: bool, reddit: String, query: &HashMap<String, String>) -> Self {
        let get = |key: &str| query.get(key).map(String::as_str).unwrap_or_default();

        let sort = ListingSort::from(get("sort"));
        let sorts = ListingSort::ALL
            .into_iter()
            .map(|option| SelectOption {
                value: option.as_str(),
                label: sort_label(option),
                selected: option == sort,
            })
            .collect();

        let time = ListingTime::from(get("time"));
        let times = ListingTime::ALL
            .into_iter()
            .map(|option| SelectOption {
                value: option.as_str(),
                label: time_label(option),
                selected: option == time,
            })
            .collect();

        let facets = Facet::ALL
            .into_iter()
            .map(|facet| {
                let current = FacetSelector::from_query_value(get(facet.query_key()));
                let options = [
                    (FacetSelector::Ignore, "Any"),
                    (FacetSelector::Require, "Only"),
                    (FacetSelector::Exclude, "Hide"),
                ]
                .into_iter()
                .map(|(selector, label)| SelectOption {
                    value: selector.as_query_value(),
                    label,
                    selected: selector == current,
                })
                .collect();

                FacetField {
                    name: facet.query_key(),
                    label: facet.label(),
                    options,
                }
            })
            .collect();

        Self {
            logged_in,
            reddit,
            sorts,
            times,
            facets,
        }
    }
}

fn sort_label(sort: ListingSort) -> &'static str {
    match sort {
        ListingSort::Default => "Default",
        ListingSort::Hot => "Hot",
        ListingSort::New => "New",
        ListingSort::Rising => "Rising",
        ListingSort::Top => "Top",
        ListingSort::Controversial => "Controversial",
    }
}

fn time_label(time: ListingTime) -> &'static str {
    match time {
        ListingTime::Default => "Default",
        ListingTime::Hour => "Past hour",
        ListingTime::Day => "Past day",
        ListingTime::Week => "Past week",
        ListingTime::Month => "Past month",
        ListingTime::Year => "Past year",
        ListingTime::All => "All time",
    }
}

fn logged_in(state: &AppState, jar: &PrivateCookieJar) -> bool {
    state.sessions.read(jar).token.is_some()
}

pub async fn home(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<HashMap<String, String>>,
) -> Html<HomeTemplate> {
    Html(HomeTemplate::new(
        logged_in(&state, &jar),
        String::new(),
        &query,
    ))
}

pub async fn subreddit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(reddit): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Html<HomeTemplate> {
    Html(HomeTemplate::new(logged_in(&state, &jar), reddit, &query))
}

pub async fn info(State(state): State<AppState>, jar: PrivateCookieJar) -> Html<InfoTemplate> {
    Html(InfoTemplate {
        logged_in: logged_in(&state, &jar),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn selected<'a>(options: &'a [SelectOption]) -> Vec<&'a str> {
        options
            .iter()
            .filter(|option| option.selected)
            .map(|option| option.value)
            .collect()
    }

    #[test]
    fn form_is_prefilled_from_query() {
        let template = HomeTemplate::new(
            true,
            "pics".to_string(),
            &query(&[("sort", "top"), ("time", "week"), ("images", "t"), ("nsfw", "f")]),
        );

        assert_eq!(selected(&template.sorts), vec!["top"]);
        assert_eq!(selected(&template.times), vec!["week"]);

        let facet = |name: &str| {
            template
                .facets
                .iter()
                .find(|facet| facet.name == name)
                .unwrap()
        };
        assert_eq!(selected(&facet("images").options), vec!["t"]);
        assert_eq!(selected(&facet("nsfw").options), vec!["f"]);
        assert_eq!(selected(&facet("videos").options), vec![""]);
    }

    #[test]
    fn unknown_values_select_defaults() {
        let template = HomeTemplate::new(false, String::new(), &query(&[("sort", "best")]));
        assert_eq!(selected(&template.sorts), vec![""]);
        assert_eq!(template.facets.len(), Facet::ALL.len());
    }

    #[test]
    fn home_renders_form() {
        let html = HomeTemplate::new(false, "rust".to_string(), &HashMap::new())
            .render()
            .unwrap();
        assert!(html.contains("id=\"filters\""));
        assert!(html.contains("name=\"nsfw\""));
        assert!(html.contains("data-reddit=\"rust\""));
        assert!(html.contains("href=\"/login\""));
    }
}
