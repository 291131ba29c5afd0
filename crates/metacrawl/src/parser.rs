use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::types::{GameRecord, ItemStub, Platform};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Page layout did not match the expected markup: {0}")]
    SchemaMismatch(String),
    #[error("Field '{field}' has out-of-range or malformed value '{value}'")]
    FieldOutOfRange { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub stubs: Vec<ItemStub>,
    pub has_next_page: bool,
}

/// A parsed detail page. `anomalies` holds the field-level failures that were
/// dropped to `None`; a non-empty set marks the record as partial.
#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub record: GameRecord,
    pub anomalies: Vec<ParseError>,
}

impl Detail {
    pub fn is_partial(&self) -> bool {
        !self.anomalies.is_empty()
    }
}

static RE_RANK_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(,\d{3})*\.").expect("invalid regex: rank prefix"));

static RE_RATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Rated\s+([\w+-]+)").expect("invalid regex: rated"));

static RE_MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][a-z]{2,8})\.?\s+(\d{1,2}),\s*(\d{4})").expect("invalid regex: date")
});

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(scope: ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|e| normalize_whitespace(&elem_text(e)))
        .filter(|s| !s.is_empty())
}

fn all_texts(scope: ElementRef, selector: &Selector) -> Vec<String> {
    scope
        .select(selector)
        .map(|e| normalize_whitespace(&elem_text(e)))
        .filter(|s| !s.is_empty())
        .collect()
}

fn has_class(element: ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn strip_rank_prefix(title: &str) -> String {
    RE_RANK_PREFIX.replace(title.trim(), "").trim().to_string()
}

pub fn parse_release_date(text: &str) -> Option<NaiveDate> {
    let caps = RE_MONTH_DAY_YEAR.captures(text)?;
    let normalized = format!("{} {}, {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&normalized, "%b %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(&normalized, "%B %d, %Y"))
        .ok()
}

fn parse_rating(text: &str) -> Option<String> {
    RE_RATED
        .captures(text)
        .map(|caps| format!("Rated {}", &caps[1]))
}

fn is_unscored(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || t.eq_ignore_ascii_case("tbd") || t.eq_ignore_ascii_case("n/a")
}

/// Metascore, an integer 0 to 100. `tbd` means not yet scored.
pub fn parse_critic_score(text: &str) -> Result<Option<u8>, ParseError> {
    if is_unscored(text) {
        return Ok(None);
    }
    let out_of_range = || ParseError::FieldOutOfRange {
        field: "critic_score",
        value: text.trim().to_string(),
    };
    let score: i64 = text.trim().parse().map_err(|_| out_of_range())?;
    if !(0..=100).contains(&score) {
        return Err(out_of_range());
    }
    Ok(Some(score as u8))
}

pub fn parse_user_score(text: &str) -> Result<Option<f32>, ParseError> {
    if is_unscored(text) {
        return Ok(None);
    }
    let out_of_range = || ParseError::FieldOutOfRange {
        field: "user_score",
        value: text.trim().to_string(),
    };
    let score: f32 = text.trim().parse().map_err(|_| out_of_range())?;
    if !score.is_finite() || !(0.0..=10.0).contains(&score) {
        return Err(out_of_range());
    }
    Ok(Some(score))
}

fn field_or_none<T>(result: Result<Option<T>, ParseError>, context: &str) -> Option<T> {
    result.unwrap_or_else(|e| {
        log::warn!("Anomaly in {}: {}", context, e);
        None
    })
}

fn field_or_anomaly<T>(
    result: Result<Option<T>, ParseError>,
    context: &str,
    anomalies: &mut Vec<ParseError>,
) -> Option<T> {
    result.unwrap_or_else(|e| {
        log::warn!("Anomaly in {}: {}", context, e);
        anomalies.push(e);
        None
    })
}

pub fn parse_page_info(html: &str) -> Option<(u32, u32)> {
    let document = Html::parse_document(html);
    page_info(&document)
}

fn page_info(document: &Html) -> Option<(u32, u32)> {
    let page_sel = Selector::parse(".c-navigationPagination_page").unwrap();

    let pages: Vec<(u32, bool)> = document
        .select(&page_sel)
        .filter_map(|e| {
            let n = normalize_whitespace(&elem_text(e)).parse::<u32>().ok()?;
            Some((n, has_class(e, "c-navigationPagination_page--active")))
        })
        .collect();

    let current = pages.iter().find(|(_, active)| *active).map(|(n, _)| *n)?;
    let last = pages.iter().map(|(n, _)| *n).max()?;
    Some((current, last))
}

fn has_next_page(document: &Html) -> bool {
    let next_sel = Selector::parse(".c-navigationPagination_item--next").unwrap();
    if let Some(next) = document.select(&next_sel).next() {
        return !has_class(next, "c-navigationPagination_item--disabled");
    }
    page_info(document).is_some_and(|(current, last)| current < last)
}

/// A page whose listing container exists but holds no cards is the end of the
/// data. A page with neither container nor cards, or with a card lacking a
/// link, is reported as [`ParseError::SchemaMismatch`].
pub fn parse_listing(html: &str) -> Result<Listing, ParseError> {
    let document = Html::parse_document(html);
    let container_sel = Selector::parse(".c-productListings").unwrap();
    let card_sel = Selector::parse("a.c-finderProductCard_container").unwrap();
    let title_sel = Selector::parse(".c-finderProductCard_title").unwrap();
    let meta_sel = Selector::parse(".c-finderProductCard_meta").unwrap();
    let description_sel = Selector::parse(".c-finderProductCard_description").unwrap();
    let score_sel = Selector::parse(".c-siteReviewScore").unwrap();
    let platform_sel = Selector::parse(".c-finderProductCard_platform").unwrap();

    let cards: Vec<ElementRef> = document.select(&card_sel).collect();
    if cards.is_empty() && document.select(&container_sel).next().is_none() {
        return Err(ParseError::SchemaMismatch(
            "no product listing container or item cards found".to_string(),
        ));
    }

    let mut stubs = Vec::with_capacity(cards.len());

    for card in cards {
        let url = card
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                ParseError::SchemaMismatch("item card without href attribute".to_string())
            })?
            .to_string();

        let title = first_text(card, &title_sel)
            .map(|t| strip_rank_prefix(&t))
            .filter(|t| !t.is_empty());

        let meta = card
            .select(&meta_sel)
            .next()
            .map(|e| e.text().collect::<Vec<_>>().join("|"));

        let release_date = meta.as_deref().and_then(parse_release_date);
        let rating = meta.as_deref().and_then(parse_rating);

        let platform = first_text(card, &platform_sel).and_then(|p| match p.parse::<Platform>() {
            Ok(platform) => Some(platform),
            Err(e) => {
                log::debug!("Ignoring listing platform tag: {}", e);
                None
            }
        });

        let critic_score = first_text(card, &score_sel)
            .and_then(|s| field_or_none(parse_critic_score(&s), &url));

        stubs.push(ItemStub {
            url,
            title,
            platform,
            critic_score,
            release_date,
            rating,
            description: first_text(card, &description_sel),
        });
    }

    let has_next_page = !stubs.is_empty() && has_next_page(&document);

    Ok(Listing {
        stubs,
        has_next_page,
    })
}

/// Only the title and platform are mandatory. The platform comes from the
/// stub when known, else from the first recognised platform on the page.
pub fn parse_detail(html: &str, stub: &ItemStub) -> Result<Detail, ParseError> {
    let mut anomalies = Vec::new();
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title_sel = Selector::parse(".c-productHero_title h1").unwrap();
    let platforms_sel = Selector::parse(".c-gameDetails_Platforms li").unwrap();
    let release_sel = Selector::parse(".c-gameDetails_ReleaseDate span:last-child").unwrap();
    let developer_sel = Selector::parse(".c-gameDetails_Developer li").unwrap();
    let publisher_sel =
        Selector::parse(".c-gameDetails_Distributor a, .c-gameDetails_Distributor span:last-child")
            .unwrap();
    let genre_sel = Selector::parse(".c-genreList li .c-globalButton_label").unwrap();
    let rating_sel = Selector::parse(".c-productionDetailsGame_esrb_title span").unwrap();
    let description_sel = Selector::parse(".c-productionDetailsGame_description").unwrap();
    let critic_sel =
        Selector::parse(r#"[data-testid="critic-score-info"] .c-siteReviewScore"#).unwrap();
    let user_sel = Selector::parse(r#"[data-testid="user-score-info"] .c-siteReviewScore"#).unwrap();

    let title = first_text(root, &title_sel)
        .ok_or_else(|| ParseError::SchemaMismatch(format!("no title on {}", stub.url)))?;

    let platform = stub
        .platform
        .or_else(|| {
            all_texts(root, &platforms_sel)
                .iter()
                .find_map(|p| p.parse::<Platform>().ok())
        })
        .ok_or_else(|| ParseError::SchemaMismatch(format!("no known platform on {}", stub.url)))?;

    let release_date = first_text(root, &release_sel)
        .and_then(|d| {
            let parsed = parse_release_date(&d);
            if parsed.is_none() {
                log::debug!("Unparsed release date '{}' on {}", d, stub.url);
            }
            parsed
        })
        .or(stub.release_date);

    let critic_score = first_text(root, &critic_sel)
        .map(|s| field_or_anomaly(parse_critic_score(&s), &stub.url, &mut anomalies))
        .unwrap_or(stub.critic_score);

    let user_score = first_text(root, &user_sel)
        .and_then(|s| field_or_anomaly(parse_user_score(&s), &stub.url, &mut anomalies));

    let developers = all_texts(root, &developer_sel);
    let developer = (!developers.is_empty()).then(|| developers.join(", "));

    let publisher = first_text(root, &publisher_sel);

    let mut genres = all_texts(root, &genre_sel);
    genres.dedup();

    let rating = first_text(root, &rating_sel)
        .and_then(|r| parse_rating(&r).or(Some(r)))
        .or_else(|| stub.rating.clone());

    let description = first_text(root, &description_sel).or_else(|| stub.description.clone());

    let record = GameRecord {
        title,
        platform,
        release_date,
        critic_score,
        user_score,
        genres,
        developer,
        publisher,
        rating,
        description,
        source_url: stub.url.clone(),
    };
    Ok(Detail { record, anomalies })
}
