use std::{fmt::Display, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Unknown platform '{0}'. Accepted values are platform slugs such as 'pc', 'ps5' or 'nintendo-switch'")]
pub struct PlatformParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Platform {
    Ps5,
    XboxSeriesX,
    NintendoSwitch,
    Pc,
    Mobile,
    Nintendo3ds,
    Dreamcast,
    Ds,
    Gba,
    GameCube,
    MetaQuest,
    Nintendo64,
    Ps1,
    Ps2,
    Ps3,
    Ps4,
    Psp,
    PsVita,
    Wii,
    WiiU,
    Xbox,
    Xbox360,
    XboxOne,
}

impl Platform {
    pub const ALL: [Platform; 23] = [
        Platform::Ps5,
        Platform::XboxSeriesX,
        Platform::NintendoSwitch,
        Platform::Pc,
        Platform::Mobile,
        Platform::Nintendo3ds,
        Platform::Dreamcast,
        Platform::Ds,
        Platform::Gba,
        Platform::GameCube,
        Platform::MetaQuest,
        Platform::Nintendo64,
        Platform::Ps1,
        Platform::Ps2,
        Platform::Ps3,
        Platform::Ps4,
        Platform::Psp,
        Platform::PsVita,
        Platform::Wii,
        Platform::WiiU,
        Platform::Xbox,
        Platform::Xbox360,
        Platform::XboxOne,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Platform::Ps5 => "ps5",
            Platform::XboxSeriesX => "xbox-series-x",
            Platform::NintendoSwitch => "nintendo-switch",
            Platform::Pc => "pc",
            Platform::Mobile => "mobile",
            Platform::Nintendo3ds => "3ds",
            Platform::Dreamcast => "dreamcast",
            Platform::Ds => "ds",
            Platform::Gba => "gba",
            Platform::GameCube => "gamecube",
            Platform::MetaQuest => "meta-quest",
            Platform::Nintendo64 => "nintendo-64",
            Platform::Ps1 => "ps1",
            Platform::Ps2 => "ps2",
            Platform::Ps3 => "ps3",
            Platform::Ps4 => "ps4",
            Platform::Psp => "psp",
            Platform::PsVita => "ps-vita",
            Platform::Wii => "wii",
            Platform::WiiU => "wii-u",
            Platform::Xbox => "xbox",
            Platform::Xbox360 => "xbox-360",
            Platform::XboxOne => "xbox-one",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Ps5 => "PlayStation 5",
            Platform::XboxSeriesX => "Xbox Series X",
            Platform::NintendoSwitch => "Nintendo Switch",
            Platform::Pc => "PC",
            Platform::Mobile => "Mobile",
            Platform::Nintendo3ds => "3DS",
            Platform::Dreamcast => "Dreamcast",
            Platform::Ds => "DS",
            Platform::Gba => "Game Boy Advance",
            Platform::GameCube => "GameCube",
            Platform::MetaQuest => "Meta Quest",
            Platform::Nintendo64 => "Nintendo 64",
            Platform::Ps1 => "PlayStation",
            Platform::Ps2 => "PlayStation 2",
            Platform::Ps3 => "PlayStation 3",
            Platform::Ps4 => "PlayStation 4",
            Platform::Psp => "PSP",
            Platform::PsVita => "PlayStation Vita",
            Platform::Wii => "Wii",
            Platform::WiiU => "Wii U",
            Platform::Xbox => "Xbox",
            Platform::Xbox360 => "Xbox 360",
            Platform::XboxOne => "Xbox One",
        }
    }
}

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Platform::ALL
            .into_iter()
            .find(|p| p.slug().eq_ignore_ascii_case(needle) || p.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| PlatformParseError(s.to_string()))
    }
}

impl TryFrom<String> for Platform {
    type Error = PlatformParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.name().to_string()
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Summary of one card on a listing page, enough to schedule the detail fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStub {
    pub url: String,
    pub title: Option<String>,
    pub platform: Option<Platform>,
    pub critic_score: Option<u8>,
    pub release_date: Option<NaiveDate>,
    pub rating: Option<String>,
    pub description: Option<String>,
}

impl ItemStub {
    /// A stub carrying nothing but the detail URL, used by the retry pass.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            platform: None,
            critic_score: None,
            release_date: None,
            rating: None,
            description: None,
        }
    }
}

impl Display for ItemStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title.as_deref().unwrap_or("<untitled>"))?;
        if let Some(platform) = self.platform {
            write!(f, " [{}]", platform)?;
        }
        write!(f, " - {}", self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub title: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub title: String,
    pub platform: Platform,
    pub release_date: Option<NaiveDate>,
    pub critic_score: Option<u8>,
    pub user_score: Option<f32>,
    pub genres: Vec<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub rating: Option<String>,
    pub description: Option<String>,
    pub source_url: String,
}

impl GameRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            title: self.title.clone(),
            platform: self.platform,
        }
    }
}

impl Display for GameRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} ─ {}", self.title, self.platform)?;
        if let Some(date) = self.release_date {
            writeln!(f, "│  Released:  {}", date)?;
        }
        match self.critic_score {
            Some(score) => writeln!(f, "│  Metascore: {}", score)?,
            None => writeln!(f, "│  Metascore: tbd")?,
        }
        match self.user_score {
            Some(score) => writeln!(f, "│  User:      {:.1}", score)?,
            None => writeln!(f, "│  User:      tbd")?,
        }
        if !self.genres.is_empty() {
            writeln!(f, "│  Genres:    {}", self.genres.join(", "))?;
        }
        if let Some(developer) = &self.developer {
            writeln!(f, "│  Developer: {}", developer)?;
        }
        if let Some(publisher) = &self.publisher {
            writeln!(f, "│  Publisher: {}", publisher)?;
        }
        if let Some(rating) = &self.rating {
            writeln!(f, "│  Rating:    {}", rating)?;
        }
        if let Some(description) = &self.description {
            let preview: String = description.chars().take(120).collect();
            writeln!(f, "│  {}…", preview)?;
        }
        write!(f, "└─ {}", self.source_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_slug_and_name() {
        assert_eq!("pc".parse::<Platform>().unwrap(), Platform::Pc);
        assert_eq!("PC".parse::<Platform>().unwrap(), Platform::Pc);
        assert_eq!(
            "PlayStation 5".parse::<Platform>().unwrap(),
            Platform::Ps5
        );
        assert_eq!(
            "nintendo-switch".parse::<Platform>().unwrap(),
            Platform::NintendoSwitch
        );
        assert_eq!(" wii-u ".parse::<Platform>().unwrap(), Platform::WiiU);
        assert!("amiga".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_slugs_are_distinct() {
        let mut slugs: Vec<_> = Platform::ALL.iter().map(|p| p.slug()).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), Platform::ALL.len());
    }

    #[test]
    fn test_record_key_ignores_non_identity_fields() {
        let a = GameRecord {
            title: "Hades".into(),
            platform: Platform::Pc,
            release_date: None,
            critic_score: Some(93),
            user_score: None,
            genres: vec![],
            developer: None,
            publisher: None,
            rating: None,
            description: None,
            source_url: "/game/hades/".into(),
        };
        let mut b = a.clone();
        b.critic_score = Some(90);
        b.source_url = "/game/hades-pc/".into();
        assert_eq!(a.key(), b.key());

        b.platform = Platform::NintendoSwitch;
        assert_ne!(a.key(), b.key());
    }
}
