//! twitterapi.io response shapes (`/twitter/user/followings`,
//! `/twitter/tweet/advanced_search`).
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Ids arrive as strings on most endpoints and as bare numbers on a few.
fn de_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!("unexpected id value: {other}"))),
    }
}

/// Fields every paginated twitterapi.io body carries.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IoPaging {
    #[serde(default)]
    pub has_next_page: Option<bool>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}

impl IoPaging {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }

    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "unspecified upstream error".to_string())
    }

    pub fn has_next(&self) -> bool {
        self.has_next_page.unwrap_or(false)
    }

    /// Cursor for the next page; an empty string counts as none.
    pub fn cursor(&self) -> Option<String> {
        self.next_cursor.clone().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IoSearchPage {
    #[serde(default)]
    pub tweets: Option<Vec<Value>>,
    #[serde(flatten)]
    pub paging: IoPaging,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IoFollowingsPage {
    #[serde(default)]
    pub followings: Option<Vec<Value>>,
    #[serde(flatten)]
    pub paging: IoPaging,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoUser {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "profilePicture", default)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoTweet {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub author: IoUser,
    #[serde(rename = "extendedEntities", default)]
    pub extended_entities: Option<IoExtendedEntities>,
    #[serde(default)]
    pub entities: Option<IoEntities>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IoExtendedEntities {
    #[serde(default)]
    pub media: Vec<IoMedia>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoMedia {
    #[serde(default)]
    pub media_url_https: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IoEntities {
    #[serde(default)]
    pub urls: Vec<IoUrlEntity>,
    #[serde(default)]
    pub user_mentions: Vec<IoMentionEntity>,
    #[serde(default)]
    pub hashtags: Vec<IoHashtagEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoUrlEntity {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoMentionEntity {
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoHashtagEntity {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub indices: Vec<usize>,
}
