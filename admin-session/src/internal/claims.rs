use crate::internal::unixtime::UnixTimestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;

//--------------------------------------------------------------------------------------------------
// Subject identifier
//--------------------------------------------------------------------------------------------------

// Some issuers put a numeric database id in `sub`, so accept either form and keep it as text
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SubjectId(String);

impl<'de> Deserialize<'de> for SubjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(SubjectId(s)),
            Value::Number(n) => Ok(SubjectId(n.to_string())),
            _ => Err(serde::de::Error::custom(
                "subject id must be a string or a number",
            )),
        }
    }
}

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        SubjectId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------------------------------------------------------------------
// Claims object
//--------------------------------------------------------------------------------------------------

/// Deserialises from any JSON object. Each typed field is read from its camelCase or snake_case
/// key when the value has the expected type; anything else, including mistyped values, stays in
/// [`Claims::extra`].
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", from = "Map<String, Value>")]
pub struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<SubjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTimestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTimestamp>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

// Subject fallbacks are read in order but left in `extra`
const SUBJECT_FALLBACK_KEYS: [&str; 2] = ["id", "userId"];

fn parse<'a, T: Deserialize<'a>>(value: &'a Value) -> Option<T> {
    T::deserialize(value).ok()
}

/// Removes and returns the first key whose value parses as `T`. Mistyped values are left in place.
fn take<T>(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<T>
where
    T: for<'a> Deserialize<'a>,
{
    let (key, value) = keys
        .iter()
        .find_map(|key| fields.get(*key).and_then(parse).map(|value| (*key, value)))?;
    fields.remove(key);
    Some(value)
}

fn subject(fields: &Map<String, Value>, key: &str) -> Option<SubjectId> {
    fields
        .get(key)
        .and_then(parse::<SubjectId>)
        .filter(|id| !id.0.is_empty())
}

impl From<Map<String, Value>> for Claims {
    fn from(mut fields: Map<String, Value>) -> Self {
        let sub = match subject(&fields, "sub") {
            Some(id) => {
                fields.remove("sub");
                Some(id)
            }
            None => SUBJECT_FALLBACK_KEYS
                .iter()
                .find_map(|key| subject(&fields, key)),
        };

        Claims {
            sub,
            name: take(&mut fields, &["name"]),
            first_name: take(&mut fields, &["firstName", "first_name"]),
            last_name: take(&mut fields, &["lastName", "last_name"]),
            email: take(&mut fields, &["email"]),
            role: take(&mut fields, &["role"]),
            is_active: take(&mut fields, &["isActive", "is_active"]),
            is_deleted: take(&mut fields, &["isDeleted", "is_deleted"]),
            iat: take(&mut fields, &["iat"]),
            exp: take(&mut fields, &["exp"]),
            extra: fields,
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

impl Claims {
    pub fn sub(&self) -> Option<&SubjectId> {
        self.sub.as_ref().filter(|id| !id.0.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    pub fn first_name(&self) -> Option<&str> {
        non_empty(&self.first_name)
    }

    pub fn last_name(&self) -> Option<&str> {
        non_empty(&self.last_name)
    }

    pub fn email(&self) -> Option<&str> {
        non_empty(&self.email)
    }

    pub fn role(&self) -> Option<&str> {
        non_empty(&self.role)
    }

    /// Absent means active.
    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted.unwrap_or(false)
    }

    pub fn iat(&self) -> Option<UnixTimestamp> {
        self.iat
    }

    pub fn exp(&self) -> Option<UnixTimestamp> {
        self.exp
    }

    /// Fields the typed accessors don't cover.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn has_identity(&self) -> bool {
        self.sub().is_some() || self.email().is_some()
    }
}

//--------------------------------------------------------------------------------------------------
