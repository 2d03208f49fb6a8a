use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

//--------------------------------------------------------------------------------------------------
// Unix Timestamp handling
//--------------------------------------------------------------------------------------------------

pub struct Seconds(pub u32);

pub const ONE_DAY: Seconds = Seconds(86_400);

/// Seconds since the epoch as carried in `iat`/`exp` claims, held at millisecond precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnixTimestamp(i64);

impl Serialize for UnixTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.0 % 1000 == 0 {
            self.seconds().serialize(serializer)
        } else {
            (self.0 as f64 / 1000.0).serialize(serializer)
        }
    }
}

// Issuers are not consistent about integer seconds, so accept fractional values too
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Whole(i64),
    Fractional(f64),
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Whole(seconds) => Ok(UnixTimestamp::from_seconds(seconds)),
            // Float to int casts saturate
            RawTimestamp::Fractional(seconds) if seconds.is_finite() => {
                Ok(UnixTimestamp((seconds * 1000.0) as i64))
            }
            RawTimestamp::Fractional(_) => Err(serde::de::Error::custom(
                "timestamp must be a finite number",
            )),
        }
    }
}

impl UnixTimestamp {
    pub fn from_seconds(seconds: i64) -> Self {
        UnixTimestamp(seconds.saturating_mul(1000))
    }

    pub fn from_millis(millis: i64) -> Self {
        UnixTimestamp(millis)
    }

    /// Whole seconds, rounded towards negative infinity.
    pub fn seconds(self) -> i64 {
        self.0.div_euclid(1000)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// `None` when the value is outside the range `time` can represent.
    pub fn to_datetime(self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000_000).ok()
    }

    /// Strictly before `now`, compared at millisecond precision.
    pub fn is_before(self, now: OffsetDateTime) -> bool {
        self.0 < unix_millis(now)
    }
}

pub fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn accepts_whole_and_fractional_seconds() {
        let whole: UnixTimestamp = serde_json::from_str("1700000000").unwrap();
        let fractional: UnixTimestamp = serde_json::from_str("1700000000.75").unwrap();
        assert_eq!(whole.as_millis(), 1_700_000_000_000);
        assert_eq!(fractional.as_millis(), 1_700_000_000_750);
        assert_eq!(fractional.seconds(), 1_700_000_000);
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(serde_json::from_str::<UnixTimestamp>("\"soon\"").is_err());
    }

    #[test]
    fn expiry_comparison_is_strict() {
        let now = OffsetDateTime::from_unix_timestamp(1_000).unwrap();
        assert!(UnixTimestamp::from_seconds(999).is_before(now));
        assert!(!UnixTimestamp::from_seconds(1_000).is_before(now));
        assert!(!UnixTimestamp::from_seconds(1_001).is_before(now));
    }

    #[test]
    fn fractional_expiry_keeps_its_milliseconds() {
        let exp: UnixTimestamp = serde_json::from_str("1000.5").unwrap();
        let now = OffsetDateTime::from_unix_timestamp(1_000).unwrap();

        assert!(!exp.is_before(now + Duration::milliseconds(200)));
        assert!(!exp.is_before(now + Duration::milliseconds(500)));
        assert!(exp.is_before(now + Duration::milliseconds(501)));
    }

    #[test]
    fn serialises_back_as_seconds() {
        assert_eq!(
            serde_json::to_string(&UnixTimestamp::from_seconds(1_700_000_000)).unwrap(),
            "1700000000"
        );
        assert_eq!(
            serde_json::to_string(&UnixTimestamp::from_millis(1_500)).unwrap(),
            "1.5"
        );
    }

    #[test]
    fn converts_to_datetime() {
        let at = UnixTimestamp::from_millis(1_700_000_000_250).to_datetime().unwrap();
        assert_eq!(at.unix_timestamp(), 1_700_000_000);
        assert_eq!(at.millisecond(), 250);
    }
}
